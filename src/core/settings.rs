// pixform/src/core/settings.rs
use super::{PipelineError, Result};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const PIXELATION_MAX: u32 = 50;
pub const BLUR_MAX: f32 = 20.0;
pub const POSTERIZE_MIN: u8 = 2;
/// The top of the posterize range leaves the image unquantized.
pub const POSTERIZE_OFF: u8 = 16;
pub const PERCENT_MAX: u32 = 200;
pub const OUTPUT_SIZE_MIN: u32 = 256;
pub const OUTPUT_SIZE_MAX: u32 = 2048;
pub const OUTPUT_SIZE_STEP: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundColor {
    White,
    Black,
    Transparent,
    Gray,
    Custom([u8; 3]),
}

impl BackgroundColor {
    /// Opaque fill colour, `None` when the background stays transparent.
    pub fn fill(&self) -> Option<Rgba<u8>> {
        let [r, g, b] = match self {
            BackgroundColor::White => [255, 255, 255],
            BackgroundColor::Black => [0, 0, 0],
            BackgroundColor::Gray => [128, 128, 128],
            BackgroundColor::Custom(rgb) => *rgb,
            BackgroundColor::Transparent => return None,
        };
        Some(Rgba([r, g, b, 255]))
    }
}

impl FromStr for BackgroundColor {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "white" | "#ffffff" | "#fff" => return Ok(BackgroundColor::White),
            "black" | "#000000" | "#000" => return Ok(BackgroundColor::Black),
            "transparent" => return Ok(BackgroundColor::Transparent),
            "gray" | "grey" | "#808080" => return Ok(BackgroundColor::Gray),
            _ => {}
        }

        let invalid = || {
            PipelineError::InvalidSettings(format!("backgroundColor: unrecognized color '{}'", value))
        };

        let hex = value.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        let rgb = match hex.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = channel(&c.to_string())?;
                    rgb[i] = v * 17;
                }
                rgb
            }
            6 => [channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?],
            _ => return Err(invalid()),
        };

        Ok(BackgroundColor::Custom(rgb))
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundColor::White => write!(f, "white"),
            BackgroundColor::Black => write!(f, "black"),
            BackgroundColor::Transparent => write!(f, "transparent"),
            BackgroundColor::Gray => write!(f, "gray"),
            BackgroundColor::Custom([r, g, b]) => write!(f, "#{:02x}{:02x}{:02x}", r, g, b),
        }
    }
}

impl Serialize for BackgroundColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BackgroundColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// User-facing effect settings, one immutable value per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub pixelation: u32,
    pub blur: f32,
    pub edge_detection: bool,
    pub posterize: u8,
    pub contrast: u32,
    pub brightness: u32,
    pub saturation: u32,
    pub output_size: u32,
    pub background_color: BackgroundColor,
    pub line_art: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pixelation: 0,
            blur: 0.0,
            edge_detection: false,
            posterize: 8,
            contrast: 100,
            brightness: 100,
            saturation: 100,
            output_size: 1024,
            background_color: BackgroundColor::Transparent,
            line_art: false,
        }
    }
}

/// A single typed field change, applied with [`Settings::with`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    Pixelation(u32),
    Blur(f32),
    EdgeDetection(bool),
    Posterize(u8),
    Contrast(u32),
    Brightness(u32),
    Saturation(u32),
    OutputSize(u32),
    BackgroundColor(BackgroundColor),
    LineArt(bool),
}

impl Settings {
    /// Settings under which every stage except resizing is a no-op.
    pub fn identity(output_size: u32) -> Self {
        Self {
            posterize: POSTERIZE_OFF,
            output_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pixelation > PIXELATION_MAX {
            return Err(out_of_range("pixelation", self.pixelation, "0-50"));
        }

        if !self.blur.is_finite() || self.blur < 0.0 || self.blur > BLUR_MAX {
            return Err(out_of_range("blur", self.blur, "0-20"));
        }
        if (self.blur * 2.0).fract() != 0.0 {
            return Err(PipelineError::InvalidSettings(format!(
                "blur must be a multiple of 0.5, got {}",
                self.blur
            )));
        }

        if !(POSTERIZE_MIN..=POSTERIZE_OFF).contains(&self.posterize) {
            return Err(out_of_range("posterize", self.posterize, "2-16"));
        }

        for (name, value) in [
            ("contrast", self.contrast),
            ("brightness", self.brightness),
            ("saturation", self.saturation),
        ] {
            if value > PERCENT_MAX {
                return Err(out_of_range(name, value, "0-200"));
            }
        }

        if !(OUTPUT_SIZE_MIN..=OUTPUT_SIZE_MAX).contains(&self.output_size) {
            return Err(out_of_range("outputSize", self.output_size, "256-2048"));
        }
        if self.output_size % OUTPUT_SIZE_STEP != 0 {
            return Err(PipelineError::InvalidSettings(format!(
                "outputSize must be a multiple of {}, got {}",
                OUTPUT_SIZE_STEP, self.output_size
            )));
        }

        Ok(())
    }

    /// Returns a new validated value with one field replaced.
    pub fn with(&self, update: SettingUpdate) -> Result<Settings> {
        let mut next = self.clone();
        match update {
            SettingUpdate::Pixelation(v) => next.pixelation = v,
            SettingUpdate::Blur(v) => next.blur = v,
            SettingUpdate::EdgeDetection(v) => next.edge_detection = v,
            SettingUpdate::Posterize(v) => next.posterize = v,
            SettingUpdate::Contrast(v) => next.contrast = v,
            SettingUpdate::Brightness(v) => next.brightness = v,
            SettingUpdate::Saturation(v) => next.saturation = v,
            SettingUpdate::OutputSize(v) => next.output_size = v,
            SettingUpdate::BackgroundColor(v) => next.background_color = v,
            SettingUpdate::LineArt(v) => next.line_art = v,
        }
        next.validate()?;
        Ok(next)
    }

    pub fn from_json_file(path: &Path) -> Result<Settings> {
        let data = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&data).map_err(|e| {
            PipelineError::InvalidSettings(format!("{}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Parses `value` for the field named `key` and returns the updated settings.
///
/// Keys are accepted in either the camelCase wire form or snake_case.
pub fn update_settings(current: &Settings, key: &str, value: &str) -> Result<Settings> {
    let value = value.trim();
    let update = match key {
        "pixelation" => SettingUpdate::Pixelation(parse_field(key, value)?),
        "blur" => SettingUpdate::Blur(parse_field(key, value)?),
        "edgeDetection" | "edge_detection" => SettingUpdate::EdgeDetection(parse_field(key, value)?),
        "posterize" => SettingUpdate::Posterize(parse_field(key, value)?),
        "contrast" => SettingUpdate::Contrast(parse_field(key, value)?),
        "brightness" => SettingUpdate::Brightness(parse_field(key, value)?),
        "saturation" => SettingUpdate::Saturation(parse_field(key, value)?),
        "outputSize" | "output_size" => SettingUpdate::OutputSize(parse_field(key, value)?),
        "backgroundColor" | "background_color" => SettingUpdate::BackgroundColor(value.parse()?),
        "lineArt" | "line_art" => SettingUpdate::LineArt(parse_field(key, value)?),
        _ => {
            return Err(PipelineError::InvalidSettings(format!(
                "unknown setting '{}'",
                key
            )))
        }
    };

    current.with(update)
}

fn parse_field<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        PipelineError::InvalidSettings(format!("{}: cannot parse '{}'", key, value))
    })
}

fn out_of_range(field: &str, value: impl fmt::Display, range: &str) -> PipelineError {
    PipelineError::InvalidSettings(format!(
        "{} must be within {}, got {}",
        field, range, value
    ))
}
