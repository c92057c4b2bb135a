// pixform/src/core/mod.rs
pub mod processor;
pub mod settings;

use thiserror::Error;

pub use settings::{update_settings, BackgroundColor, SettingUpdate, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAlgorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    #[default]
    SameAsInput,
}

impl OutputFormat {
    /// File extension used when an explicit format rewrites an output key.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Jpeg => Some("jpg"),
            OutputFormat::Png => Some("png"),
            OutputFormat::WebP => Some("webp"),
            OutputFormat::SameAsInput => None,
        }
    }
}

/// How the edge map is combined with the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeMode {
    /// Edge magnitude replaces the colour channels.
    Replace,
    /// Linear mix, `0.0` keeps the image and `1.0` is the edge map.
    Blend(f32),
}

/// Kernel and filter choices that are policy rather than user settings.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub edge_mode: EdgeMode,
    pub line_art_threshold: u8,
    pub resize_filter: ResizeAlgorithm,
    pub jpeg_quality: u8,
    pub optimize_png: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            edge_mode: EdgeMode::Replace,
            line_art_threshold: 64,
            resize_filter: ResizeAlgorithm::Lanczos3,
            jpeg_quality: 90,
            optimize_png: true,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if let EdgeMode::Blend(factor) = self.edge_mode {
            if !(0.0..=1.0).contains(&factor) {
                return Err(PipelineError::InvalidSettings(format!(
                    "edge blend factor must be between 0 and 1, got {}",
                    factor
                )));
            }
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(PipelineError::InvalidSettings(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub processed_count: usize,
    pub total_size_before: u64,
    pub total_size_after: u64,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Encode error: {0}")]
    EncodeError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job state: {0}")]
    InvalidState(String),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
