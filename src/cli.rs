// pixform/src/cli.rs
use crate::core::{
    update_settings, BackgroundColor, EdgeMode, OutputFormat, PipelineError, PipelineOptions,
    ResizeAlgorithm, Result, SettingUpdate, Settings,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pixform", version, about = "Image effect pipeline and batch processor")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the effect pipeline to a single image
    Process {
        input: PathBuf,

        /// Output file (defaults to a new file next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,

        #[arg(long, value_enum, default_value_t = Format::Same)]
        format: Format,
    },

    /// Process every image under an input location into an output location
    Batch {
        /// Input directory or file:// location
        input: String,

        /// Output directory or file:// location
        output: String,

        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Number of worker threads
        #[arg(short = 'j', long, default_value_t = 4)]
        workers: usize,

        /// Abort once this fraction of all images has failed
        #[arg(long, default_value_t = 0.5)]
        max_failure_rate: f64,

        /// Per-image fetch/write timeout in seconds, 0 disables it
        #[arg(long, default_value_t = 30)]
        item_timeout: u64,

        #[arg(long, value_enum, default_value_t = Format::Same)]
        format: Format,

        /// Directory where job snapshots are written
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Print the effective settings as JSON
    Settings {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Show a persisted batch job snapshot
    Status {
        state_dir: PathBuf,
        job_id: String,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// JSON settings file, applied before any flag
    #[arg(long = "settings", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Mosaic block size (0-50)
    #[arg(long)]
    pub pixelation: Option<u32>,

    /// Gaussian blur radius (0-20, step 0.5)
    #[arg(long)]
    pub blur: Option<f32>,

    /// Levels per channel (2-16, 16 disables posterize)
    #[arg(long)]
    pub posterize: Option<u8>,

    /// Contrast percent (0-200)
    #[arg(long)]
    pub contrast: Option<u32>,

    /// Brightness percent (0-200)
    #[arg(long)]
    pub brightness: Option<u32>,

    /// Saturation percent (0-200)
    #[arg(long)]
    pub saturation: Option<u32>,

    /// Longest output edge (256-2048, step 64)
    #[arg(long)]
    pub output_size: Option<u32>,

    /// white, black, gray, transparent or #rrggbb
    #[arg(long)]
    pub background: Option<String>,

    #[arg(long)]
    pub edge_detection: bool,

    #[arg(long)]
    pub line_art: bool,

    /// Override any setting, e.g. --set contrast=120
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

impl SettingsArgs {
    /// Builds settings from the file, then the flags, then `--set` overrides.
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = match &self.file {
            Some(path) => Settings::from_json_file(path)?,
            None => Settings::default(),
        };

        let updates = [
            self.pixelation.map(SettingUpdate::Pixelation),
            self.blur.map(SettingUpdate::Blur),
            self.posterize.map(SettingUpdate::Posterize),
            self.contrast.map(SettingUpdate::Contrast),
            self.brightness.map(SettingUpdate::Brightness),
            self.saturation.map(SettingUpdate::Saturation),
            self.output_size.map(SettingUpdate::OutputSize),
            self.background
                .as_deref()
                .map(str::parse::<BackgroundColor>)
                .transpose()?
                .map(SettingUpdate::BackgroundColor),
            self.edge_detection.then_some(SettingUpdate::EdgeDetection(true)),
            self.line_art.then_some(SettingUpdate::LineArt(true)),
        ];

        for update in updates.into_iter().flatten() {
            settings = settings.with(update)?;
        }

        for pair in &self.overrides {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                PipelineError::InvalidSettings(format!(
                    "expected KEY=VALUE, got '{}'",
                    pair
                ))
            })?;
            settings = update_settings(&settings, key.trim(), value)?;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Resampling filter for the final resize
    #[arg(long, value_enum, default_value_t = Algorithm::Lanczos3)]
    pub filter: Algorithm,

    /// Blend the edge map instead of replacing the image (0.0-1.0)
    #[arg(long)]
    pub edge_blend: Option<f32>,

    /// Edge strength that becomes a line-art stroke (0-255)
    #[arg(long, default_value_t = 64)]
    pub line_threshold: u8,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = 90)]
    pub quality: u8,

    /// Skip oxipng optimization of PNG output
    #[arg(long)]
    pub no_png_optimize: bool,
}

impl From<&PipelineArgs> for PipelineOptions {
    fn from(args: &PipelineArgs) -> Self {
        Self {
            edge_mode: args.edge_blend.map_or(EdgeMode::Replace, EdgeMode::Blend),
            line_art_threshold: args.line_threshold,
            resize_filter: args.filter.into(),
            jpeg_quality: args.quality,
            optimize_png: !args.no_png_optimize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl From<Algorithm> for ResizeAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Nearest => ResizeAlgorithm::Nearest,
            Algorithm::Bilinear => ResizeAlgorithm::Bilinear,
            Algorithm::Bicubic => ResizeAlgorithm::Bicubic,
            Algorithm::Lanczos3 => ResizeAlgorithm::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Same,
    Jpeg,
    Png,
    Webp,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Same => OutputFormat::SameAsInput,
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
            Format::Webp => OutputFormat::WebP,
        }
    }
}
