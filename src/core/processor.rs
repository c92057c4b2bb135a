// pixform/src/core/processor.rs
use super::{OutputFormat, PipelineError, PipelineOptions, ProcessingStats, Result, Settings};
use crate::processors::{Compressor, Loader, Pipeline};
use image::ImageFormat;
use std::path::{Component, Path};

/// Single-image mode: decode, transform, encode.
pub struct ImageProcessor {
    settings: Settings,
    output_format: OutputFormat,
    loader: Loader,
    pipeline: Pipeline,
    compressor: Compressor,
}

impl ImageProcessor {
    pub fn new(settings: Settings, options: PipelineOptions) -> Self {
        let compressor = Compressor::new(options.jpeg_quality)
            .with_png_optimization(options.optimize_png);

        Self {
            settings,
            output_format: OutputFormat::SameAsInput,
            loader: Loader::new(),
            pipeline: Pipeline::new(options),
            compressor,
        }
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Transforms encoded image bytes and encodes the result as `format`.
    pub fn process_bytes(&self, data: &[u8], format: ImageFormat) -> Result<Vec<u8>> {
        self.settings.validate()?;

        let image = self.loader.load_from_bytes(data)?;
        let output = self.pipeline.transform(&image, &self.settings)?;
        self.compressor.compress_to_bytes(&output, format)
    }

    /// Transforms the bytes behind `key`, choosing the encoding from the
    /// configured output format, then the key's extension, then the input.
    pub fn process_item(&self, data: &[u8], key: &str) -> Result<Vec<u8>> {
        let format = self.resolve_format(data, key)?;
        self.process_bytes(data, format)
    }

    pub fn process<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> Result<ProcessingStats> {
        self.process_file(input_path.as_ref(), output_path.as_ref())
    }

    pub fn process_file(&self, input_path: &Path, output_path: &Path) -> Result<ProcessingStats> {
        self.settings.validate()?;
        self.validate_paths(input_path, output_path)?;

        let data = std::fs::read(input_path)?;
        let format = self.resolve_format(&data, &output_path.to_string_lossy())?;

        let image = self.loader.load_from_bytes(&data)?;
        let output = self.pipeline.transform(&image, &self.settings)?;
        let new_size = self.compressor.save_with_format(&output, output_path, format)?;

        let stats = ProcessingStats {
            processed_count: 1,
            total_size_before: data.len() as u64,
            total_size_after: new_size,
        };

        log::info!(
            "Processed {} -> {} ({:.1}% smaller)",
            input_path.display(),
            output_path.display(),
            self.compressor
                .calculate_savings(stats.total_size_before, stats.total_size_after)
        );

        Ok(stats)
    }

    fn resolve_format(&self, data: &[u8], key: &str) -> Result<ImageFormat> {
        let format = match self.output_format {
            OutputFormat::Jpeg => Some(ImageFormat::Jpeg),
            OutputFormat::Png => Some(ImageFormat::Png),
            OutputFormat::WebP => Some(ImageFormat::WebP),
            OutputFormat::SameAsInput => self
                .loader
                .detect_format(key)
                .or_else(|| self.loader.guess_format(data)),
        };

        format.ok_or_else(|| {
            PipelineError::EncodeError(format!("Cannot determine output format for {}", key))
        })
    }

    fn validate_paths(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        if has_parent_component(input_path) {
            return Err(PipelineError::InvalidLocation(
                "Path traversal detected in input path".to_string(),
            ));
        }

        if has_parent_component(output_path) {
            return Err(PipelineError::InvalidLocation(
                "Path traversal detected in output path".to_string(),
            ));
        }

        if !input_path.exists() {
            return Err(PipelineError::InvalidLocation(format!(
                "Input file does not exist: {}",
                input_path.display()
            )));
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(())
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}
