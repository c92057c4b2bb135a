mod cli;
pub mod batch;
pub mod core;
pub mod processors;
mod utils;

pub use batch::{
    read_snapshot, BatchConfig, BatchCoordinator, BatchJob, FsStorage, ItemFailure, JobStatus,
    MemoryStorage, Storage,
};
pub use cli::{Algorithm, Cli, Commands, Format, PipelineArgs, SettingsArgs};
pub use crate::core::processor::ImageProcessor;
pub use crate::core::{
    update_settings, BackgroundColor, EdgeMode, OutputFormat, PipelineError,
    PipelineOptions, ProcessingStats, ResizeAlgorithm, Result, SettingUpdate, Settings,
};
pub use processors::{transform, Compressor, Loader, Pipeline, Resizer};
pub use utils::{
    format_file_size, generate_output_path, is_supported_format, is_supported_key, output_key,
};

pub mod prelude {
    pub use crate::{
        transform, BatchConfig, BatchCoordinator, BatchJob, FsStorage, ImageProcessor, JobStatus,
        PipelineOptions, Settings, Storage,
    };
}

// Re-export commonly used types
pub use image::DynamicImage;
