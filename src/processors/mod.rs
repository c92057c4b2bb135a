// pixform/src/processors/mod.rs
pub mod adjust;
pub mod blur;
mod compressor;
pub mod edges;
mod loader;
pub mod pipeline;
pub mod pixelate;
pub mod posterize;
mod resizer;

pub use compressor::Compressor;
pub use loader::Loader;
pub use pipeline::{transform, Pipeline};
pub use resizer::Resizer;
