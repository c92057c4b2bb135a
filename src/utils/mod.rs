// pixform/src/utils/mod.rs
use crate::core::OutputFormat;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

/// Output path for single-image mode: the explicit path, or
/// `<stem>_<suffix>_<timestamp>.<ext>` next to the input.
pub fn generate_output_path(
    input_path: &Path,
    output: Option<&Path>,
    suffix: &str,
    format: OutputFormat,
) -> PathBuf {
    if let Some(path) = output {
        return path.to_path_buf();
    }

    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let extension = format
        .extension()
        .map(str::to_string)
        .or_else(|| get_file_extension(input_path))
        .unwrap_or_else(|| "png".to_string());

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut candidate = input_path.with_file_name(format!("{}_{}_{}.{}", stem, suffix, timestamp, extension));
    let mut counter = 1;

    while candidate.exists() {
        candidate = input_path.with_file_name(format!(
            "{}_{}_{}_{}.{}",
            stem, suffix, timestamp, counter, extension
        ));
        counter += 1;
    }

    candidate
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as i32).min(UNITS.len() as i32 - 1);
    let size = bytes_f64 / base.powi(exponent);

    format!("{:.2} {}", size, UNITS[exponent as usize])
}

pub fn is_supported_format(path: &Path) -> bool {
    get_file_extension(path)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether a storage key names an image the batch coordinator should process.
pub fn is_supported_key(key: &str) -> bool {
    !key.ends_with('/') && is_supported_format(Path::new(key))
}

/// Output key mirroring `key`, with the extension swapped when a format is forced.
pub fn output_key(key: &str, format: OutputFormat) -> String {
    let Some(extension) = format.extension() else {
        return key.to_string();
    };

    let (dir, name) = match key.rfind('/') {
        Some(pos) => key.split_at(pos + 1),
        None => ("", key),
    };
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    };

    format!("{}{}.{}", dir, stem, extension)
}

pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}
