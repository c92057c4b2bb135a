use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use pixform::{
    format_file_size, generate_output_path, read_snapshot, BatchConfig, BatchCoordinator, BatchJob,
    Cli, Commands, Format, FsStorage, ImageProcessor, JobStatus, OutputFormat, PipelineArgs,
    PipelineOptions, SettingsArgs,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Process {
            input,
            output,
            settings,
            pipeline,
            format,
        } => process_single(&input, output.as_deref(), &settings, &pipeline, format),
        Commands::Batch {
            input,
            output,
            settings,
            pipeline,
            workers,
            max_failure_rate,
            item_timeout,
            format,
            state_dir,
        } => {
            let config = BatchConfig {
                workers,
                max_failure_rate,
                item_timeout: Duration::from_secs(item_timeout),
                output_format: format.into(),
                state_dir,
                options: PipelineOptions::from(&pipeline),
            };
            process_batch(&input, &output, &settings, config)
        }
        Commands::Settings { settings } => {
            let settings = settings.resolve()?;
            println!("{}", settings.to_json());
            Ok(())
        }
        Commands::Status { state_dir, job_id } => show_status(&state_dir, &job_id),
    }
}

fn process_single(
    input: &Path,
    output: Option<&Path>,
    settings: &SettingsArgs,
    pipeline: &PipelineArgs,
    format: Format,
) -> Result<()> {
    let settings = settings.resolve().context("invalid settings")?;
    let format: OutputFormat = format.into();
    let output_path: PathBuf = generate_output_path(input, output, "processed", format);

    let processor =
        ImageProcessor::new(settings, PipelineOptions::from(pipeline)).with_output_format(format);
    let stats = processor
        .process(input, output_path.as_path())
        .with_context(|| format!("failed to process {}", input.display()))?;

    println!(
        "Processed image saved to: {} ({} -> {})",
        output_path.display(),
        format_file_size(stats.total_size_before),
        format_file_size(stats.total_size_after)
    );

    Ok(())
}

fn process_batch(
    input: &str,
    output: &str,
    settings: &SettingsArgs,
    config: BatchConfig,
) -> Result<()> {
    let settings = settings.resolve().context("invalid settings")?;
    let coordinator = BatchCoordinator::new(Arc::new(FsStorage::new()), config)?;

    let job = coordinator
        .submit(input, output, settings)
        .with_context(|| format!("failed to start batch over {}", input))?;

    let pb = create_progress_bar(job.total_images);
    let finished = loop {
        let snapshot = coordinator.wait_timeout(&job.id, Duration::from_millis(200))?;
        pb.set_position(snapshot.processed_images as u64);
        pb.set_message(format!("{} failed", snapshot.failed_images));
        if snapshot.is_terminal() {
            break snapshot;
        }
    };
    pb.finish_and_clear();

    for failure in coordinator.failures(&job.id)? {
        eprintln!("  {}: {}", failure.key, failure.message);
    }
    print_job(&finished);

    if finished.status == JobStatus::Error {
        anyhow::bail!(
            "batch job {} failed: {}",
            finished.id,
            finished.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn show_status(state_dir: &Path, job_id: &str) -> Result<()> {
    let job = read_snapshot(state_dir, job_id)
        .with_context(|| format!("no snapshot for job {} in {}", job_id, state_dir.display()))?;
    print_job(&job);
    Ok(())
}

fn print_job(job: &BatchJob) {
    println!("=== Batch Job {} ===", job.id);
    println!("Status: {:?}", job.status);
    println!("Input: {}", job.input_location);
    println!("Output: {}", job.output_location);
    println!(
        "Progress: {}/{} ({}%), {} failed",
        job.processed_images,
        job.total_images,
        job.progress_percentage(),
        job.failed_images
    );
    if let (Some(start), Some(end)) = (job.start_time, job.end_time) {
        let elapsed = (end - start).num_milliseconds() as f64 / 1000.0;
        println!("Elapsed: {:.2}s", elapsed);
    }
    if let Some(message) = &job.error_message {
        println!("Error: {}", message);
    }
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}
