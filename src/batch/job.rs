// pixform/src/batch/job.rs
use crate::core::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Message recorded on a job stopped by `cancel`.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Snapshot of a batch job as reported by `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: String,
    pub status: JobStatus,
    pub input_location: String,
    pub output_location: String,
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub key: String,
    pub message: String,
}

impl BatchJob {
    pub fn new(input_location: &str, output_location: &str, total_images: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            input_location: input_location.to_string(),
            output_location: output_location.to_string(),
            total_images,
            processed_images: 0,
            failed_images: 0,
            start_time: None,
            end_time: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the job into `processing`. The first call stamps the start time.
    pub fn start(&mut self) -> Result<()> {
        self.ensure_active("start")?;
        self.status = JobStatus::Processing;
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.ensure_active("pause")?;
        self.status = JobStatus::Pending;
        Ok(())
    }

    /// Counts one finished item, failed or not.
    pub fn record_item(&mut self, failed: bool) -> Result<()> {
        self.ensure_active("record progress on")?;
        if self.processed_images >= self.total_images {
            return Err(PipelineError::InvalidState(format!(
                "job {} already processed all {} items",
                self.id, self.total_images
            )));
        }

        self.processed_images += 1;
        if failed {
            self.failed_images += 1;
        }
        Ok(())
    }

    pub fn all_items_processed(&self) -> bool {
        self.processed_images == self.total_images
    }

    pub fn complete(&mut self) -> Result<()> {
        self.ensure_active("complete")?;
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
        }
        self.status = JobStatus::Completed;
        self.end_time = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.ensure_active("fail")?;
        self.status = JobStatus::Error;
        self.error_message = Some(message.into());
        self.end_time = Some(Utc::now());
        Ok(())
    }

    /// Fraction of all items that failed so far.
    pub fn failure_rate(&self) -> f64 {
        if self.total_images == 0 {
            return 0.0;
        }
        self.failed_images as f64 / self.total_images as f64
    }

    pub fn progress_percentage(&self) -> usize {
        if self.total_images == 0 {
            return 100;
        }
        self.processed_images * 100 / self.total_images
    }

    fn ensure_active(&self, action: &str) -> Result<()> {
        if self.is_terminal() {
            return Err(PipelineError::InvalidState(format!(
                "cannot {} job {} in {:?} state",
                action, self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = BatchJob::new("in/", "out/", 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.processed_images, 0);
        assert!(job.start_time.is_none());
        assert_ne!(job.id, BatchJob::new("in/", "out/", 3).id);
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let mut job = BatchJob::new("in/", "out/", 2);
        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        job.record_item(false).unwrap();
        assert!(!job.all_items_processed());
        job.record_item(true).unwrap();
        assert!(job.all_items_processed());
        job.complete().unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_images, 2);
        assert_eq!(job.failed_images, 1);
        assert!(job.end_time.unwrap() >= job.start_time.unwrap());
    }

    #[test]
    fn test_terminal_job_is_immutable() {
        let mut job = BatchJob::new("in/", "out/", 1);
        job.start().unwrap();
        job.fail("storage went away").unwrap();

        assert!(job.start().is_err());
        assert!(job.pause().is_err());
        assert!(job.record_item(false).is_err());
        assert!(job.complete().is_err());
        assert_eq!(job.processed_images, 0);
        assert_eq!(job.error_message.as_deref(), Some("storage went away"));
    }

    #[test]
    fn test_processed_never_exceeds_total() {
        let mut job = BatchJob::new("in/", "out/", 0);
        job.start().unwrap();
        assert!(job.record_item(false).is_err());
        assert_eq!(job.progress_percentage(), 100);
    }

    #[test]
    fn test_pause_reports_pending_and_keeps_start_time() {
        let mut job = BatchJob::new("in/", "out/", 5);
        job.start().unwrap();
        let started = job.start_time;

        job.pause().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        job.start().unwrap();
        assert_eq!(job.start_time, started);
    }

    #[test]
    fn test_serializes_camel_case() {
        let job = BatchJob::new("s3://in/", "s3://out/", 150);
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"totalImages\":150"));
        assert!(json.contains("\"status\":\"pending\""));

        let back: BatchJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
