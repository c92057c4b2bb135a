// pixform/src/batch/coordinator.rs
use super::job::{BatchJob, ItemFailure, CANCELLED_MESSAGE};
use super::storage::Storage;
use crate::core::processor::ImageProcessor;
use crate::core::{OutputFormat, PipelineError, PipelineOptions, Result, Settings};
use crate::utils::{is_supported_key, output_key};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads per job.
    pub workers: usize,
    /// The job aborts once `failed / total` rises above this.
    pub max_failure_rate: f64,
    /// Limit on a single fetch or write. Zero disables the limit.
    pub item_timeout: Duration,
    pub output_format: OutputFormat,
    /// Directory for `<job id>.json` snapshots.
    pub state_dir: Option<PathBuf>,
    pub options: PipelineOptions,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_failure_rate: 0.5,
            item_timeout: Duration::from_secs(30),
            output_format: OutputFormat::SameAsInput,
            state_dir: None,
            options: PipelineOptions::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidSettings(
                "worker count must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.max_failure_rate) {
            return Err(PipelineError::InvalidSettings(format!(
                "max failure rate must be between 0 and 1, got {}",
                self.max_failure_rate
            )));
        }

        self.options.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Queued,
    InFlight,
    Done,
    Failed,
}

struct JobState {
    job: BatchJob,
    keys: Vec<String>,
    items: Vec<ItemState>,
    failures: Vec<ItemFailure>,
    paused: bool,
    revision: u64,
}

/// Owner of one job's state. Every transition happens under `state`.
struct JobHandle {
    state: Mutex<JobState>,
    changed: Condvar,
    cancelled: AtomicBool,
    /// Revision of the last snapshot written to the state directory.
    persisted: Mutex<u64>,
}

impl JobHandle {
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, JobState>) -> MutexGuard<'a, JobState> {
        self.changed
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Releases the job lock, writes the snapshot and wakes waiters.
    ///
    /// Only a terminal snapshot is written while the lock is held, so it is
    /// on disk before any `wait` can observe the terminal state.
    fn publish(&self, state_dir: Option<&Path>, mut state: MutexGuard<'_, JobState>) -> BatchJob {
        state.revision += 1;
        let revision = state.revision;
        let job = state.job.clone();

        if job.is_terminal() {
            self.persist(state_dir, revision, &job);
            drop(state);
        } else {
            drop(state);
            self.persist(state_dir, revision, &job);
        }

        self.changed.notify_all();
        job
    }

    /// Snapshots may be published out of order by different workers, so an
    /// older revision never overwrites a newer one.
    fn persist(&self, state_dir: Option<&Path>, revision: u64, job: &BatchJob) {
        let Some(dir) = state_dir else {
            return;
        };

        let mut written = self
            .persisted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if revision <= *written {
            return;
        }

        match write_snapshot(dir, job) {
            Ok(()) => *written = revision,
            Err(e) => log::warn!("Failed to persist job {}: {}", job.id, e),
        }
    }
}

/// Runs the pipeline over every image under an input location.
///
/// Each submitted job gets a driver thread that owns a `rayon` pool of
/// `workers` threads. Workers pull the first queued item, so dispatch follows
/// enumeration order while completions land in any order.
pub struct BatchCoordinator {
    storage: Arc<dyn Storage>,
    config: BatchConfig,
    jobs: RwLock<HashMap<String, Arc<JobHandle>>>,
}

impl BatchCoordinator {
    pub fn new(storage: Arc<dyn Storage>, config: BatchConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            storage,
            config,
            jobs: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Enumerates the input location and starts a job over its images.
    ///
    /// Settings are checked before anything else and a failed listing is
    /// returned to the caller instead of creating a job.
    pub fn submit(
        &self,
        input_location: &str,
        output_location: &str,
        settings: Settings,
    ) -> Result<BatchJob> {
        settings.validate()?;

        if input_location.trim().is_empty() || output_location.trim().is_empty() {
            return Err(PipelineError::InvalidLocation(
                "Input and output locations are required".to_string(),
            ));
        }

        if input_location == output_location {
            return Err(PipelineError::InvalidLocation(
                "Input and output locations cannot be the same".to_string(),
            ));
        }

        let mut keys: Vec<String> = self
            .storage
            .list(input_location)
            .map_err(|e| match e {
                PipelineError::StorageUnavailable(_) => e,
                other => PipelineError::StorageUnavailable(other.to_string()),
            })?
            .into_iter()
            .filter(|key| is_supported_key(key))
            .collect();
        keys.sort();
        keys.dedup();

        if keys.is_empty() {
            log::warn!("No image files found in {}", input_location);
        }

        let job = BatchJob::new(input_location, output_location, keys.len());
        let snapshot = job.clone();

        log::info!(
            "Submitted job {}: {} images from {} to {}",
            job.id,
            job.total_images,
            input_location,
            output_location
        );

        let handle = Arc::new(JobHandle {
            state: Mutex::new(JobState {
                job,
                items: vec![ItemState::Queued; keys.len()],
                keys,
                failures: Vec::new(),
                paused: false,
                revision: 1,
            }),
            changed: Condvar::new(),
            cancelled: AtomicBool::new(false),
            persisted: Mutex::new(0),
        });

        handle.persist(self.config.state_dir.as_deref(), 1, &snapshot);
        self.jobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(snapshot.id.clone(), Arc::clone(&handle));

        let context = JobContext {
            handle: Arc::clone(&handle),
            storage: Arc::clone(&self.storage),
            processor: ImageProcessor::new(settings, self.config.options.clone())
                .with_output_format(self.config.output_format),
            input_location: input_location.to_string(),
            output_location: output_location.to_string(),
            config: self.config.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(format!("pixform-job-{}", &snapshot.id[..8]))
            .spawn(move || context.run());

        if let Err(e) = spawned {
            let mut state = handle.lock();
            let _ = state.job.fail(format!("failed to start job: {}", e));
            handle.publish(self.config.state_dir.as_deref(), state);
            return Err(PipelineError::Io(e));
        }

        Ok(snapshot)
    }

    /// Stops dispatching new items. In-flight items still finish and count.
    pub fn pause(&self, job_id: &str) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let mut state = handle.lock();

        state.job.pause()?;
        state.paused = true;
        log::info!("Paused job {}", job_id);

        Ok(handle.publish(self.config.state_dir.as_deref(), state))
    }

    /// Continues dispatch from the first item not yet taken by a worker.
    pub fn resume(&self, job_id: &str) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let mut state = handle.lock();

        if !state.paused {
            return Err(PipelineError::InvalidState(format!(
                "job {} is not paused",
                job_id
            )));
        }

        state.job.start()?;
        state.paused = false;
        log::info!("Resumed job {}", job_id);

        Ok(handle.publish(self.config.state_dir.as_deref(), state))
    }

    /// Moves the job to `error`. Results of items still in flight are dropped.
    pub fn cancel(&self, job_id: &str) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let mut state = handle.lock();

        state.job.fail(CANCELLED_MESSAGE)?;
        handle.cancelled.store(true, Ordering::SeqCst);
        state.paused = false;
        log::info!(
            "Cancelled job {} after {}/{} images",
            job_id,
            state.job.processed_images,
            state.job.total_images
        );

        Ok(handle.publish(self.config.state_dir.as_deref(), state))
    }

    pub fn status(&self, job_id: &str) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let state = handle.lock();
        Ok(state.job.clone())
    }

    pub fn failures(&self, job_id: &str) -> Result<Vec<ItemFailure>> {
        let handle = self.handle(job_id)?;
        let state = handle.lock();
        Ok(state.failures.clone())
    }

    pub fn jobs(&self) -> Vec<BatchJob> {
        let handles: Vec<Arc<JobHandle>> = self
            .jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();

        let mut jobs: Vec<BatchJob> = handles.iter().map(|h| h.lock().job.clone()).collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    /// Blocks until the job reaches `completed` or `error`.
    pub fn wait(&self, job_id: &str) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let mut state = handle.lock();
        while !state.job.is_terminal() {
            state = handle.wait(state);
        }
        Ok(state.job.clone())
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout` and returns the
    /// current snapshot.
    pub fn wait_timeout(&self, job_id: &str, timeout: Duration) -> Result<BatchJob> {
        let handle = self.handle(job_id)?;
        let deadline = Instant::now() + timeout;
        let mut state = handle.lock();

        while !state.job.is_terminal() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = handle
                .changed
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        Ok(state.job.clone())
    }

    fn handle(&self, job_id: &str) -> Result<Arc<JobHandle>> {
        self.jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(job_id)
            .cloned()
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }
}

/// Everything a job's driver and workers need, owned by the driver thread.
struct JobContext {
    handle: Arc<JobHandle>,
    storage: Arc<dyn Storage>,
    processor: ImageProcessor,
    input_location: String,
    output_location: String,
    config: BatchConfig,
}

impl JobContext {
    fn run(self) {
        let workers = {
            let mut state = self.handle.lock();
            if state.job.is_terminal() {
                return;
            }

            if state.job.total_images == 0 {
                let _ = state.job.complete();
                log::info!("Job {} had no images to process", state.job.id);
                self.publish(state);
                return;
            }

            if !state.paused {
                let _ = state.job.start();
            }
            let workers = self.config.workers.min(state.job.total_images);
            self.publish(state);
            workers
        };

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pixform-worker-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                let mut state = self.handle.lock();
                let _ = state.job.fail(format!("Failed to create thread pool: {}", e));
                self.publish(state);
                return;
            }
        };

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            pool.scope(|scope| {
                for worker in 0..workers {
                    let context = &self;
                    scope.spawn(move |_| context.worker_loop(worker));
                }
            })
        }));

        let mut state = self.handle.lock();
        let job = if state.job.is_terminal() {
            let job = state.job.clone();
            drop(state);
            job
        } else {
            let message = match outcome {
                Err(payload) => format!("Worker stopped: {}", panic_message(&*payload)),
                Ok(()) => "Workers exited before every image was processed".to_string(),
            };
            log::error!("Job {} aborted: {}", state.job.id, message);
            let _ = state.job.fail(message);
            self.publish(state)
        };
        log::info!(
            "Job {} finished as {:?}: {}/{} processed, {} failed in {:.2?}",
            job.id,
            job.status,
            job.processed_images,
            job.total_images,
            job.failed_images,
            started.elapsed()
        );
    }

    fn worker_loop(&self, worker: usize) {
        while let Some((index, key)) = self.next_item() {
            log::debug!("Worker {} processing {}", worker, key);
            let result = catch_unwind(AssertUnwindSafe(|| self.process_item(&key)))
                .unwrap_or_else(|payload| {
                    Err(PipelineError::Panicked(panic_message(&*payload)))
                });
            self.finish_item(index, &key, result);
        }
        log::debug!("Worker {} idle", worker);
    }

    fn next_item(&self) -> Option<(usize, String)> {
        let mut state = self.handle.lock();
        loop {
            if state.job.is_terminal() || self.handle.is_cancelled() {
                return None;
            }

            if state.paused {
                state = self.handle.wait(state);
                continue;
            }

            let index = state.items.iter().position(|s| *s == ItemState::Queued)?;
            state.items[index] = ItemState::InFlight;
            return Some((index, state.keys[index].clone()));
        }
    }

    fn process_item(&self, key: &str) -> Result<()> {
        let data = {
            let storage = Arc::clone(&self.storage);
            let location = self.input_location.clone();
            let key = key.to_string();
            with_timeout(self.config.item_timeout, format!("fetch {}", key), move || {
                storage.get(&location, &key)
            })?
        };
        self.check_cancelled()?;

        let target = output_key(key, self.config.output_format);
        let encoded = self.processor.process_item(&data, &target)?;
        self.check_cancelled()?;

        let storage = Arc::clone(&self.storage);
        let location = self.output_location.clone();
        with_timeout(self.config.item_timeout, format!("write {}", target), move || {
            storage.put(&location, &target, &encoded)
        })
    }

    fn finish_item(&self, index: usize, key: &str, result: Result<()>) {
        let mut state = self.handle.lock();
        if state.job.is_terminal() {
            log::debug!("Discarding result for {} from stopped job", key);
            return;
        }

        let failed = match result {
            Ok(()) => {
                state.items[index] = ItemState::Done;
                false
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", key, e);
                state.items[index] = ItemState::Failed;
                state.failures.push(ItemFailure {
                    key: key.to_string(),
                    message: e.to_string(),
                });
                true
            }
        };

        if let Err(e) = state.job.record_item(failed) {
            log::warn!("Dropping progress for {}: {}", key, e);
            return;
        }

        if state.job.failure_rate() > self.config.max_failure_rate {
            let first = state
                .failures
                .first()
                .map(|f| format!("{}: {}", f.key, f.message))
                .unwrap_or_default();
            let message = format!(
                "Failure rate {:.0}% exceeded the {:.0}% limit; first failure {}",
                state.job.failure_rate() * 100.0,
                self.config.max_failure_rate * 100.0,
                first
            );
            log::error!("Job {} aborted: {}", state.job.id, message);
            let _ = state.job.fail(message);
        } else if state.job.all_items_processed() {
            let _ = state.job.complete();
        }

        self.publish(state);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.handle.is_cancelled() {
            return Err(PipelineError::Cancelled(CANCELLED_MESSAGE.to_string()));
        }
        Ok(())
    }

    fn publish(&self, state: MutexGuard<'_, JobState>) -> BatchJob {
        self.handle.publish(self.config.state_dir.as_deref(), state)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a storage call on its own thread and gives up after `timeout`.
///
/// A timed-out call cannot be stopped: its thread is left to finish on its
/// own, and a timed-out `put` may still land in the output location even
/// though the item is reported as failed. Storage that stalls indefinitely
/// keeps one parked thread per timed-out call.
fn with_timeout<T, F>(timeout: Duration, what: String, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    if timeout.is_zero() {
        return op();
    }

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("pixform-io".to_string())
        .spawn(move || {
            let _ = tx.send(op());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("{} timed out after {:?}, leaving it running", what, timeout);
            Err(PipelineError::StorageUnavailable(format!(
                "{} timed out after {:?}",
                what, timeout
            )))
        }
        Err(RecvTimeoutError::Disconnected) => Err(PipelineError::StorageUnavailable(format!(
            "{} aborted",
            what
        ))),
    }
}

fn write_snapshot(dir: &Path, job: &BatchJob) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", job.id));
    let tmp = dir.join(format!("{}.json.tmp", job.id));

    let data = serde_json::to_vec_pretty(job).map_err(std::io::Error::from)?;
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Reads a snapshot written by a coordinator configured with `state_dir`.
pub fn read_snapshot(state_dir: &Path, job_id: &str) -> Result<BatchJob> {
    let path = state_dir.join(format!("{}.json", job_id));
    if !path.exists() {
        return Err(PipelineError::JobNotFound(job_id.to_string()));
    }

    let data = std::fs::read(&path)?;
    let job = serde_json::from_slice(&data).map_err(std::io::Error::from)?;
    Ok(job)
}
