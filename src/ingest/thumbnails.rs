//! Background thumbnail job queue.
//!
//! One FIFO channel, one worker task started at construction, and a
//! single-permit semaphore around the extractor: at most one extraction runs
//! at any instant no matter how many callers enqueue.
//!
//! ```text
//! enqueue() ──► [mpsc FIFO] ──► worker ──► permit(1) ──► extractor (timeout, retry)
//!    │                             │
//!    └── queued += 1               └── queued -= 1, active += 1 ... active -= 1
//! ```
//!
//! The `queued`/`active` counters are only touched inside the state mutex;
//! the extraction itself runs outside it, on a task of its own.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::adapters::FrameExtractor;
use crate::config::ThumbnailSettings;

/// Errors from a single extraction attempt, or from the queue itself
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThumbnailError {
    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Extractor panicked: {0}")]
    Panicked(String),

    #[error("Thumbnail worker is not running")]
    QueueClosed,
}

/// Ephemeral work descriptor; never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailJob {
    pub video_path: PathBuf,
    pub output_path: PathBuf,
    pub duration: Option<Duration>,
}

impl ThumbnailJob {
    pub fn new(video_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            output_path: output_path.into(),
            duration: None,
        }
    }

    /// Attach a known video duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Terminal state of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// The extractor produced `output_path`
    Generated { output_path: PathBuf, attempts: u32 },

    /// Every attempt failed; the job was dropped
    Abandoned {
        output_path: PathBuf,
        attempts: u32,
        error: ThumbnailError,
    },
}

impl ThumbnailOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, ThumbnailOutcome::Generated { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ThumbnailOutcome::Generated { attempts, .. }
            | ThumbnailOutcome::Abandoned { attempts, .. } => *attempts,
        }
    }
}

/// Handle to the eventual outcome of an enqueued job
#[derive(Debug)]
pub struct ThumbnailTicket {
    rx: oneshot::Receiver<ThumbnailOutcome>,
}

impl ThumbnailTicket {
    /// Wait for the job to reach a terminal state.
    ///
    /// Returns `None` only if the worker went away without finishing the job.
    pub async fn outcome(self) -> Option<ThumbnailOutcome> {
        self.rx.await.ok()
    }
}

/// Snapshot of queue load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting in the FIFO
    pub queued: usize,
    /// Jobs taken by the worker and not yet finished
    pub active: usize,
}

impl QueueStats {
    pub fn is_idle(&self) -> bool {
        self.queued == 0 && self.active == 0
    }
}

struct QueuedJob {
    job: ThumbnailJob,
    reply: oneshot::Sender<ThumbnailOutcome>,
}

/// Decrements `active` when a job finishes, however it finishes
struct ActiveGuard(Arc<Shared>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.active = state.active.saturating_sub(1);
    }
}

struct Shared {
    state: Mutex<QueueStats>,
    permits: Semaphore,
    extractor: Arc<dyn FrameExtractor>,
    settings: ThumbnailSettings,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueStats> {
        // Counters stay consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Bounded-concurrency thumbnail scheduler
pub struct ThumbnailQueue {
    shared: Arc<Shared>,
    sender: mpsc::UnboundedSender<QueuedJob>,
}

impl ThumbnailQueue {
    /// Create the queue and start its worker. Must be called inside a Tokio
    /// runtime.
    pub fn new(extractor: Arc<dyn FrameExtractor>, settings: ThumbnailSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueStats::default()),
            permits: Semaphore::new(1),
            extractor,
            settings,
        });

        tokio::spawn(run_worker(shared.clone(), receiver));
        info!(extractor = shared.extractor.name(), "Thumbnail worker started");

        Self { shared, sender }
    }

    /// Append a job to the FIFO. Never waits for extraction.
    pub fn enqueue(&self, job: ThumbnailJob) -> Result<ThumbnailTicket, ThumbnailError> {
        let (reply, rx) = oneshot::channel();
        let output = job.output_path.clone();

        {
            let mut state = self.shared.state();
            self.sender
                .send(QueuedJob { job, reply })
                .map_err(|_| ThumbnailError::QueueClosed)?;
            state.queued += 1;
        }

        debug!(output = %output.display(), "Thumbnail job enqueued");
        Ok(ThumbnailTicket { rx })
    }

    /// Current queue load
    pub fn stats(&self) -> QueueStats {
        *self.shared.state()
    }

    /// Completion barrier: returns once the FIFO is empty and no job is
    /// executing.
    pub async fn wait_for_completion(&self) {
        let interval = self.shared.settings.poll_interval();
        while !self.stats().is_idle() {
            sleep(interval).await;
        }
    }
}

async fn run_worker(shared: Arc<Shared>, mut receiver: mpsc::UnboundedReceiver<QueuedJob>) {
    while let Some(QueuedJob { job, reply }) = receiver.recv().await {
        let _active = {
            let mut state = shared.state();
            state.queued = state.queued.saturating_sub(1);
            state.active += 1;
            ActiveGuard(shared.clone())
        };

        let outcome = process_job(&shared, &job).await;
        // The caller may have dropped its ticket
        let _ = reply.send(outcome);
    }

    debug!("Thumbnail worker stopped");
}

/// Run one job under the permit with timeout and fixed-delay retry
async fn process_job(shared: &Shared, job: &ThumbnailJob) -> ThumbnailOutcome {
    let max_attempts = shared.settings.max_attempts.max(1);
    let limit = shared.settings.timeout();
    let delay = shared.settings.retry_delay();

    let _permit = match shared.permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return ThumbnailOutcome::Abandoned {
                output_path: job.output_path.clone(),
                attempts: 0,
                error: ThumbnailError::QueueClosed,
            }
        }
    };

    let mut attempt = 0u32;
    loop {
        attempt += 1;

        match run_attempt(shared.extractor.clone(), job.clone(), limit).await {
            Ok(()) => {
                debug!(output = %job.output_path.display(), attempt, "Thumbnail generated");
                return ThumbnailOutcome::Generated {
                    output_path: job.output_path.clone(),
                    attempts: attempt,
                };
            }
            Err(error) if attempt < max_attempts => {
                warn!(
                    output = %job.output_path.display(),
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "Thumbnail attempt failed, retrying"
                );
                sleep(delay).await;
            }
            Err(error) => {
                warn!(
                    output = %job.output_path.display(),
                    attempts = attempt,
                    %error,
                    "Thumbnail generation abandoned"
                );
                return ThumbnailOutcome::Abandoned {
                    output_path: job.output_path.clone(),
                    attempts: attempt,
                    error,
                };
            }
        }
    }
}

/// One extraction attempt on its own task, so a panicking extractor costs
/// an attempt instead of the worker. The task is aborted on timeout.
async fn run_attempt(
    extractor: Arc<dyn FrameExtractor>,
    job: ThumbnailJob,
    limit: Duration,
) -> Result<(), ThumbnailError> {
    let mut handle = tokio::spawn(async move {
        extractor
            .extract(&job.video_path, &job.output_path, job.duration)
            .await
    });

    match timeout(limit, &mut handle).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(ThumbnailError::Extraction(format!("{e:#}"))),
        Ok(Err(join_err)) => Err(ThumbnailError::Panicked(join_err.to_string())),
        Err(_) => {
            handle.abort();
            Err(ThumbnailError::Timeout(limit))
        }
    }
}
