//! Events and tuning for the upload flow.

use std::time::Duration;

use oseh_protocol::JobIndicator;
use oseh_transfer::HashConfig;

/// Default number of parts in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Progress event emitted during an upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Computing the file digest.
    Hashing { hashed: u64, total: u64 },
    /// Searching for an already processed copy.
    CheckingExisting,
    /// Requesting an upload session.
    Initializing,
    /// Sending parts.
    Uploading {
        uploaded: u64,
        total: u64,
        parts: u32,
        concurrency: usize,
    },
    /// Latest progress reported by the processing job.
    JobProgress {
        message: String,
        indicator: Option<JobIndicator>,
    },
    /// The job progress stream dropped and is being reopened.
    JobReconnecting,
    /// Polling for the processed item.
    Processing { attempt: u32, max_attempts: u32 },
    /// The item is available on the server.
    Completed { uid: String, deduplicated: bool },
    Failed { error: String },
    Cancelled,
}

/// How long to wait for server-side processing.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait before each poll.
    pub interval: Duration,
    /// Wait after a 502 or 504 instead of `interval`.
    pub gateway_cooldown: Duration,
    /// Polls before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            gateway_cooldown: Duration::from_secs(5),
            max_attempts: 600,
        }
    }
}

/// Following the live progress of the server's processing job.
///
/// Connection failures less than `failure_reset` apart count as one run;
/// a run longer than `max_recent_failures`, or two failures closer than
/// `min_failure_gap`, gives up on the stream and falls back to polling.
#[derive(Debug, Clone)]
pub struct JobFollowConfig {
    /// Follow the job when the session names one.
    pub enabled: bool,
    pub max_recent_failures: u32,
    pub failure_reset: Duration,
    pub min_failure_gap: Duration,
    /// Polls allowed once the job reported success.
    pub settle_attempts: u32,
}

impl Default for JobFollowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_recent_failures: 5,
            failure_reset: Duration::from_secs(15),
            min_failure_gap: Duration::from_secs(1),
            settle_attempts: 30,
        }
    }
}

/// Retry of individual part uploads with exponential backoff.
///
/// Off by default: with `max_retries == 0` the first failure of any part
/// aborts the upload.
#[derive(Debug, Clone)]
pub struct PartRetryPolicy {
    /// Extra attempts per part after the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry.
    pub backoff_factor: f64,
}

impl Default for PartRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            backoff_factor: 2.0,
        }
    }
}

impl PartRetryPolicy {
    /// Delay before retry `attempt` (1-based), never shorter than `at_least`.
    pub fn delay_for_attempt(&self, attempt: u32, at_least: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()));
        match at_least {
            Some(min) => capped.max(min),
            None => capped,
        }
    }
}

/// Everything [`ContentUploader`](crate::ContentUploader) can be tuned with.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Maximum parts in flight.
    pub concurrency: usize,
    pub hash: HashConfig,
    pub poll: PollConfig,
    pub job: JobFollowConfig,
    pub retry: PartRetryPolicy,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            hash: HashConfig::default(),
            poll: PollConfig::default(),
            job: JobFollowConfig::default(),
            retry: PartRetryPolicy::default(),
        }
    }
}
