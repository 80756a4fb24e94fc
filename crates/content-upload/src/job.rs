//! Follows the server's processing job before polling for its result.

use oseh_api::JobOutcome;
use oseh_protocol::{JobEvent, JobRef};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::ContentBackend;
use crate::error::UploadError;
use crate::types::{JobFollowConfig, UploadEvent};

/// How following a job ended, when the job itself did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFollowEnd {
    /// The job reported success; the item should appear shortly.
    Finished,
    /// The progress stream kept failing; poll for the item instead.
    Unavailable,
}

/// Streams the job's progress as [`UploadEvent::JobProgress`] until it
/// ends, reconnecting after connection failures.
pub async fn follow_processing_job(
    backend: &dyn ContentBackend,
    job: &JobRef,
    config: &JobFollowConfig,
    cancel: &CancellationToken,
    events_tx: Option<&mpsc::Sender<UploadEvent>>,
) -> Result<JobFollowEnd, UploadError> {
    let emit = |event: UploadEvent| {
        if let Some(tx) = events_tx {
            let _ = tx.try_send(event);
        }
    };
    let on_event = |event: &JobEvent| {
        debug!(job = %job.uid, kind = %event.kind, message = %event.message, "job progress");
        emit(UploadEvent::JobProgress {
            message: event.message.clone(),
            indicator: event.display_indicator().cloned(),
        });
    };

    let mut last_failed_at: Option<Instant> = None;
    let mut recent_failures: u32 = 0;

    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = backend.follow_job(job, &on_event) => result,
        };

        let error = match attempt {
            Ok(JobOutcome::Succeeded) => {
                info!(job = %job.uid, "processing job succeeded");
                return Ok(JobFollowEnd::Finished);
            }
            Ok(JobOutcome::Failed { message }) => {
                return Err(UploadError::JobFailed { message });
            }
            Err(e) => e,
        };

        let now = Instant::now();
        let since_last = last_failed_at.map(|at| now.duration_since(at));
        last_failed_at = Some(now);
        match since_last {
            Some(gap) if gap > config.failure_reset => recent_failures = 0,
            _ => recent_failures += 1,
        }
        warn!(job = %job.uid, error = %error, recent_failures, "job progress stream failed");

        if recent_failures > config.max_recent_failures
            || since_last.is_some_and(|gap| gap < config.min_failure_gap)
        {
            info!(job = %job.uid, "job progress unavailable, polling instead");
            return Ok(JobFollowEnd::Unavailable);
        }
        emit(UploadEvent::JobReconnecting);
    }
}
