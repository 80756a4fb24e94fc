//! Waits for the server to finish processing an upload.

use oseh_protocol::{ContentDigest, ContentReference};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{ContentBackend, find_accepted};
use crate::error::UploadError;
use crate::scope::EntityScope;
use crate::types::{PollConfig, UploadEvent};

/// Polls the scope's search endpoint until an item with `digest` appears
/// that the scope accepts.
///
/// Each attempt waits first, `interval` normally or `gateway_cooldown`
/// after a 502/504, then searches once. Gateway errors still use up an
/// attempt, so the loop ends after `max_attempts` searches at most.
pub async fn wait_for_processing(
    backend: &dyn ContentBackend,
    scope: &EntityScope,
    digest: &ContentDigest,
    config: &PollConfig,
    cancel: &CancellationToken,
    events_tx: Option<&mpsc::Sender<UploadEvent>>,
) -> Result<ContentReference, UploadError> {
    let mut wait = config.interval;

    for attempt in 1..=config.max_attempts {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }

        if let Some(tx) = events_tx {
            let _ = tx.try_send(UploadEvent::Processing {
                attempt,
                max_attempts: config.max_attempts,
            });
        }

        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            found = find_accepted(backend, scope, digest) => found,
        };

        match found {
            Ok(Some(item)) => {
                debug!(uid = %item.uid, attempt, "processing finished");
                return Ok(item);
            }
            Ok(None) => {
                wait = config.interval;
            }
            Err(e) if e.is_gateway() => {
                warn!(attempt, error = %e, "gateway error while waiting for processing");
                wait = config.gateway_cooldown;
            }
            Err(e) => return Err(UploadError::Processing(e)),
        }
    }

    Err(UploadError::ProcessingTimeout {
        attempts: config.max_attempts,
    })
}
