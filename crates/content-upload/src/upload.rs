//! Upload orchestrator.
//!
//! Runs the whole pipeline for one file as a single awaitable call,
//! reports progress events, and supports cancellation.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use oseh_api::ApiError;
use oseh_protocol::ContentReference;
use oseh_transfer::{ContentSource, PartPlan, UploadProgress, compute_sha512};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backend::{ContentBackend, find_accepted};
use crate::error::UploadError;
use crate::job::{JobFollowEnd, follow_processing_job};
use crate::poller::wait_for_processing;
use crate::scope::EntityScope;
use crate::types::{PollConfig, UploadEvent, UploaderConfig};
use crate::uploader::upload_parts;

/// Hashing events are sent at most this many times per file.
const HASH_EVENT_STEPS: u64 = 100;

/// Orchestrates content uploads against one backend.
pub struct ContentUploader {
    backend: Arc<dyn ContentBackend>,
    config: UploaderConfig,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl ContentUploader {
    pub fn new(backend: Arc<dyn ContentBackend>, config: UploaderConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            backend,
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than queued once the receiver falls 256
    /// events behind; the result of [`start_upload`](Self::start_upload)
    /// is authoritative.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token shared by every upload on this
    /// uploader.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads `source` into `scope`, returning the processed item.
    ///
    /// If the server already has an item with the same digest it is
    /// returned without uploading anything.
    pub async fn start_upload(
        &self,
        source: &dyn ContentSource,
        scope: &EntityScope,
    ) -> Result<ContentReference, UploadError> {
        match self.run(source, scope).await {
            Ok((item, deduplicated)) => {
                info!(
                    uid = %item.uid,
                    deduplicated,
                    collection = %scope.collection_path,
                    "upload completed"
                );
                self.emit(UploadEvent::Completed {
                    uid: item.uid.clone(),
                    deduplicated,
                });
                Ok(item)
            }
            Err(e) if e.is_cancelled() => {
                info!(collection = %scope.collection_path, "upload cancelled");
                self.emit(UploadEvent::Cancelled);
                Err(e)
            }
            Err(e) => {
                error!(collection = %scope.collection_path, error = %e, "upload failed");
                self.emit(UploadEvent::Failed {
                    error: e.user_message(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        source: &dyn ContentSource,
        scope: &EntityScope,
    ) -> Result<(ContentReference, bool), UploadError> {
        let total = source.size();

        // 1. Hash
        self.check_cancelled()?;
        self.emit(UploadEvent::Hashing { hashed: 0, total });
        let step = (total / HASH_EVENT_STEPS).max(1);
        let last_reported = AtomicU64::new(0);
        let on_hashed = |hashed: u64| {
            let last = last_reported.load(Ordering::Relaxed);
            if hashed - last >= step || hashed == total {
                last_reported.store(hashed, Ordering::Relaxed);
                self.emit(UploadEvent::Hashing { hashed, total });
            }
        };
        let digest = compute_sha512(source, &self.config.hash, &self.cancel, Some(&on_hashed)).await?;
        debug!(sha512 = %digest, bytes = total, "content hashed");

        // 2. Dedupe
        self.emit(UploadEvent::CheckingExisting);
        if let Some(existing) = self
            .cancellable(find_accepted(self.backend.as_ref(), scope, &digest))
            .await?
        {
            info!(uid = %existing.uid, "content already on server");
            return Ok((existing, true));
        }

        // 3. Negotiate
        self.emit(UploadEvent::Initializing);
        let session = self
            .cancellable(self.backend.create_upload_session(scope, total))
            .await?;
        let plan = PartPlan::new(&session.parts, total)?;

        // 4. Upload
        let parts = plan.total_parts();
        let concurrency = self.config.concurrency.clamp(1, parts.max(1) as usize);
        info!(
            uid = %session.uid,
            bytes = total,
            parts,
            concurrency,
            "uploading"
        );
        let progress = UploadProgress::new();
        self.emit(UploadEvent::Uploading {
            uploaded: 0,
            total,
            parts,
            concurrency,
        });

        let forward = async {
            let mut rx = progress.subscribe();
            while rx.changed().await.is_ok() {
                let uploaded = *rx.borrow_and_update();
                self.emit(UploadEvent::Uploading {
                    uploaded,
                    total,
                    parts,
                    concurrency,
                });
            }
            std::future::pending::<Infallible>().await
        };
        tokio::select! {
            result = upload_parts(
                self.backend.as_ref(),
                &session,
                &plan,
                source,
                &progress,
                concurrency,
                &self.config.retry,
                &self.cancel,
            ) => result?,
            never = forward => match never {},
        }
        self.emit(UploadEvent::Uploading {
            uploaded: progress.uploaded(),
            total,
            parts,
            concurrency,
        });

        // 5. Process
        info!(uid = %session.uid, "upload sent, waiting for processing");
        let poll = match &session.progress {
            Some(job) if self.config.job.enabled => {
                let end = follow_processing_job(
                    self.backend.as_ref(),
                    job,
                    &self.config.job,
                    &self.cancel,
                    Some(&self.events_tx),
                )
                .await?;
                match end {
                    JobFollowEnd::Finished => PollConfig {
                        max_attempts: self.config.job.settle_attempts,
                        ..self.config.poll.clone()
                    },
                    JobFollowEnd::Unavailable => self.config.poll.clone(),
                }
            }
            _ => self.config.poll.clone(),
        };
        let item = wait_for_processing(
            self.backend.as_ref(),
            scope,
            &digest,
            &poll,
            &self.cancel,
            Some(&self.events_tx),
        )
        .await?;

        Ok((item, false))
    }

    async fn cancellable<T>(
        &self,
        request: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            result = request => Ok(result?),
        }
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: UploadEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!(error = %e, "upload event dropped");
        }
    }
}
