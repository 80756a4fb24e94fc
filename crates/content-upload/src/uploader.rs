//! Sliding-window part uploader.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use oseh_api::PartOutcome;
use oseh_protocol::{UploadPart, UploadSession};
use oseh_transfer::{ContentSource, PartPlan, TransferError, UploadProgress};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::ContentBackend;
use crate::error::UploadError;
use crate::types::PartRetryPolicy;

/// Uploads every part of `plan`, at most `concurrency` at a time.
///
/// Parts are started in increasing number order; a new one starts as soon
/// as any in-flight part finishes. The first failed part aborts the upload:
/// no more parts start, `progress` is closed, and requests already in
/// flight are allowed to finish with their results ignored. On
/// cancellation in-flight requests are dropped instead.
#[allow(clippy::too_many_arguments)]
pub async fn upload_parts(
    backend: &dyn ContentBackend,
    session: &UploadSession,
    plan: &PartPlan,
    source: &dyn ContentSource,
    progress: &UploadProgress,
    concurrency: usize,
    retry: &PartRetryPolicy,
    cancel: &CancellationToken,
) -> Result<(), UploadError> {
    if plan.total_bytes() != source.size() {
        progress.close();
        return Err(TransferError::PlanMismatch {
            planned: plan.total_bytes(),
            actual: source.size(),
        }
        .into());
    }

    let uploader = PartUploader {
        backend,
        session,
        source,
        retry,
        cancel,
    };
    let result = uploader.run(plan, progress, concurrency).await;
    progress.close();
    result
}

struct PartUploader<'a> {
    backend: &'a dyn ContentBackend,
    session: &'a UploadSession,
    source: &'a dyn ContentSource,
    retry: &'a PartRetryPolicy,
    cancel: &'a CancellationToken,
}

impl PartUploader<'_> {
    async fn run(
        &self,
        plan: &PartPlan,
        progress: &UploadProgress,
        concurrency: usize,
    ) -> Result<(), UploadError> {
        let total = plan.total_parts();
        let limit = concurrency.clamp(1, total.max(1) as usize);
        let mut next: u32 = 1;
        let mut in_flight = FuturesUnordered::new();

        debug!(
            uid = %self.session.uid,
            parts = total,
            concurrency = limit,
            "uploading parts"
        );

        loop {
            while in_flight.len() < limit && next <= total {
                in_flight.push(self.upload_one(plan.part(next)?));
                next += 1;
            }

            let finished = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    progress.close();
                    return Err(UploadError::Cancelled);
                }
                finished = in_flight.next() => finished,
            };

            let Some(result) = finished else {
                break;
            };

            match result {
                Ok(part) => {
                    progress.add(part.len());
                }
                Err(e) => {
                    progress.close();
                    let settle = async { while in_flight.next().await.is_some() {} };
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {}
                        _ = settle => {}
                    }
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    async fn upload_one(&self, part: UploadPart) -> Result<UploadPart, UploadError> {
        let mut data = self.source.read_range(part.start_byte, part.end_byte).await?;
        let mut attempt = 0;

        loop {
            let body = if attempt < self.retry.max_retries {
                data.clone()
            } else {
                std::mem::take(&mut data)
            };

            match self.backend.upload_part(self.session, part.number, body).await {
                Ok(PartOutcome::Uploaded) => {
                    debug!(part = part.number, bytes = part.len(), "part uploaded");
                    return Ok(part);
                }
                Ok(PartOutcome::AlreadyUploaded) => {
                    debug!(part = part.number, "part was already on the server");
                    return Ok(part);
                }
                Err(e) if attempt < self.retry.max_retries && e.is_retryable() => {
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt, e.retry_after());
                    warn!(
                        part = part.number,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying part"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    return Err(UploadError::PartRejected {
                        number: part.number,
                        source: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, PartReply, session};
    use oseh_transfer::MemorySource;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    struct Fixture {
        session: UploadSession,
        backend: MockBackend,
        plan: PartPlan,
        source: MemorySource,
        progress: UploadProgress,
        cancel: CancellationToken,
    }

    fn fixture(parts: u32, part_size: u64) -> Fixture {
        let session = session(parts, part_size);
        let size = u64::from(parts) * part_size;
        let plan = PartPlan::new(&session.parts, size).unwrap();
        Fixture {
            backend: MockBackend::new(session.clone()),
            session,
            plan,
            source: MemorySource::new(data(size as usize)),
            progress: UploadProgress::new(),
            cancel: CancellationToken::new(),
        }
    }

    async fn run(f: &Fixture, concurrency: usize, retry: &PartRetryPolicy) -> Result<(), UploadError> {
        upload_parts(
            &f.backend,
            &f.session,
            &f.plan,
            &f.source,
            &f.progress,
            concurrency,
            retry,
            &f.cancel,
        )
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn uploads_every_part_with_bounded_concurrency() {
        let f = fixture(10, 100);
        let mut rx = f.progress.subscribe();
        let observed = tokio::spawn(async move {
            let mut seen = vec![*rx.borrow()];
            while rx.changed().await.is_ok() {
                seen.push(*rx.borrow_and_update());
            }
            seen
        });

        run(&f, 3, &PartRetryPolicy::default()).await.unwrap();

        assert_eq!(f.backend.received_numbers(), (1..=10).collect::<Vec<_>>());
        assert_eq!(f.backend.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(*f.backend.started.lock().unwrap(), (1..=10).collect::<Vec<_>>());
        assert_eq!(f.progress.uploaded(), 1000);
        assert!(f.progress.is_closed());

        let received = f.backend.received.lock().unwrap();
        for (number, bytes) in received.iter() {
            let start = (*number as usize - 1) * 100;
            assert_eq!(bytes, &data(1000)[start..start + 100]);
        }
        drop(received);

        drop(f);
        let seen = observed.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_part_does_not_block_window() {
        let f = fixture(6, 10);
        f.backend.delay_part(1, Duration::from_secs(5));

        run(&f, 2, &PartRetryPolicy::default()).await.unwrap();

        // Part 1 holds one slot while 2..=6 go through the other.
        assert_eq!(*f.backend.started.lock().unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(f.backend.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(f.progress.uploaded(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_limited_by_part_count() {
        let f = fixture(2, 10);
        run(&f, 5, &PartRetryPolicy::default()).await.unwrap();
        assert_eq!(f.backend.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn already_uploaded_counts_as_success() {
        let f = fixture(3, 10);
        f.backend.push_part(2, PartReply::AlreadyUploaded);

        run(&f, 2, &PartRetryPolicy::default()).await.unwrap();
        assert_eq!(f.progress.uploaded(), 30);
        assert_eq!(f.backend.received_numbers(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_part_aborts_upload() {
        let f = fixture(10, 10);
        f.backend.push_part(2, PartReply::Status(409));

        let err = run(&f, 3, &PartRetryPolicy::default()).await.unwrap_err();
        match err {
            UploadError::PartRejected { number, source } => {
                assert_eq!(number, 2);
                assert_eq!(source.status(), Some(409));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing past the window at the time of failure was started.
        let started = f.backend.started.lock().unwrap().clone();
        assert!(started.len() < 10, "started {started:?}");
        assert!(f.progress.is_closed());
        assert!(f.progress.uploaded() < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_results_after_failure_are_discarded() {
        let f = fixture(3, 10);
        f.backend.push_part(1, PartReply::Status(500));
        f.backend.delay_part(2, Duration::from_secs(2));
        f.backend.delay_part(3, Duration::from_secs(2));

        assert!(run(&f, 3, &PartRetryPolicy::default()).await.is_err());
        // Parts 2 and 3 settled on the server but never moved progress.
        assert_eq!(f.backend.received_numbers(), vec![2, 3]);
        assert_eq!(f.progress.uploaded(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_new_parts_and_progress() {
        let f = fixture(10, 10);
        f.backend.cancel_after_parts(2, f.cancel.clone());

        let err = run(&f, 2, &PartRetryPolicy::default()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(f.progress.is_closed());
        assert_eq!(f.progress.uploaded(), 0);
        assert_eq!(f.backend.started.lock().unwrap().len(), 2);
        assert!(!f.progress.add(10));
    }

    #[tokio::test(start_paused = true)]
    async fn size_mismatch_fails_before_any_request() {
        let f = fixture(2, 10);
        let short = MemorySource::new(data(15));
        let err = upload_parts(
            &f.backend,
            &f.session,
            &f.plan,
            &short,
            &f.progress,
            2,
            &PartRetryPolicy::default(),
            &f.cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            UploadError::Transfer(TransferError::PlanMismatch { .. })
        ));
        assert!(f.backend.started.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_retries_gateway_errors() {
        let f = fixture(2, 10);
        f.backend.push_part(1, PartReply::Status(503));
        f.backend.push_part(1, PartReply::Status(502));
        let retry = PartRetryPolicy {
            max_retries: 2,
            ..PartRetryPolicy::default()
        };

        run(&f, 2, &retry).await.unwrap();
        assert_eq!(f.progress.uploaded(), 20);
        let attempts_on_1 = f.backend.started.lock().unwrap().iter().filter(|&&n| n == 1).count();
        assert_eq!(attempts_on_1, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_gives_up_after_budget() {
        let f = fixture(1, 10);
        for _ in 0..3 {
            f.backend.push_part(1, PartReply::Status(503));
        }
        let retry = PartRetryPolicy {
            max_retries: 2,
            ..PartRetryPolicy::default()
        };

        let err = run(&f, 1, &retry).await.unwrap_err();
        assert!(matches!(err, UploadError::PartRejected { number: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_does_not_retry_client_errors() {
        let f = fixture(1, 10);
        f.backend.push_part(1, PartReply::Status(400));
        let retry = PartRetryPolicy {
            max_retries: 5,
            ..PartRetryPolicy::default()
        };

        assert!(run(&f, 1, &retry).await.is_err());
        assert_eq!(f.backend.started.lock().unwrap().len(), 1);
    }
}
