//! In-memory [`ContentBackend`] for tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use oseh_api::{ApiError, JobOutcome, PartOutcome};
use oseh_protocol::{
    ContentDigest, ContentReference, JobEvent, JobIndicator, JobRef, PartSpec, UploadPartRange,
    UploadSession,
};
use tokio_util::sync::CancellationToken;

use crate::backend::ContentBackend;
use crate::scope::EntityScope;

#[derive(Debug, Clone)]
pub enum FindReply {
    Found(&'static str),
    Missing,
    Status(u16),
}

#[derive(Debug, Clone)]
pub enum PartReply {
    Ok,
    AlreadyUploaded,
    Status(u16),
}

#[derive(Debug, Clone)]
pub enum JobReply {
    /// Reports each event in turn, then ends with the outcome.
    Events(Vec<JobEvent>, JobOutcome),
    /// The connection fails after this long.
    Drop(Duration),
}

pub fn job_event(kind: &str, message: &str, indicator: Option<JobIndicator>) -> JobEvent {
    JobEvent {
        kind: kind.into(),
        message: message.into(),
        indicator,
    }
}

fn status(code: u16) -> ApiError {
    ApiError::Status {
        status: code,
        body: String::new(),
        retry_after: None,
    }
}

/// Builds a session of `parts` equal parts of `part_size` bytes.
pub fn session(parts: u32, part_size: u64) -> UploadSession {
    UploadSession {
        uid: "oseh_fu_test".into(),
        jwt: "session-jwt".into(),
        parts: vec![PartSpec::Range(UploadPartRange {
            start_number: 1,
            start_byte: 0,
            number_of_parts: parts,
            part_size,
        })],
        progress: None,
    }
}

/// Like [`session`], naming a processing job to follow.
pub fn session_with_job(parts: u32, part_size: u64) -> UploadSession {
    UploadSession {
        progress: Some(JobRef {
            uid: "oseh_job_test".into(),
            jwt: "job-jwt".into(),
        }),
        ..session(parts, part_size)
    }
}

/// The session an empty file gets.
pub fn empty_session() -> UploadSession {
    UploadSession {
        parts: Vec::new(),
        ..session(1, 1)
    }
}

pub struct MockBackend {
    find_replies: Mutex<VecDeque<FindReply>>,
    pub find_calls: AtomicU32,
    session: UploadSession,
    pub session_calls: AtomicU32,
    part_replies: Mutex<HashMap<u32, VecDeque<PartReply>>>,
    part_delays: Mutex<HashMap<u32, Duration>>,
    pub started: Mutex<Vec<u32>>,
    pub received: Mutex<Vec<(u32, Vec<u8>)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    job_replies: Mutex<VecDeque<JobReply>>,
    pub job_calls: AtomicU32,
}

impl MockBackend {
    pub fn new(session: UploadSession) -> Self {
        Self {
            find_replies: Mutex::new(VecDeque::new()),
            find_calls: AtomicU32::new(0),
            session,
            session_calls: AtomicU32::new(0),
            part_replies: Mutex::new(HashMap::new()),
            part_delays: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            cancel_after: Mutex::new(None),
            job_replies: Mutex::new(VecDeque::new()),
            job_calls: AtomicU32::new(0),
        }
    }

    /// Queues replies for successive searches; `Missing` once exhausted.
    pub fn push_find(&self, reply: FindReply) {
        self.find_replies.lock().unwrap().push_back(reply);
    }

    /// Queues replies for successive attempts at part `number`; `Ok` once
    /// exhausted.
    pub fn push_part(&self, number: u32, reply: PartReply) {
        self.part_replies
            .lock()
            .unwrap()
            .entry(number)
            .or_default()
            .push_back(reply);
    }

    pub fn delay_part(&self, number: u32, delay: Duration) {
        self.part_delays.lock().unwrap().insert(number, delay);
    }

    /// Cancels `token` when the `n`th part upload starts.
    pub fn cancel_after_parts(&self, n: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((n, token));
    }

    /// Queues replies for successive job connections; a dropped
    /// connection once exhausted.
    pub fn push_job(&self, reply: JobReply) {
        self.job_replies.lock().unwrap().push_back(reply);
    }

    pub fn received_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.received.lock().unwrap().iter().map(|(n, _)| *n).collect();
        numbers.sort_unstable();
        numbers
    }
}

impl ContentBackend for MockBackend {
    fn find_by_sha512(
        &self,
        _scope: &EntityScope,
        _digest: &ContentDigest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ContentReference>, ApiError>> + Send + '_>> {
        Box::pin(async move {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .find_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(FindReply::Missing);
            match reply {
                FindReply::Found(uid) => Ok(Some(ContentReference {
                    uid: uid.to_string(),
                    item: serde_json::json!({ "uid": uid }),
                })),
                FindReply::Missing => Ok(None),
                FindReply::Status(code) => Err(status(code)),
            }
        })
    }

    fn create_upload_session(
        &self,
        _scope: &EntityScope,
        _file_size: u64,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, ApiError>> + Send + '_>> {
        Box::pin(async move {
            self.session_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.session.clone())
        })
    }

    fn upload_part(
        &self,
        _session: &UploadSession,
        number: u32,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PartOutcome, ApiError>> + Send + '_>> {
        Box::pin(async move {
            let started = {
                let mut started = self.started.lock().unwrap();
                started.push(number);
                started.len()
            };
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some((n, token)) = self.cancel_after.lock().unwrap().as_ref()
                && started >= *n
            {
                token.cancel();
            }

            let delay = self
                .part_delays
                .lock()
                .unwrap()
                .get(&number)
                .copied()
                .unwrap_or(Duration::from_millis(10));
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let reply = self
                .part_replies
                .lock()
                .unwrap()
                .get_mut(&number)
                .and_then(VecDeque::pop_front)
                .unwrap_or(PartReply::Ok);
            match reply {
                PartReply::Ok => {
                    self.received.lock().unwrap().push((number, data));
                    Ok(PartOutcome::Uploaded)
                }
                PartReply::AlreadyUploaded => Ok(PartOutcome::AlreadyUploaded),
                PartReply::Status(code) => Err(status(code)),
            }
        })
    }

    fn follow_job<'a>(
        &'a self,
        _job: &'a JobRef,
        on_event: &'a (dyn Fn(&JobEvent) + Send + Sync),
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            self.job_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .job_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(JobReply::Drop(Duration::ZERO));
            match reply {
                JobReply::Events(events, outcome) => {
                    for event in &events {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        on_event(event);
                    }
                    Ok(outcome)
                }
                JobReply::Drop(after) => {
                    tokio::time::sleep(after).await;
                    Err(ApiError::JobStream("connection closed".into()))
                }
            }
        })
    }
}
