//! Live progress stream of a server-side processing job.
//!
//! After connecting to [`JOBS_LIVE_PATH`] the client sends one
//! `authorize` packet, expects an `auth_response`, then reads
//! `event_batch` packets until one of them carries a final event.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::session::JobRef;

/// WebSocket endpoint of the job progress stream.
pub const JOBS_LIVE_PATH: &str = "/api/2/jobs/live";

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobClientPacket {
    Authorize { job_uid: String, jwt: String },
}

impl JobClientPacket {
    pub fn authorize(job: &JobRef) -> Self {
        Self::Authorize {
            job_uid: job.uid.clone(),
            jwt: job.jwt.clone(),
        }
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Progress display hint attached to a job event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobIndicator {
    Spinner,
    Bar { at: f64, of: f64 },
    /// Marks the last event the job will send.
    Final,
}

/// One event reported by a processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// `progress`, `succeeded`, `failed`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub indicator: Option<JobIndicator>,
}

impl JobEvent {
    pub fn is_final(&self) -> bool {
        matches!(self.kind.as_str(), "succeeded" | "failed")
            || matches!(self.indicator, Some(JobIndicator::Final))
    }

    pub fn is_failure(&self) -> bool {
        self.kind == "failed"
    }

    /// The indicator worth displaying; the final marker is not one.
    pub fn display_indicator(&self) -> Option<&JobIndicator> {
        self.indicator
            .as_ref()
            .filter(|indicator| !matches!(indicator, JobIndicator::Final))
    }
}

/// Events delivered together in one `event_batch` packet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobEventBatch {
    pub events: Vec<JobEvent>,
}

impl JobEventBatch {
    /// The first final event, which decides how the job ended.
    pub fn final_event(&self) -> Option<&JobEvent> {
        self.events.iter().find(|event| event.is_final())
    }

    /// The event whose message describes the job's current state.
    pub fn latest(&self) -> Option<&JobEvent> {
        self.events.last()
    }
}

#[derive(Debug, Deserialize)]
struct RawJobPacket {
    #[serde(rename = "type")]
    kind: Option<String>,
    success: Option<bool>,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawEventBatchData {
    events: Option<Vec<JobEvent>>,
}

fn parse_packet(text: &str, expected: &'static str) -> Result<RawJobPacket, ProtocolError> {
    let packet: RawJobPacket = serde_json::from_str(text)?;
    match packet.kind.as_deref() {
        Some(kind) if kind == expected => {}
        Some(kind) => {
            return Err(ProtocolError::invalid(
                "type",
                format!("expected {expected}, got {kind}"),
            ));
        }
        None => return Err(ProtocolError::MissingField("type")),
    }
    if packet.success != Some(true) {
        return Err(ProtocolError::invalid("success", format!("{expected} not successful")));
    }
    Ok(packet)
}

/// Checks the server's answer to the `authorize` packet.
pub fn parse_auth_response(text: &str) -> Result<(), ProtocolError> {
    parse_packet(text, "auth_response").map(|_| ())
}

/// Parses one `event_batch` packet.
pub fn parse_event_batch(text: &str) -> Result<JobEventBatch, ProtocolError> {
    let data = parse_packet(text, "event_batch")?
        .data
        .ok_or(ProtocolError::MissingField("data"))?;
    let events = serde_json::from_value::<RawEventBatchData>(data)?
        .events
        .ok_or(ProtocolError::MissingField("data.events"))?;
    Ok(JobEventBatch { events })
}
