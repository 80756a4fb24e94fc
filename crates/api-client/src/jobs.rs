//! Live progress of server-side processing jobs over WebSocket.

use futures_util::{SinkExt, StreamExt};
use oseh_protocol::{
    JOBS_LIVE_PATH, JobClientPacket, JobEvent, JobRef, parse_auth_response, parse_event_batch,
};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;

use crate::{ApiClient, ApiError};

/// How a followed job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed { message: String },
}

impl ApiClient {
    /// WebSocket URL of the job progress stream on this client's origin.
    pub fn jobs_live_url(&self) -> Result<String, ApiError> {
        let mut url = reqwest::Url::parse(&self.url(JOBS_LIVE_PATH))
            .map_err(|e| ApiError::Url(e.to_string()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::Url(format!("cannot switch {url} to {scheme}")))?;
        Ok(url.into())
    }

    /// Follows `job` over a single connection until it reports a final
    /// event.
    ///
    /// `on_event` receives the latest event of every batch. Any error ends
    /// the connection; reconnecting is left to the caller.
    pub async fn follow_job(
        &self,
        job: &JobRef,
        on_event: &(dyn Fn(&JobEvent) + Send + Sync),
    ) -> Result<JobOutcome, ApiError> {
        let url = self.jobs_live_url()?;
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!(job = %job.uid, "job progress stream connected");

        let authorize = JobClientPacket::authorize(job).to_text()?;
        socket.send(Message::Text(authorize.into())).await?;
        let auth = next_text(&mut socket)
            .await?
            .ok_or_else(|| ApiError::JobStream("closed before auth response".into()))?;
        parse_auth_response(&auth)?;

        loop {
            let text = next_text(&mut socket)
                .await?
                .ok_or_else(|| ApiError::JobStream("connection closed".into()))?;
            let batch = parse_event_batch(&text)?;
            if let Some(event) = batch.latest() {
                on_event(event);
            }
            if let Some(last) = batch.final_event() {
                let outcome = if last.is_failure() {
                    JobOutcome::Failed {
                        message: last.message.clone(),
                    }
                } else {
                    JobOutcome::Succeeded
                };
                let _ = socket.close(None).await;
                debug!(job = %job.uid, ?outcome, "job finished");
                return Ok(outcome);
            }
        }
    }
}

/// Next text message, skipping control frames. `None` once the server
/// closes.
async fn next_text<S>(socket: &mut S) -> Result<Option<String>, ApiError>
where
    S: StreamExt<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
            Message::Binary(_) => {
                return Err(ApiError::JobStream("unexpected binary message".into()));
            }
            Message::Close(_) => return Ok(None),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    Ok(None)
}
