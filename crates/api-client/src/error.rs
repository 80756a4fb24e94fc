use std::time::Duration;

/// Longest `Retry-After` still honored as a retry hint.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(180);

/// Errors from the API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("unexpected response: {0}")]
    Parse(#[from] oseh_protocol::ProtocolError),

    #[error("invalid login token")]
    InvalidToken,

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("WebSocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The job progress stream ended or sent something unusable.
    #[error("job progress stream: {0}")]
    JobStream(String),
}

impl ApiError {
    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 502 or 504: the gateway gave up while the backend may still be fine.
    pub fn is_gateway(&self) -> bool {
        matches!(self.status(), Some(502 | 504))
    }

    /// Whether sending the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status {
                status,
                retry_after,
                ..
            } => {
                matches!(status, 429 | 502 | 503 | 504)
                    || retry_after.is_some_and(|d| !d.is_zero() && d <= MAX_RETRY_AFTER)
            }
            _ => false,
        }
    }

    /// Server-requested wait, when it is within [`MAX_RETRY_AFTER`].
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Status {
                retry_after: Some(d),
                ..
            } if !d.is_zero() && *d <= MAX_RETRY_AFTER => Some(*d),
            _ => None,
        }
    }
}

/// Parses a `Retry-After` header given in whole seconds.
pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}
