//! Upload error types.

use oseh_api::ApiError;
use oseh_transfer::TransferError;

/// Errors produced by the upload flow.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transfer error: {0}")]
    Transfer(TransferError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("part {number} rejected: {source}")]
    PartRejected {
        number: u32,
        #[source]
        source: ApiError,
    },

    #[error("timed out waiting for processing after {attempts} attempts")]
    ProcessingTimeout { attempts: u32 },

    #[error("upload completed but error waiting for processing: {0}")]
    Processing(#[source] ApiError),

    #[error("processing job failed: {message}")]
    JobFailed { message: String },

    #[error("cancelled")]
    Cancelled,
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Cancelled => UploadError::Cancelled,
            other => UploadError::Transfer(other),
        }
    }
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Short code shown next to the message, e.g. `ECONN`.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Transfer(_) => "ECLIENT",
            UploadError::Api(e) | UploadError::PartRejected { source: e, .. } => api_code(e),
            UploadError::Processing(e) => api_code(e),
            UploadError::ProcessingTimeout { .. } => "ERETRY",
            UploadError::JobFailed { .. } => "EFAIL",
            UploadError::Cancelled => "ECANCEL",
        }
    }

    /// Text suitable for showing to the person who started the upload.
    pub fn user_message(&self) -> String {
        let code = self.code();
        match self {
            UploadError::Transfer(TransferError::Io(_)) => format!(
                "{code}: Could not read the selected file. Check that it still exists and try again."
            ),
            UploadError::Transfer(_) => format!(
                "{code}: The server's upload plan did not match the file. Try again, or contact support."
            ),
            UploadError::Api(e) | UploadError::PartRejected { source: e, .. } => {
                format!("{code}: {}", api_message(e))
            }
            UploadError::ProcessingTimeout { .. } => format!(
                "{code}: Timed out waiting for processing to complete. Contact support."
            ),
            UploadError::Processing(e) => format!(
                "{code}: Upload completed but error waiting for processing: {}",
                api_message(e)
            ),
            UploadError::JobFailed { message } if message.is_empty() => {
                format!("{code}: Processing failed. Contact support.")
            }
            UploadError::JobFailed { message } => {
                format!("{code}: Processing failed: {message}")
            }
            UploadError::Cancelled => format!("{code}: Operation canceled"),
        }
    }
}

fn api_code(e: &ApiError) -> &'static str {
    match e {
        ApiError::Transport(_) | ApiError::Socket(_) | ApiError::JobStream(_) => "ECONN",
        ApiError::Status { status, .. } => match status {
            401 | 403 => "EREF",
            429 => "ERATE",
            502..=504 => "ERETRY",
            _ => "EFAIL",
        },
        ApiError::Parse(_) | ApiError::InvalidToken | ApiError::Url(_) => "ECLIENT",
    }
}

fn api_message(e: &ApiError) -> &'static str {
    match e {
        ApiError::Transport(_) | ApiError::Socket(_) | ApiError::JobStream(_) => {
            "Could not connect to the server. Check your internet connection."
        }
        ApiError::Status { status, .. } => match status {
            401 | 403 => "Session expired. Log in again.",
            429 => "Too many requests recently. Contact support.",
            502..=504 => "Request failed too many times. Contact support.",
            _ => "Request failed. Contact support.",
        },
        ApiError::Parse(_) => "Could not understand the server's response. Contact support.",
        ApiError::InvalidToken => "The login token is not valid. Log in again.",
        ApiError::Url(_) => "The server address is not valid.",
    }
}
