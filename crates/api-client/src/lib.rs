//! Oseh API client for the content upload endpoints.
//!
//! Async HTTP client using `reqwest`. Every request is authorized by an
//! explicit [`LoginContext`]; part uploads use the upload session's own
//! token instead. Processing job progress is read over WebSocket with
//! `tokio-tungstenite`.

mod client;
mod error;
mod jobs;
mod login;

pub use client::{ApiClient, PartOutcome};
pub use error::{ApiError, MAX_RETRY_AFTER};
pub use jobs::JobOutcome;
pub use login::{LoginContext, validate_base_url};
