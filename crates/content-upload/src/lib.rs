//! Content-addressed upload flow for Oseh media.
//!
//! This crate implements the **business logic** of getting a local file
//! into an Oseh collection. It has no UI; callers supply a
//! [`ContentBackend`] (normally [`oseh_api::ApiClient`]) and a
//! [`ContentSource`](oseh_transfer::ContentSource).
//!
//! # Pipeline
//!
//! 1. **Hash** - SHA-512 of the file, cooperatively yielding
//! 2. **Dedupe** - search the collection for that digest; a hit ends here
//! 3. **Negotiate** - ask the server for an upload session and part plan
//! 4. **Upload** - send parts through a sliding window of requests
//! 5. **Process** - follow the processing job's live progress when the
//!    session names one, then poll the collection until the processed
//!    item appears

pub mod backend;
pub mod error;
pub mod job;
pub mod poller;
pub mod scope;
#[cfg(test)]
mod testing;
pub mod types;
pub mod upload;
pub mod uploader;

pub use backend::ContentBackend;
pub use error::UploadError;
pub use job::{JobFollowEnd, follow_processing_job};
pub use poller::wait_for_processing;
pub use scope::{DigestFilter, EntityScope, ItemPredicate};
pub use types::{JobFollowConfig, PartRetryPolicy, PollConfig, UploadEvent, UploaderConfig};
pub use upload::ContentUploader;
pub use uploader::upload_parts;
