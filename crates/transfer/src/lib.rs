//! Local side of a content upload: reading the file, hashing it, and
//! turning a server part plan into byte ranges.

mod hasher;
mod plan;
mod progress;
mod source;

pub use hasher::{HashConfig, ProgressSink, compute_sha512};
pub use plan::{PartPlan, expand_part};
pub use progress::{SpeedCalculator, UploadProgress};
pub use source::{ContentSource, FileSource, MemorySource, SourceReader};

/// Default read size while hashing: 1 MiB.
pub const DEFAULT_READ_SIZE: usize = 1024 * 1024;

/// Default amount fed to the hash function between yield checks: 64 KiB.
pub const DEFAULT_HASH_STEP: usize = 64 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,

    #[error("part {0} is not covered by the upload plan")]
    PartNotFound(u32),

    #[error("upload plan covers {planned} bytes but the file has {actual}")]
    PlanMismatch { planned: u64, actual: u64 },

    #[error("invalid upload plan: {0}")]
    InvalidPlan(String),

    #[error("digest error: {0}")]
    Digest(#[from] oseh_protocol::ProtocolError),
}
