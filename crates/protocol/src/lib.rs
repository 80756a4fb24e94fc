//! Wire types for the Oseh content upload endpoints.
//!
//! Every response shape consumed by the upload pipeline has an explicit
//! parse function here that validates the payload at the boundary and
//! returns a [`ProtocolError`] instead of letting a half-populated value
//! travel further.

pub mod digest;
pub mod error;
pub mod jobs;
pub mod part_error;
pub mod search;
pub mod session;

// Re-export primary types for convenience.
pub use digest::{ContentDigest, SHA512_HEX_LEN};
pub use error::ProtocolError;
pub use jobs::{
    JOBS_LIVE_PATH, JobClientPacket, JobEvent, JobEventBatch, JobIndicator, parse_auth_response,
    parse_event_batch,
};
pub use part_error::{PART_ALREADY_UPLOADED, PartErrorBody, is_part_already_uploaded};
pub use search::{
    ContentReference, DEFAULT_SHA512_KEY, FilterOperator, SearchFilter, SearchRequest,
    SearchResponse, parse_search_response,
};
pub use session::{
    CreateUploadSessionRequest, JobRef, PartSpec, UploadPart, UploadPartRange, UploadSession,
    parse_upload_session,
};
