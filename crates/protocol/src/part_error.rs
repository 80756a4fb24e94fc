use serde::{Deserialize, Serialize};

/// `type` of the 409 body returned when a part was already accepted.
pub const PART_ALREADY_UPLOADED: &str = "part_already_uploaded";

/// Error body returned by the part upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Returns `true` if `body` is a conflict body saying the part is already
/// on the server. Unparsable bodies return `false`.
pub fn is_part_already_uploaded(body: &[u8]) -> bool {
    serde_json::from_slice::<PartErrorBody>(body)
        .is_ok_and(|parsed| parsed.error_type == PART_ALREADY_UPLOADED)
}
