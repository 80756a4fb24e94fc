use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of `POST <collection>/`, which allocates a new upload session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateUploadSessionRequest {
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    pub file_size: u64,
}

impl CreateUploadSessionRequest {
    /// Builds the request body. A `file_size` key in `extra` is dropped so
    /// the real size is always the one sent.
    pub fn new(file_size: u64, extra: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut extra = extra.clone();
        extra.remove("file_size");
        Self { extra, file_size }
    }
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// A single part covering `[start_byte, end_byte)` of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPart {
    /// 1-based part number.
    pub number: u32,
    pub start_byte: u64,
    /// Exclusive.
    pub end_byte: u64,
}

impl UploadPart {
    pub fn len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.end_byte == self.start_byte
    }
}

/// Run-length encoding of `number_of_parts` consecutive equal-sized parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPartRange {
    pub start_number: u32,
    pub start_byte: u64,
    pub number_of_parts: u32,
    pub part_size: u64,
}

impl UploadPartRange {
    /// Total bytes covered by the range, or `None` on overflow.
    pub fn total_bytes(&self) -> Option<u64> {
        self.part_size.checked_mul(u64::from(self.number_of_parts))
    }

    /// One past the last byte in the range, or `None` on overflow.
    pub fn end_byte(&self) -> Option<u64> {
        self.total_bytes().and_then(|len| self.start_byte.checked_add(len))
    }

    /// Byte range of part `number` if the range contains it.
    pub fn part(&self, number: u32) -> Option<UploadPart> {
        let offset = number.checked_sub(self.start_number)?;
        if offset >= self.number_of_parts {
            return None;
        }
        let start_byte = self
            .part_size
            .checked_mul(u64::from(offset))
            .and_then(|skip| self.start_byte.checked_add(skip))?;
        let end_byte = start_byte.checked_add(self.part_size)?;
        Some(UploadPart {
            number,
            start_byte,
            end_byte,
        })
    }
}

impl From<UploadPart> for UploadPartRange {
    fn from(part: UploadPart) -> Self {
        Self {
            start_number: part.number,
            start_byte: part.start_byte,
            number_of_parts: 1,
            part_size: part.len(),
        }
    }
}

/// One entry of a session's compact part list.
///
/// On the wire the two variants are told apart only by which keys are
/// present; [`parse_upload_session`] resolves that once so the rest of the
/// pipeline can match on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PartSpec {
    Single(UploadPart),
    Range(UploadPartRange),
}

impl PartSpec {
    /// Normalizes a single part into a range of one.
    pub fn as_range(&self) -> UploadPartRange {
        match *self {
            PartSpec::Single(part) => part.into(),
            PartSpec::Range(range) => range,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A server-allocated upload session.
///
/// `jwt` authorizes part uploads for this session only; it is not the
/// caller's login token. An empty file gets an empty part list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub uid: String,
    pub jwt: String,
    pub parts: Vec<PartSpec>,
    /// Processing job whose live progress can be followed once every part
    /// is uploaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobRef>,
}

/// Reference to a server-side processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRef {
    pub uid: String,
    /// Authorizes the job's progress stream only.
    pub jwt: String,
}

/// Loose wire shape, validated by [`UploadSession::try_from`].
#[derive(Debug, Deserialize)]
struct RawUploadSession {
    uid: Option<String>,
    jwt: Option<String>,
    parts: Option<Vec<RawPartSpec>>,
    #[serde(default)]
    progress: Option<RawJobRef>,
}

#[derive(Debug, Deserialize)]
struct RawJobRef {
    uid: Option<String>,
    jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPartSpec {
    number: Option<i64>,
    start_byte: Option<i64>,
    end_byte: Option<i64>,
    start_number: Option<i64>,
    number_of_parts: Option<i64>,
    part_size: Option<i64>,
}

/// Parses the body of a session-creation response.
pub fn parse_upload_session(body: &[u8]) -> Result<UploadSession, ProtocolError> {
    let raw: RawUploadSession = serde_json::from_slice(body)?;
    raw.try_into()
}

impl TryFrom<RawUploadSession> for UploadSession {
    type Error = ProtocolError;

    fn try_from(raw: RawUploadSession) -> Result<Self, Self::Error> {
        let uid = raw.uid.ok_or(ProtocolError::MissingField("uid"))?;
        if uid.is_empty() {
            return Err(ProtocolError::invalid("uid", "empty"));
        }
        let jwt = raw.jwt.ok_or(ProtocolError::MissingField("jwt"))?;
        if jwt.is_empty() {
            return Err(ProtocolError::invalid("jwt", "empty"));
        }
        let parts = raw
            .parts
            .ok_or(ProtocolError::MissingField("parts"))?
            .into_iter()
            .map(PartSpec::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let progress = raw.progress.map(JobRef::try_from).transpose()?;

        Ok(Self {
            uid,
            jwt,
            parts,
            progress,
        })
    }
}

impl TryFrom<RawJobRef> for JobRef {
    type Error = ProtocolError;

    fn try_from(raw: RawJobRef) -> Result<Self, Self::Error> {
        let uid = raw
            .uid
            .filter(|uid| !uid.is_empty())
            .ok_or(ProtocolError::MissingField("progress.uid"))?;
        let jwt = raw
            .jwt
            .filter(|jwt| !jwt.is_empty())
            .ok_or(ProtocolError::MissingField("progress.jwt"))?;
        Ok(Self { uid, jwt })
    }
}

impl TryFrom<RawPartSpec> for PartSpec {
    type Error = ProtocolError;

    fn try_from(raw: RawPartSpec) -> Result<Self, Self::Error> {
        let start_byte = non_negative("start_byte", raw.start_byte)?;

        match (raw.number, raw.start_number) {
            (Some(number), None) => {
                let end_byte = non_negative("end_byte", raw.end_byte)?;
                if end_byte <= start_byte {
                    return Err(ProtocolError::invalid(
                        "end_byte",
                        format!("{end_byte} is not after start_byte {start_byte}"),
                    ));
                }
                Ok(PartSpec::Single(UploadPart {
                    number: part_number("number", number)?,
                    start_byte,
                    end_byte,
                }))
            }
            (None, Some(start_number)) => {
                let number_of_parts = non_negative("number_of_parts", raw.number_of_parts)?;
                if number_of_parts == 0 {
                    return Err(ProtocolError::invalid("number_of_parts", "zero"));
                }
                let number_of_parts = u32::try_from(number_of_parts)
                    .map_err(|_| ProtocolError::invalid("number_of_parts", "too large"))?;
                let part_size = non_negative("part_size", raw.part_size)?;
                if part_size == 0 {
                    return Err(ProtocolError::invalid("part_size", "zero"));
                }
                Ok(PartSpec::Range(UploadPartRange {
                    start_number: part_number("start_number", start_number)?,
                    start_byte,
                    number_of_parts,
                    part_size,
                }))
            }
            (Some(_), Some(_)) => Err(ProtocolError::invalid(
                "parts",
                "entry has both number and start_number",
            )),
            (None, None) => Err(ProtocolError::MissingField("number")),
        }
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<u64, ProtocolError> {
    let value = value.ok_or(ProtocolError::MissingField(field))?;
    u64::try_from(value).map_err(|_| ProtocolError::invalid(field, format!("{value} is negative")))
}

fn part_number(field: &'static str, value: i64) -> Result<u32, ProtocolError> {
    if value < 1 {
        return Err(ProtocolError::invalid(field, format!("{value} is below 1")));
    }
    u32::try_from(value).map_err(|_| ProtocolError::invalid(field, "too large"))
}
