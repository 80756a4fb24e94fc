use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::ProtocolError;

/// Filter key that most upload-backed collections index the original
/// file's digest under.
pub const DEFAULT_SHA512_KEY: &str = "original_file_sha512";

/// Comparison operator of a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
}

/// A single `{ operator, value }` search filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl SearchFilter {
    pub fn equals(value: impl Into<serde_json::Value>) -> Self {
        Self {
            operator: FilterOperator::Eq,
            value: value.into(),
        }
    }
}

impl From<SearchFilter> for serde_json::Value {
    fn from(filter: SearchFilter) -> Self {
        serde_json::json!({ "operator": filter.operator, "value": filter.value })
    }
}

/// Body of `POST <collection>/search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub filters: serde_json::Map<String, serde_json::Value>,
    pub limit: u32,
}

impl SearchRequest {
    /// Looks up at most one item matching `filters`.
    ///
    /// `extra_filters` are merged after `filters` and win on a shared key.
    pub fn first_match(
        mut filters: serde_json::Map<String, serde_json::Value>,
        extra_filters: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        for (key, value) in extra_filters {
            filters.insert(key.clone(), value.clone());
        }
        Self { filters, limit: 1 }
    }

    /// Looks up at most one item whose `sha512_key` equals `digest`.
    pub fn by_sha512(
        sha512_key: &str,
        digest: &ContentDigest,
        extra_filters: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let mut filters = serde_json::Map::new();
        filters.insert(
            sha512_key.to_string(),
            SearchFilter::equals(digest.as_str()).into(),
        );
        Self::first_match(filters, extra_filters)
    }
}

/// Body of a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub items: Vec<serde_json::Value>,
}

/// Server identity of a processed, deduplicated artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReference {
    pub uid: String,
    /// The full search item, for callers that need more than the uid.
    pub item: serde_json::Value,
}

impl ContentReference {
    /// Validates a single search item.
    pub fn from_item(item: serde_json::Value) -> Result<Self, ProtocolError> {
        let uid = match item.get("uid") {
            Some(serde_json::Value::String(uid)) if !uid.is_empty() => uid.clone(),
            Some(_) => return Err(ProtocolError::invalid("uid", "not a non-empty string")),
            None => return Err(ProtocolError::MissingField("uid")),
        };
        Ok(Self { uid, item })
    }
}

/// Parses a search response, returning the first item if there is one.
pub fn parse_search_response(body: &[u8]) -> Result<Option<ContentReference>, ProtocolError> {
    let resp: SearchResponse = serde_json::from_slice(body)?;
    resp.items
        .into_iter()
        .next()
        .map(ContentReference::from_item)
        .transpose()
}
