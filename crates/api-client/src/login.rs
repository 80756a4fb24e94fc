use std::fmt;

use crate::ApiError;

/// Where to send requests and who is sending them.
///
/// Passed explicitly to [`ApiClient::new`](crate::ApiClient::new); there is
/// no process-wide login state.
#[derive(Clone)]
pub struct LoginContext {
    base_url: String,
    token: String,
}

impl LoginContext {
    /// `base_url` is the API origin, e.g. `https://oseh.io`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        validate_base_url(base_url)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::InvalidToken);
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Checks that `base_url` is an absolute http(s) URL.
pub fn validate_base_url(base_url: &str) -> Result<(), ApiError> {
    let parsed =
        reqwest::Url::parse(base_url).map_err(|e| ApiError::Url(format!("{base_url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Url(format!("{base_url}: unsupported scheme")));
    }
    Ok(())
}

impl fmt::Debug for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginContext")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}
