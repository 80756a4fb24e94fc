use std::time::Duration;

use oseh_protocol::{
    ContentReference, CreateUploadSessionRequest, SearchRequest, UploadSession,
    is_part_already_uploaded, parse_search_response, parse_upload_session,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::parse_retry_after;
use crate::{ApiError, LoginContext};

/// Characters escaped when a server id is placed in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'-')
    .remove(b'.')
    .remove(b'~');

/// Result of a part upload that the server accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOutcome {
    Uploaded,
    /// The server already had this part (409 `part_already_uploaded`).
    AlreadyUploaded,
}

/// Oseh API client.
pub struct ApiClient {
    http: reqwest::Client,
    login: LoginContext,
}

impl ApiClient {
    /// Creates a client that authorizes requests with `login`.
    pub fn new(login: LoginContext) -> Result<Self, ApiError> {
        Self::with_timeout(login, None)
    }

    /// Like [`new`](Self::new) with a per-request timeout.
    pub fn with_timeout(login: LoginContext, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("bearer {}", login.token()))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            login,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.login.base_url(), path)
        } else {
            format!("{}/{}", self.login.base_url(), path)
        }
    }

    /// Performs an authenticated JSON POST and returns the body of a 2xx.
    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<u8>, ApiError> {
        let url = self.url(path);
        let resp = self.http.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// Looks up an already processed item by its original file digest.
    ///
    /// `Ok(None)` means the server has no such item yet.
    pub async fn find_by_sha512(
        &self,
        search_path: &str,
        request: &SearchRequest,
    ) -> Result<Option<ContentReference>, ApiError> {
        let body = self.post_json(search_path, request).await?;
        Ok(parse_search_response(&body)?)
    }

    /// Allocates an upload session for a file of `request.file_size` bytes.
    pub async fn create_upload_session(
        &self,
        collection_path: &str,
        request: &CreateUploadSessionRequest,
    ) -> Result<UploadSession, ApiError> {
        let body = self.post_json(collection_path, request).await?;
        let session = parse_upload_session(&body)?;
        debug!(
            uid = %session.uid,
            entries = session.parts.len(),
            "upload session created"
        );
        Ok(session)
    }

    /// Uploads one part as multipart form field `file`.
    ///
    /// Authorized with the session `jwt`, not the login token.
    pub async fn upload_part(
        &self,
        session_uid: &str,
        jwt: &str,
        number: u32,
        data: Vec<u8>,
    ) -> Result<PartOutcome, ApiError> {
        let url = self.url(&format!(
            "/api/1/file_uploads/{}/{number}",
            utf8_percent_encode(session_uid, PATH_SEGMENT)
        ));
        let mut auth =
            HeaderValue::from_str(&format!("bearer {jwt}")).map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(data).file_name("file"),
        );

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(PartOutcome::Uploaded);
        }

        if status == StatusCode::CONFLICT {
            let retry_after = retry_after_header(resp.headers());
            let body = resp.bytes().await?;
            if is_part_already_uploaded(&body) {
                debug!(part = number, "part already uploaded");
                return Ok(PartOutcome::AlreadyUploaded);
            }
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(part = number, %body, "unexpected conflict uploading part");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
                retry_after,
            });
        }

        Err(status_error(resp).await)
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Consumes a non-success response into [`ApiError::Status`].
async fn status_error(resp: reqwest::Response) -> ApiError {
    let status = resp.status().as_u16();
    let retry_after = retry_after_header(resp.headers());
    let body = resp.text().await.unwrap_or_default();
    ApiError::Status {
        status,
        body,
        retry_after,
    }
}
