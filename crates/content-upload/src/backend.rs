//! Server operations the upload flow depends on.
//!
//! `ContentBackend` is implemented for [`ApiClient`]; tests substitute
//! in-memory mocks.

use std::future::Future;
use std::pin::Pin;

use oseh_api::{ApiClient, ApiError, JobOutcome, PartOutcome};
use oseh_protocol::{
    ContentDigest, ContentReference, CreateUploadSessionRequest, JobEvent, JobRef, UploadSession,
};

use crate::scope::EntityScope;

/// Abstract connection to the upload endpoints.
pub trait ContentBackend: Send + Sync {
    /// Returns the first item the scope's search finds for this digest.
    fn find_by_sha512(
        &self,
        scope: &EntityScope,
        digest: &ContentDigest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ContentReference>, ApiError>> + Send + '_>>;

    /// Allocates an upload session for `file_size` bytes.
    fn create_upload_session(
        &self,
        scope: &EntityScope,
        file_size: u64,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, ApiError>> + Send + '_>>;

    /// Sends one part of `session`.
    fn upload_part(
        &self,
        session: &UploadSession,
        number: u32,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PartOutcome, ApiError>> + Send + '_>>;

    /// Follows a processing job over one connection until it ends,
    /// passing the latest event of each batch to `on_event`.
    fn follow_job<'a>(
        &'a self,
        job: &'a JobRef,
        on_event: &'a (dyn Fn(&JobEvent) + Send + Sync),
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ApiError>> + Send + 'a>>;
}

/// Searches for `digest`, treating a hit the scope rejects as missing.
pub(crate) async fn find_accepted(
    backend: &dyn ContentBackend,
    scope: &EntityScope,
    digest: &ContentDigest,
) -> Result<Option<ContentReference>, ApiError> {
    let found = backend.find_by_sha512(scope, digest).await?;
    Ok(found.filter(|item| scope.accepts(item)))
}

impl ContentBackend for ApiClient {
    fn find_by_sha512(
        &self,
        scope: &EntityScope,
        digest: &ContentDigest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<ContentReference>, ApiError>> + Send + '_>> {
        let request = scope.search_request(digest);
        let path = scope.search_path.clone();
        Box::pin(async move { ApiClient::find_by_sha512(self, &path, &request).await })
    }

    fn create_upload_session(
        &self,
        scope: &EntityScope,
        file_size: u64,
    ) -> Pin<Box<dyn Future<Output = Result<UploadSession, ApiError>> + Send + '_>> {
        let request = CreateUploadSessionRequest::new(file_size, &scope.extra_body);
        let path = scope.collection_path.clone();
        Box::pin(async move { ApiClient::create_upload_session(self, &path, &request).await })
    }

    fn upload_part(
        &self,
        session: &UploadSession,
        number: u32,
        data: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<PartOutcome, ApiError>> + Send + '_>> {
        let uid = session.uid.clone();
        let jwt = session.jwt.clone();
        Box::pin(async move { ApiClient::upload_part(self, &uid, &jwt, number, data).await })
    }

    fn follow_job<'a>(
        &'a self,
        job: &'a JobRef,
        on_event: &'a (dyn Fn(&JobEvent) + Send + Sync),
    ) -> Pin<Box<dyn Future<Output = Result<JobOutcome, ApiError>> + Send + 'a>> {
        Box::pin(ApiClient::follow_job(self, job, on_event))
    }
}
