//! Which collection an upload belongs to.

use std::fmt;
use std::sync::Arc;

use oseh_protocol::{ContentDigest, ContentReference, DEFAULT_SHA512_KEY, SearchFilter, SearchRequest};
use serde_json::{Map, Value};

/// Builds search filters from a digest.
pub type DigestFilterFn = Arc<dyn Fn(&ContentDigest) -> Map<String, Value> + Send + Sync>;

/// Decides whether a search hit is the item being waited for.
pub type ItemPredicate = Arc<dyn Fn(&ContentReference) -> bool + Send + Sync>;

/// How the digest is turned into search filters.
#[derive(Clone)]
pub enum DigestFilter {
    /// `eq` filter on this key.
    Key(String),
    /// No digest filter; the scope's other filters find the item.
    Omit,
    /// Filters computed from the digest.
    Custom(DigestFilterFn),
}

impl fmt::Debug for DigestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Omit => f.write_str("Omit"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Endpoints and extra parameters of one upload-backed collection.
#[derive(Clone)]
pub struct EntityScope {
    /// Session endpoint, e.g. `/api/1/journeys/audio_contents/`.
    pub collection_path: String,
    /// Search endpoint used for dedupe and processing polls.
    pub search_path: String,
    pub digest_filter: DigestFilter,
    /// Filters merged into every search after the digest filter.
    pub extra_filters: Map<String, Value>,
    /// Fields merged into the session request body.
    pub extra_body: Map<String, Value>,
    /// Search hits it rejects count as not found.
    pub predicate: Option<ItemPredicate>,
}

impl fmt::Debug for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityScope")
            .field("collection_path", &self.collection_path)
            .field("search_path", &self.search_path)
            .field("digest_filter", &self.digest_filter)
            .field("extra_filters", &self.extra_filters)
            .field("extra_body", &self.extra_body)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl EntityScope {
    /// Scope for any collection following the usual layout, where search
    /// lives at `<collection>search`.
    pub fn new(collection_path: impl Into<String>) -> Self {
        let mut collection_path: String = collection_path.into();
        if !collection_path.ends_with('/') {
            collection_path.push('/');
        }
        Self {
            search_path: format!("{collection_path}search"),
            collection_path,
            digest_filter: DigestFilter::Key(DEFAULT_SHA512_KEY.to_string()),
            extra_filters: Map::new(),
            extra_body: Map::new(),
            predicate: None,
        }
    }

    pub fn journey_audio_content() -> Self {
        Self::new("/api/1/journeys/audio_contents/")
    }

    pub fn journey_background_image() -> Self {
        Self::new("/api/1/journeys/background_images/")
    }

    pub fn onboarding_video() -> Self {
        Self::new("/api/1/onboarding/videos/")
    }

    pub fn home_screen_image() -> Self {
        Self::new("/api/1/personalization/home/images/")
    }

    pub fn course_video_thumbnail() -> Self {
        Self::new("/api/1/courses/videos/thumbnails/")
    }

    pub fn with_sha512_key(mut self, key: impl Into<String>) -> Self {
        self.digest_filter = DigestFilter::Key(key.into());
        self
    }

    /// Searches without any digest filter.
    pub fn without_digest_filter(mut self) -> Self {
        self.digest_filter = DigestFilter::Omit;
        self
    }

    pub fn with_digest_filters(
        mut self,
        build: impl Fn(&ContentDigest) -> Map<String, Value> + Send + Sync + 'static,
    ) -> Self {
        self.digest_filter = DigestFilter::Custom(Arc::new(build));
        self
    }

    /// Adds an `eq` filter applied to every search.
    pub fn with_filter_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_filters
            .insert(key.into(), SearchFilter::equals(value).into());
        self
    }

    pub fn with_body_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_body.insert(key.into(), value.into());
        self
    }

    pub fn with_predicate(
        mut self,
        accept: impl Fn(&ContentReference) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(accept));
        self
    }

    /// The search that finds the processed item for `digest`.
    pub fn search_request(&self, digest: &ContentDigest) -> SearchRequest {
        match &self.digest_filter {
            DigestFilter::Key(key) => SearchRequest::by_sha512(key, digest, &self.extra_filters),
            DigestFilter::Omit => SearchRequest::first_match(Map::new(), &self.extra_filters),
            DigestFilter::Custom(build) => {
                SearchRequest::first_match(build(digest), &self.extra_filters)
            }
        }
    }

    /// Whether a search hit is acceptable.
    pub fn accepts(&self, item: &ContentReference) -> bool {
        self.predicate.as_ref().is_none_or(|accept| accept(item))
    }
}
