//! # contract: interfaces for the pipeline's external collaborators
//!
//! The collection pipeline talks to four things it does not own: the page
//! that advertises downloadable dataset files, the HTTP servers hosting the
//! raw files, the header-mapping store, and the remote ingestion endpoint.
//! Each is a single trait here, so production code wires in the real client
//! and tests wire in a deterministic mock.
//!
//! ## Error handling
//! Collaborator failures are modelled as enum variants, not panics or boxed
//! strings: the core operations are required to absorb them (degrade to a
//! default mapping, skip a dataset, count a batch as failed) rather than
//! propagate. Nothing in this module unwinds into a caller.
//!
//! ## Mocking & Testing
//! All traits are annotated for `mockall`, exported under the
//! `test-export-mocks` feature so integration tests can generate mocks.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::record::{CanonicalRecord, HeaderMapping};

/// Failure fetching a remote resource (link page or raw dataset file).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Failure querying the header-mapping store.
///
/// The resolver pattern-matches on this and substitutes the fallback
/// mapping; it never reaches the pipeline's callers.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("mapping store unavailable: {0}")]
    Unavailable(String),
    #[error("mapping query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Failure transmitting one upload batch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("batch request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("batch rejected with status {0}")]
    Status(reqwest::StatusCode),
    #[error("batch serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TransportError {
    /// Timeouts are logged distinctly from other transport failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Transport(e) if e.is_timeout())
    }
}

/// Produces the set of downloadable dataset file URLs.
///
/// Link discovery itself (browser automation against the registry site) is
/// outside the pipeline; implementors only promise that returned links
/// follow the `*crnt.txt` suffix convention.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LinkSupplier: Send + Sync {
    async fn links(&self) -> Result<Vec<String>, FetchError>;
}

/// Fetches one raw tab-separated dataset by URL.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Keyed lookup of header mappings.
///
/// `dataset_key` is already normalized (spaced, upper-cased); the lookup is
/// a prefix match. An implementor constructed with an aggregator (BBB) id
/// narrows every match to that region. `Ok(None)` is a miss, not an error.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn mapping_for(
        &self,
        dataset_key: &str,
    ) -> Result<Option<HeaderMapping>, LookupError>;
}

/// Transmits one batch of canonical records to the ingestion endpoint.
///
/// A batch either lands (2xx from the endpoint) or fails as a unit; the
/// transport does not retry or split batches itself.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send(&self, batch: &[CanonicalRecord]) -> Result<(), TransportError>;
}
