//! Seams between the retrieval orchestrator and the service clients.
//!
//! The orchestrator only talks to these traits, so tests can drive the
//! cascade with in-process stubs.

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::models::{AnnotationDocument, ArtifactRef, Ecosystem, Identifier, PreprintRecord};

/// Backend used to turn an identifier into a PMID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveStrategy {
    /// PMC ID-conversion service.
    IdConverter,
    /// E-utilities DOI term search, independent of the ID converter.
    Alternate,
    /// Preprint details lookup followed by a PubMed title search.
    Preprint(Ecosystem),
}

/// Converts between identifier schemes.
#[async_trait]
pub trait PmidResolver: Send + Sync {
    /// Resolve an identifier to a PMID using `strategy`.
    async fn resolve_to_pmid(
        &self,
        identifier: &Identifier,
        strategy: ResolveStrategy,
    ) -> FetchResult<String>;

    /// Reverse lookup of the DOI for a PMID.
    async fn resolve_to_doi(&self, pmid: &str) -> FetchResult<String>;
}

/// Preprint metadata service.
#[async_trait]
pub trait PreprintSource: Send + Sync {
    /// Fetch the details record for a preprint DOI on one server.
    async fn fetch_details(&self, doi: &str, ecosystem: Ecosystem) -> FetchResult<PreprintRecord>;

    /// Find the top-ranked PMID whose title matches `title`.
    async fn search_pubmed_by_title(&self, title: &str) -> FetchResult<String>;
}

/// Structured annotation service.
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    async fn fetch_annotation(&self, pmid: &str) -> FetchResult<AnnotationDocument>;
}

/// Converts a raw source document into a viewable artifact.
#[async_trait]
pub trait FallbackConverter: Send + Sync {
    /// Convert the document at `source_url`, writing it under `file_name`.
    async fn convert(&self, source_url: &str, file_name: &str) -> FetchResult<ArtifactRef>;
}
