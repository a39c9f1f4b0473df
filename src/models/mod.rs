//! Data models for identifier resolution.

mod document;
mod identifier;
mod preprint;

pub use document::{AnnotationDocument, ArtifactRef, ResolvedDocument};
pub use identifier::{doi_file_name, link_file_name, normalize_doi, Identifier};
pub use preprint::{published_doi_from_field, ArticleSummary, Ecosystem, PreprintRecord, STATUS_OK};
