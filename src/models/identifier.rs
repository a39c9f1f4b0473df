//! Publication identifiers and DOI normalization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker that precedes the DOI suffix in resolver links.
const DOI_RESOLVER_MARKER: &str = "doi.org/";

/// A publication identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "value", rename_all = "lowercase")]
pub enum Identifier {
    /// Digital Object Identifier, stored without the resolver host.
    Doi(String),
    /// PubMed identifier.
    Pmid(String),
}

impl Identifier {
    /// Create a DOI identifier, stripping any resolver-host prefix.
    pub fn doi(raw: &str) -> Self {
        Identifier::Doi(normalize_doi(raw).to_string())
    }

    /// Create a PMID identifier.
    pub fn pmid(raw: &str) -> Self {
        Identifier::Pmid(raw.trim().to_string())
    }

    /// Build an identifier for a batch key.
    pub fn from_key(key: &str, is_pmid: bool) -> Self {
        if is_pmid {
            Self::pmid(key)
        } else {
            Self::doi(key)
        }
    }

    /// The raw identifier value (normalized DOI suffix or PMID).
    pub fn value(&self) -> &str {
        match self {
            Identifier::Doi(v) | Identifier::Pmid(v) => v,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Doi(v) => write!(f, "doi:{}", v),
            Identifier::Pmid(v) => write!(f, "pmid:{}", v),
        }
    }
}

/// Strip the resolver host (`https://doi.org/`, `http://dx.doi.org/`, ...)
/// from a DOI, returning the suffix used in request URLs.
pub fn normalize_doi(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.rfind(DOI_RESOLVER_MARKER) {
        Some(idx) => &trimmed[idx + DOI_RESOLVER_MARKER.len()..],
        None => trimmed,
    }
}

/// Derive the local filename for a DOI: resolver prefix stripped, `/`
/// replaced by `_`, dots preserved.
pub fn doi_file_name(doi: &str) -> String {
    normalize_doi(doi).replace('/', "_")
}

/// Derive a local filename for an arbitrary link.
///
/// DOI links use [`doi_file_name`]; other links drop the `https://` scheme
/// and replace `/` with `_`.
pub fn link_file_name(link: &str) -> String {
    let trimmed = link.trim();
    if trimmed.contains(DOI_RESOLVER_MARKER) {
        return doi_file_name(trimmed);
    }
    let without_scheme = match trimmed.rfind("https://") {
        Some(idx) => &trimmed[idx + "https://".len()..],
        None => trimmed,
    };
    without_scheme.replace('/', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_resolver_host() {
        assert_eq!(
            normalize_doi("https://doi.org/10.1101/2020.01.01.900000"),
            "10.1101/2020.01.01.900000"
        );
        assert_eq!(normalize_doi("http://dx.doi.org/10.1/abc"), "10.1/abc");
        assert_eq!(normalize_doi(" 10.1/abc "), "10.1/abc");
    }

    #[test]
    fn test_doi_file_name() {
        assert_eq!(
            doi_file_name("https://doi.org/10.1101/2020.01.01.900000"),
            "10.1101_2020.01.01.900000"
        );
        assert_eq!(doi_file_name("10.1/a/b"), "10.1_a_b");
    }

    #[test]
    fn test_link_file_name_non_doi() {
        assert_eq!(
            link_file_name("https://example.org/papers/x.pdf"),
            "example.org_papers_x.pdf"
        );
        assert_eq!(
            link_file_name("https://doi.org/10.1/abc"),
            "10.1_abc"
        );
    }

    #[test]
    fn test_identifier_from_key() {
        assert_eq!(
            Identifier::from_key("https://doi.org/10.1/abc", false),
            Identifier::Doi("10.1/abc".to_string())
        );
        assert_eq!(
            Identifier::from_key("123", true),
            Identifier::Pmid("123".to_string())
        );
    }
}
