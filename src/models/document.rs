//! Annotation documents and fallback artifacts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};

/// Result of an annotation lookup for a single PMID.
///
/// An empty payload and a missing payload mean the same thing: no
/// annotation is available for the article.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationDocument {
    /// Non-empty BioC JSON payload.
    Annotated(serde_json::Value),
    /// No annotation available.
    Absent,
}

impl AnnotationDocument {
    /// Classify a decoded payload. Empty arrays, empty objects and `null`
    /// are treated as absent.
    pub fn from_payload(payload: serde_json::Value) -> Self {
        let empty = match &payload {
            serde_json::Value::Null => true,
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            AnnotationDocument::Absent
        } else {
            AnnotationDocument::Annotated(payload)
        }
    }

    /// Decode a raw response body.
    pub fn from_body(body: &str) -> FetchResult<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            return Ok(AnnotationDocument::Absent);
        }
        let payload: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| FetchError::Malformed(format!("annotation payload: {}", e)))?;
        Ok(Self::from_payload(payload))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AnnotationDocument::Absent)
    }

    /// Take the payload if one is present.
    pub fn into_payload(self) -> Option<serde_json::Value> {
        match self {
            AnnotationDocument::Annotated(payload) => Some(payload),
            AnnotationDocument::Absent => None,
        }
    }
}

/// Reference to a converted raw-source artifact awaiting annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Where the converted artifact was written.
    pub path: PathBuf,
    /// URL of the raw source document that was converted.
    pub source_url: String,
}

/// Document stored for a resolved batch key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedDocument {
    /// Structured annotation retrieved for `pmid`.
    Annotated {
        pmid: String,
        payload: serde_json::Value,
    },
    /// No annotation exists; the raw source was converted instead.
    FallbackPending { artifact: ArtifactRef },
}

impl ResolvedDocument {
    /// The annotation payload, if this is an annotated document.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            ResolvedDocument::Annotated { payload, .. } => Some(payload),
            ResolvedDocument::FallbackPending { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolvedDocument::FallbackPending { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_array_is_absent() {
        assert!(AnnotationDocument::from_body("[]").unwrap().is_absent());
        assert!(AnnotationDocument::from_body("  [ ] ").unwrap().is_absent());
        assert!(AnnotationDocument::from_payload(json!(null)).is_absent());
    }

    #[test]
    fn test_non_empty_payload_is_annotated() {
        let doc = AnnotationDocument::from_body(r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(doc.into_payload(), Some(json!([{"id": "1"}])));
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let err = AnnotationDocument::from_body("<html>oops</html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_resolved_document_serializes_tagged() {
        let doc = ResolvedDocument::FallbackPending {
            artifact: ArtifactRef {
                path: PathBuf::from("/tmp/10.1_abc.html"),
                source_url: "https://example.org/a.xml".to_string(),
            },
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["kind"], "fallback_pending");
        assert_eq!(value["artifact"]["path"], "/tmp/10.1_abc.html");
    }
}
