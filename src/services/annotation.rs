//! BioC annotation client.

use async_trait::async_trait;
use tracing::debug;

use super::traits::AnnotationSource;
use super::Endpoints;
use crate::error::{FetchError, FetchResult};
use crate::http_client::HttpClient;
use crate::models::AnnotationDocument;
use crate::rate_limit::ServiceClass;

/// Fetches the BioC JSON annotation document for a PMID.
#[derive(Clone)]
pub struct AnnotationFetcher {
    http: HttpClient,
    base_url: String,
}

impl AnnotationFetcher {
    pub fn new(http: HttpClient, endpoints: &Endpoints) -> Self {
        Self {
            http,
            base_url: endpoints.annotation.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the unicode BioC document for `pmid`.
    pub fn document_url(&self, pmid: &str) -> String {
        format!("{}/{}/unicode", self.base_url, pmid.trim())
    }
}

#[async_trait]
impl AnnotationSource for AnnotationFetcher {
    async fn fetch_annotation(&self, pmid: &str) -> FetchResult<AnnotationDocument> {
        let url = self.document_url(pmid);
        let response = self.http.get(ServiceClass::Annotation, &url).await?;
        if !response.is_success() {
            return Err(FetchError::status(&url, response.status.as_u16()));
        }

        let document = AnnotationDocument::from_body(&response.text().await?)?;
        if document.is_absent() {
            debug!("No annotation available for PMID {}", pmid);
        }
        Ok(document)
    }
}
