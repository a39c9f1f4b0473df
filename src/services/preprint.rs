//! bioRxiv / medRxiv details client and PubMed title search.
//!
//! API docs: https://api.biorxiv.org/
//! The details endpoint is limited to one call per second.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::PreprintSource;
use super::Endpoints;
use crate::error::{FetchError, FetchResult};
use crate::http_client::HttpClient;
use crate::models::{normalize_doi, published_doi_from_field, Ecosystem, PreprintRecord};
use crate::rate_limit::ServiceClass;

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    collection: Vec<DetailsEntry>,
    #[serde(default)]
    messages: Vec<DetailsMessage>,
}

#[derive(Debug, Deserialize)]
struct DetailsEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    jatsxml: Option<String>,
    #[serde(default)]
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsMessage {
    #[serde(default)]
    status: String,
}

/// E-utilities esearch response (JSON mode).
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchResult {
    #[serde(default)]
    pub idlist: Vec<String>,
}

impl SearchResponse {
    /// First ranked identifier, if any.
    pub fn first_id(self) -> Option<String> {
        self.esearchresult
            .idlist
            .into_iter()
            .map(|id| id.trim().to_string())
            .find(|id| !id.is_empty())
    }
}

/// Client for preprint metadata.
#[derive(Clone)]
pub struct PreprintMetadataClient {
    http: HttpClient,
    endpoints: Endpoints,
}

impl PreprintMetadataClient {
    pub fn new(http: HttpClient, endpoints: &Endpoints) -> Self {
        Self {
            http,
            endpoints: endpoints.clone(),
        }
    }

    /// Details URL for a preprint DOI on one server.
    pub fn details_url(&self, doi: &str, ecosystem: Ecosystem) -> String {
        let path = normalize_doi(doi)
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/details/{}/{}",
            self.endpoints.preprint_base(ecosystem).trim_end_matches('/'),
            ecosystem.as_str(),
            path
        )
    }

    /// Title search URL. Spaces become `%20`; the search is restricted to the
    /// title field.
    pub fn title_search_url(&self, title: &str) -> String {
        format!(
            "{}/esearch.fcgi?db=pubmed&retmode=json&retmax=1000&term={}&field=title",
            self.endpoints.eutils.trim_end_matches('/'),
            urlencoding::encode(title.trim())
        )
    }

    /// The published DOI, present only when the preprint has since been
    /// formally published.
    pub fn extract_published_doi(record: &PreprintRecord) -> Option<String> {
        record.published_doi().map(str::to_string)
    }

    fn parse_details(
        body: &str,
        doi: &str,
        ecosystem: Ecosystem,
    ) -> FetchResult<PreprintRecord> {
        let response: DetailsResponse = serde_json::from_str(body)
            .map_err(|e| FetchError::Malformed(format!("{} details for {}: {}", ecosystem, doi, e)))?;

        let status = response
            .messages
            .into_iter()
            .next()
            .map(|m| m.status)
            .unwrap_or_default();

        let entry = response.collection.into_iter().next().ok_or_else(|| {
            FetchError::NotFound(format!(
                "{} has no record for {} (status: {})",
                ecosystem, doi, status
            ))
        })?;

        Ok(PreprintRecord {
            ecosystem,
            title: entry.title.trim().to_string(),
            source_doi: entry
                .doi
                .map(|d| normalize_doi(&d).to_string())
                .unwrap_or_else(|| normalize_doi(doi).to_string()),
            jats_url: entry.jatsxml.filter(|u| !u.trim().is_empty()),
            published_doi: published_doi_from_field(entry.published.as_deref()),
            status,
        })
    }
}

#[async_trait]
impl PreprintSource for PreprintMetadataClient {
    async fn fetch_details(&self, doi: &str, ecosystem: Ecosystem) -> FetchResult<PreprintRecord> {
        let url = self.details_url(doi, ecosystem);
        let body = self.http.get_text(ServiceClass::PreprintDetails, &url).await?;
        let record = Self::parse_details(&body, doi, ecosystem)?;
        debug!(
            "{} details for {}: status={}, published={:?}",
            ecosystem, doi, record.status, record.published_doi
        );
        Ok(record)
    }

    async fn search_pubmed_by_title(&self, title: &str) -> FetchResult<String> {
        if title.trim().is_empty() {
            return Err(FetchError::NotFound("empty title".to_string()));
        }
        let url = self.title_search_url(title);
        let response: SearchResponse = self
            .http
            .get(ServiceClass::TitleSearch, &url)
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .first_id()
            .ok_or_else(|| FetchError::NotFound(format!("no PubMed article titled {:?}", title)))
    }
}
