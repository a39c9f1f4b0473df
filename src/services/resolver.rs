//! Identifier resolution: DOI to PMID, PMID to DOI, and article summaries.
//!
//! The PMC ID converter is the primary backend. An E-utilities DOI term
//! search serves as the independent alternate, and preprint DOIs go through
//! the preprint details service followed by a PubMed title search.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use tracing::debug;

use super::preprint::SearchResponse;
use super::traits::{PmidResolver, PreprintSource, ResolveStrategy};
use super::{Endpoints, NcbiIdentity};
use crate::error::{FetchError, FetchResult};
use crate::http_client::HttpClient;
use crate::models::{ArticleSummary, Ecosystem, Identifier};
use crate::rate_limit::ServiceClass;

/// Resolves identifiers against NCBI and the preprint servers.
#[derive(Clone)]
pub struct IdentifierResolver {
    http: HttpClient,
    endpoints: Endpoints,
    identity: NcbiIdentity,
    preprints: Arc<dyn PreprintSource>,
}

impl IdentifierResolver {
    pub fn new(
        http: HttpClient,
        endpoints: &Endpoints,
        identity: NcbiIdentity,
        preprints: Arc<dyn PreprintSource>,
    ) -> Self {
        Self {
            http,
            endpoints: endpoints.clone(),
            identity,
            preprints,
        }
    }

    fn id_converter_url(&self, id: &str) -> String {
        format!(
            "{}?{}&ids={}",
            self.endpoints.id_converter,
            self.identity.query(),
            urlencoding::encode(id)
        )
    }

    fn doi_search_url(&self, doi: &str) -> String {
        format!(
            "{}/esearch.fcgi?db=pubmed&retmode=json&{}&term={}",
            self.endpoints.eutils.trim_end_matches('/'),
            self.identity.query(),
            urlencoding::encode(&format!("{}[doi]", doi))
        )
    }

    fn summary_url(&self, pmid: &str) -> String {
        format!(
            "{}/esummary.fcgi?db=pubmed&retmode=json&{}&id={}",
            self.endpoints.eutils.trim_end_matches('/'),
            self.identity.query(),
            urlencoding::encode(pmid)
        )
    }

    async fn lookup_id_converter(
        &self,
        class: ServiceClass,
        id: &str,
        attribute: &str,
    ) -> FetchResult<String> {
        let url = self.id_converter_url(id);
        let body = self.http.get_text(class, &url).await?;
        parse_idconv_record(&body, attribute)?
            .ok_or_else(|| FetchError::Resolution(format!("ID converter has no {} for {}", attribute, id)))
    }

    async fn lookup_doi_search(&self, doi: &str) -> FetchResult<String> {
        let url = self.doi_search_url(doi);
        let response: SearchResponse = self
            .http
            .get(ServiceClass::AlternateLookup, &url)
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .first_id()
            .ok_or_else(|| FetchError::Resolution(format!("PubMed has no article with DOI {}", doi)))
    }

    async fn lookup_preprint(&self, doi: &str, ecosystem: Ecosystem) -> FetchResult<String> {
        let record = self.preprints.fetch_details(doi, ecosystem).await?;
        self.preprints
            .search_pubmed_by_title(&record.title)
            .await
            .map_err(|e| match e {
                FetchError::NotFound(msg) => FetchError::Resolution(msg),
                other => other,
            })
    }

    /// Title and first author for a PMID.
    pub async fn fetch_summary(&self, pmid: &str) -> FetchResult<ArticleSummary> {
        let url = self.summary_url(pmid);
        let body: Value = self
            .http
            .get(ServiceClass::ArticleSummary, &url)
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_summary(&body, pmid)
    }
}

#[async_trait]
impl PmidResolver for IdentifierResolver {
    async fn resolve_to_pmid(
        &self,
        identifier: &Identifier,
        strategy: ResolveStrategy,
    ) -> FetchResult<String> {
        let doi = match identifier {
            Identifier::Pmid(pmid) => return Ok(pmid.clone()),
            Identifier::Doi(doi) => doi.as_str(),
        };

        let pmid = match strategy {
            ResolveStrategy::IdConverter => {
                self.lookup_id_converter(ServiceClass::IdConversion, doi, "pmid")
                    .await?
            }
            ResolveStrategy::Alternate => self.lookup_doi_search(doi).await?,
            ResolveStrategy::Preprint(ecosystem) => self.lookup_preprint(doi, ecosystem).await?,
        };

        debug!("Resolved {} to PMID {} via {:?}", identifier, pmid, strategy);
        Ok(pmid)
    }

    async fn resolve_to_doi(&self, pmid: &str) -> FetchResult<String> {
        self.lookup_id_converter(ServiceClass::ReverseDoi, pmid.trim(), "doi")
            .await
    }
}

/// Read `attribute` from the first `<record>` element of an ID-converter
/// response. Returns `None` when the record lacks it (the service reports
/// unknown IDs as a record with `status="error"`).
pub fn parse_idconv_record(xml: &str, attribute: &str) -> FetchResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"record" =>
            {
                return record_attribute(e, attribute);
            }
            Ok(Event::Eof) => {
                return Err(FetchError::Resolution(
                    "ID converter response has no record".to_string(),
                ))
            }
            Err(e) => {
                return Err(FetchError::Malformed(format!(
                    "ID converter XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }
}

fn record_attribute(element: &BytesStart<'_>, attribute: &str) -> FetchResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FetchError::Malformed(format!("ID converter attribute: {}", e)))?;
        if attr.key.as_ref() == attribute.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| FetchError::Malformed(format!("ID converter attribute: {}", e)))?;
            let value = value.trim();
            return Ok((!value.is_empty()).then(|| value.to_string()));
        }
    }
    Ok(None)
}

fn parse_summary(body: &Value, pmid: &str) -> FetchResult<ArticleSummary> {
    let entry = body
        .get("result")
        .and_then(|r| r.get(pmid))
        .ok_or_else(|| FetchError::NotFound(format!("no summary for PMID {}", pmid)))?;

    if let Some(error) = entry.get("error").and_then(Value::as_str) {
        return Err(FetchError::NotFound(format!("PMID {}: {}", pmid, error)));
    }

    let title = entry
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let first_author = entry
        .get("authors")
        .and_then(Value::as_array)
        .and_then(|authors| authors.first())
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ArticleSummary {
        pmid: pmid.to_string(),
        title,
        first_author,
    })
}
