//! Clients for the external metadata services.
//!
//! Each client receives a shared [`HttpClient`](crate::http_client::HttpClient),
//! so every request is charged against its service-class budget.

pub mod annotation;
pub mod converter;
pub mod preprint;
pub mod resolver;
mod traits;

pub use annotation::AnnotationFetcher;
pub use converter::XsltConverter;
pub use preprint::PreprintMetadataClient;
pub use resolver::IdentifierResolver;
pub use traits::{AnnotationSource, FallbackConverter, PmidResolver, PreprintSource, ResolveStrategy};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::http_client::HttpClient;
use crate::models::Ecosystem;
use crate::rate_limit::{ClassStats, RateLimiter, ServiceClass};
use crate::retrieval::{OrchestratorOptions, RetrievalOrchestrator};

/// The concrete clients, sharing one HTTP client and rate limiter.
#[derive(Clone)]
pub struct ServiceClients {
    pub resolver: Arc<IdentifierResolver>,
    pub preprints: Arc<PreprintMetadataClient>,
    pub annotations: Arc<AnnotationFetcher>,
    pub converter: Arc<XsltConverter>,
    limiter: RateLimiter,
}

impl ServiceClients {
    pub fn new(
        http: HttpClient,
        endpoints: &Endpoints,
        identity: NcbiIdentity,
        stylesheet: PathBuf,
        output_dir: PathBuf,
    ) -> Self {
        let preprints = Arc::new(PreprintMetadataClient::new(http.clone(), endpoints));
        let resolver = Arc::new(IdentifierResolver::new(
            http.clone(),
            endpoints,
            identity,
            preprints.clone(),
        ));
        Self {
            limiter: http.rate_limiter().clone(),
            resolver,
            preprints,
            annotations: Arc::new(AnnotationFetcher::new(http.clone(), endpoints)),
            converter: Arc::new(XsltConverter::new(http, stylesheet, output_dir)),
        }
    }

    /// Requests made so far, per service class.
    pub async fn request_stats(&self) -> BTreeMap<ServiceClass, ClassStats> {
        self.limiter.get_stats().await
    }

    /// Orchestrator wired to these clients.
    pub fn orchestrator(&self, options: OrchestratorOptions) -> RetrievalOrchestrator {
        RetrievalOrchestrator::new(
            self.resolver.clone(),
            self.preprints.clone(),
            self.annotations.clone(),
            self.converter.clone(),
        )
        .with_options(options)
    }
}

/// Base URLs of the external services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// BioC JSON endpoint; requests go to `{annotation}/{pmid}/unicode`.
    pub annotation: String,
    /// PMC ID-conversion endpoint.
    pub id_converter: String,
    /// E-utilities base (`esearch.fcgi`, `esummary.fcgi` live under it).
    pub eutils: String,
    /// bioRxiv API base.
    pub biorxiv: String,
    /// medRxiv API base.
    pub medrxiv: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            annotation: "https://www.ncbi.nlm.nih.gov/research/bionlp/RESTful/pubmed.cgi/BioC_json"
                .to_string(),
            id_converter: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string(),
            eutils: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            biorxiv: "https://api.biorxiv.org".to_string(),
            medrxiv: "https://api.medrxiv.org".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (local mirrors, test servers).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            annotation: format!("{}/bioc", base),
            id_converter: format!("{}/idconv/", base),
            eutils: format!("{}/eutils", base),
            biorxiv: base.to_string(),
            medrxiv: base.to_string(),
        }
    }

    /// API base for a preprint server.
    pub fn preprint_base(&self, ecosystem: Ecosystem) -> &str {
        match ecosystem {
            Ecosystem::Biorxiv => &self.biorxiv,
            Ecosystem::Medrxiv => &self.medrxiv,
        }
    }
}

/// Tool name and contact email sent to NCBI services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NcbiIdentity {
    pub tool: String,
    pub email: Option<String>,
}

impl Default for NcbiIdentity {
    fn default() -> Self {
        Self {
            tool: "biocfetch".to_string(),
            email: None,
        }
    }
}

impl NcbiIdentity {
    /// Query-string fragment (`tool=..&email=..`).
    pub fn query(&self) -> String {
        let mut query = format!("tool={}", urlencoding::encode(&self.tool));
        if let Some(ref email) = self.email {
            query.push_str("&email=");
            query.push_str(&urlencoding::encode(email));
        }
        query
    }
}
