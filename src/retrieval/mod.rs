//! Batch retrieval: the fallback cascades and the worker pool that runs them.
//!
//! Every key of a batch is driven through an ordered list of [`Strategy`]
//! values until one produces a document. Failures are recorded per key and
//! never abort the batch; the result always partitions the input.

mod batch;
mod cancel;
mod strategy;

pub use batch::{KeyState, ResolutionBatch, ResolutionResult};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use strategy::{Strategy, StrategyFailure};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchResult};
use crate::models::{
    doi_file_name, Ecosystem, Identifier, PreprintRecord, ResolvedDocument,
};
use crate::services::{
    AnnotationSource, FallbackConverter, PmidResolver, PreprintSource, ResolveStrategy,
};

/// Default number of concurrent workers per batch.
pub const DEFAULT_WORKERS: usize = 4;

/// Default time budget for one key, across all of its strategies.
pub const DEFAULT_KEY_TIMEOUT: Duration = Duration::from_secs(300);

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub workers: usize,
    pub key_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            key_timeout: DEFAULT_KEY_TIMEOUT,
        }
    }
}

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionEvent {
    /// A worker picked up a key.
    Started { worker_id: usize, key: String },
    /// The key reached a document.
    Resolved {
        worker_id: usize,
        key: String,
        fallback: bool,
    },
    /// Every strategy failed for the key.
    Unresolved {
        worker_id: usize,
        key: String,
        attempts: usize,
    },
}

/// Per-key state carried between strategies.
#[derive(Default)]
struct KeyContext {
    record: Option<PreprintRecord>,
}

type KeyOutcome = Result<ResolvedDocument, Vec<StrategyFailure>>;

/// Runs batches of identifiers through the retrieval cascades.
#[derive(Clone)]
pub struct RetrievalOrchestrator {
    resolver: Arc<dyn PmidResolver>,
    preprints: Arc<dyn PreprintSource>,
    annotations: Arc<dyn AnnotationSource>,
    converter: Arc<dyn FallbackConverter>,
    options: OrchestratorOptions,
    events: Option<mpsc::Sender<ResolutionEvent>>,
}

impl RetrievalOrchestrator {
    pub fn new(
        resolver: Arc<dyn PmidResolver>,
        preprints: Arc<dyn PreprintSource>,
        annotations: Arc<dyn AnnotationSource>,
        converter: Arc<dyn FallbackConverter>,
    ) -> Self {
        Self {
            resolver,
            preprints,
            annotations,
            converter,
            options: OrchestratorOptions::default(),
            events: None,
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<ResolutionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Resolve published articles: primary PMID lookup, then the alternate
    /// lookup for DOIs.
    pub async fn resolve_published(&self, batch: &ResolutionBatch) -> ResolutionResult {
        self.resolve_published_with_cancel(batch, CancelToken::never())
            .await
    }

    pub async fn resolve_published_with_cancel(
        &self,
        batch: &ResolutionBatch,
        cancel: CancelToken,
    ) -> ResolutionResult {
        let cascade = Strategy::published(batch.identifiers_are_pmids());
        self.run_batch(batch, cascade, cancel).await
    }

    /// Resolve preprints through the full cascade, ending with JATS
    /// conversion.
    pub async fn resolve_preprint(&self, batch: &ResolutionBatch) -> ResolutionResult {
        self.resolve_preprint_with_cancel(batch, CancelToken::never())
            .await
    }

    pub async fn resolve_preprint_with_cancel(
        &self,
        batch: &ResolutionBatch,
        cancel: CancelToken,
    ) -> ResolutionResult {
        self.run_batch(batch, Strategy::preprint(), cancel).await
    }

    async fn run_batch(
        &self,
        batch: &ResolutionBatch,
        cascade: &'static [Strategy],
        cancel: CancelToken,
    ) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        if batch.is_empty() {
            return result;
        }

        let workers = self.options.workers.clamp(1, batch.len());
        debug!(
            "Resolving {} keys with {} workers ({} strategies)",
            batch.len(),
            workers,
            cascade.len()
        );

        let queue: Arc<Mutex<VecDeque<String>>> =
            Arc::new(Mutex::new(batch.keys().iter().cloned().collect()));
        let is_pmid = batch.identifiers_are_pmids();

        let mut handles = Vec::new();
        for worker_id in 0..workers {
            let this = self.clone();
            let queue = queue.clone();
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let key = {
                        let mut queue = queue.lock().await;
                        queue.pop_front()
                    };
                    let key = match key {
                        Some(k) => k,
                        None => break,
                    };

                    let outcome = this
                        .run_key(worker_id, &key, is_pmid, cascade, &cancel)
                        .await;
                    outcomes.push((key, outcome));
                }
                outcomes
            });
            handles.push(handle);
        }

        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(outcomes) => {
                    for (key, outcome) in outcomes {
                        result.record(key, outcome);
                    }
                }
                Err(e) => warn!("Retrieval worker aborted: {}", e),
            }
        }

        // Keys skipped by cancellation or lost with an aborted worker.
        for key in batch.keys() {
            if result.state_of(key).is_none() {
                result.record(
                    key.clone(),
                    Err(vec![StrategyFailure::batch(FetchError::Cancelled)]),
                );
            }
        }

        info!(
            "Batch done: {} resolved ({} fallback), {} unresolved",
            result.resolved.len(),
            result.fallback_count(),
            result.unresolved.len()
        );
        result
    }

    async fn run_key(
        &self,
        worker_id: usize,
        key: &str,
        is_pmid: bool,
        cascade: &'static [Strategy],
        cancel: &CancelToken,
    ) -> KeyOutcome {
        self.emit(ResolutionEvent::Started {
            worker_id,
            key: key.to_string(),
        })
        .await;

        let identifier = Identifier::from_key(key, is_pmid);
        let mut failures = Vec::new();
        let outcome = tokio::select! {
            res = tokio::time::timeout(
                self.options.key_timeout,
                self.run_cascade(&identifier, cascade, &mut failures),
            ) => match res {
                Ok(found) => found,
                Err(_) => {
                    failures.push(StrategyFailure::batch(FetchError::Timeout(self.options.key_timeout)));
                    None
                }
            },
            _ = cancel.cancelled() => {
                failures.push(StrategyFailure::batch(FetchError::Cancelled));
                None
            }
        };

        match outcome {
            Some(doc) => {
                info!("Resolved {} ({})", key, if doc.is_fallback() { "fallback" } else { "annotated" });
                self.emit(ResolutionEvent::Resolved {
                    worker_id,
                    key: key.to_string(),
                    fallback: doc.is_fallback(),
                })
                .await;
                Ok(doc)
            }
            None => {
                info!("Could not resolve {} after {} attempts", key, failures.len());
                self.emit(ResolutionEvent::Unresolved {
                    worker_id,
                    key: key.to_string(),
                    attempts: failures.len(),
                })
                .await;
                Err(failures)
            }
        }
    }

    /// Try each strategy in order; the first document wins.
    async fn run_cascade(
        &self,
        identifier: &Identifier,
        cascade: &[Strategy],
        failures: &mut Vec<StrategyFailure>,
    ) -> Option<ResolvedDocument> {
        let mut ctx = KeyContext::default();
        for &strategy in cascade {
            match self.attempt(strategy, identifier, &mut ctx).await {
                Ok(Some(doc)) => return Some(doc),
                Ok(None) => {}
                Err(e) => {
                    debug!("{} failed for {}: {}", strategy, identifier, e);
                    failures.push(StrategyFailure::new(strategy, e));
                }
            }
        }
        None
    }

    /// Run one strategy. `Ok(None)` means the step produced no document
    /// but did not fail.
    async fn attempt(
        &self,
        strategy: Strategy,
        identifier: &Identifier,
        ctx: &mut KeyContext,
    ) -> FetchResult<Option<ResolvedDocument>> {
        match strategy {
            Strategy::Primary => {
                self.annotate_via(identifier, ResolveStrategy::IdConverter)
                    .await
            }
            Strategy::Alternate => {
                self.annotate_via(identifier, ResolveStrategy::Alternate)
                    .await
            }
            Strategy::PreprintPmid(ecosystem) => {
                self.annotate_via(identifier, ResolveStrategy::Preprint(ecosystem))
                    .await
            }
            Strategy::DetailsLookup => {
                ctx.record = Some(self.lookup_details(identifier.value()).await?);
                Ok(None)
            }
            Strategy::PublishedDoiPmid => {
                let published = required_record(ctx)?.published_doi().ok_or_else(|| {
                    FetchError::NotFound(format!("{} has no published version", identifier))
                })?;
                let published = Identifier::doi(published);
                self.annotate_via(&published, ResolveStrategy::IdConverter)
                    .await
            }
            Strategy::JatsFallback => {
                let record = required_record(ctx)?;
                let source_url = record.jats_url.as_deref().ok_or_else(|| {
                    FetchError::NotFound(format!("{} has no JATS source", identifier))
                })?;
                let artifact = self
                    .converter
                    .convert(source_url, &doi_file_name(identifier.value()))
                    .await?;
                Ok(Some(ResolvedDocument::FallbackPending { artifact }))
            }
        }
    }

    async fn annotate_via(
        &self,
        identifier: &Identifier,
        strategy: ResolveStrategy,
    ) -> FetchResult<Option<ResolvedDocument>> {
        let pmid = self.resolver.resolve_to_pmid(identifier, strategy).await?;
        match self.annotations.fetch_annotation(&pmid).await?.into_payload() {
            Some(payload) => Ok(Some(ResolvedDocument::Annotated { pmid, payload })),
            None => Err(FetchError::NotFound(format!(
                "no annotation for PMID {}",
                pmid
            ))),
        }
    }

    /// bioRxiv first; medRxiv when bioRxiv fails or reports a non-ok status.
    async fn lookup_details(&self, doi: &str) -> FetchResult<PreprintRecord> {
        match self.preprints.fetch_details(doi, Ecosystem::Biorxiv).await {
            Ok(record) if record.is_ok() => return Ok(record),
            Ok(record) => debug!("bioRxiv status for {} is {:?}", doi, record.status),
            Err(e) => debug!("bioRxiv details for {} failed: {}", doi, e),
        }
        self.preprints.fetch_details(doi, Ecosystem::Medrxiv).await
    }

    async fn emit(&self, event: ResolutionEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event).await;
        }
    }
}

fn required_record(ctx: &KeyContext) -> FetchResult<&PreprintRecord> {
    ctx.record
        .as_ref()
        .ok_or_else(|| FetchError::NotFound("no preprint details".to_string()))
}
