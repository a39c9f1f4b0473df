//! Cascade behaviour of the retrieval orchestrator, driven with in-process
//! service stubs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use biocfetch::error::{FetchError, FetchResult};
use biocfetch::models::{AnnotationDocument, ArtifactRef, Ecosystem, Identifier, PreprintRecord};
use biocfetch::retrieval::{
    cancel_pair, KeyState, OrchestratorOptions, ResolutionBatch, RetrievalOrchestrator, Strategy,
};
use biocfetch::services::{
    AnnotationSource, FallbackConverter, PmidResolver, PreprintSource, ResolveStrategy,
};

type Trace = Arc<Mutex<Vec<String>>>;

/// Configurable stand-in for every external service.
#[derive(Default)]
struct Stub {
    trace: Trace,
    /// DOI -> PMID answers of the ID converter.
    idconv: HashMap<String, String>,
    /// DOI -> PMID answers of the alternate lookup.
    alternate: HashMap<String, String>,
    /// PMID -> payload; anything else is absent.
    annotations: HashMap<String, Value>,
    /// Preprint record returned by the bioRxiv details lookup.
    details: Option<PreprintRecord>,
    /// Preprint record returned by the medRxiv details lookup.
    medrxiv_details: Option<PreprintRecord>,
    /// Servers asked for details, in order.
    detail_servers: Mutex<Vec<Ecosystem>>,
    /// Artificial latency for annotation fetches.
    annotation_delay: Option<Duration>,
    convert_ok: bool,
}

impl Stub {
    fn log(&self, entry: impl Into<String>) {
        self.trace.lock().unwrap().push(entry.into());
    }

    fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }
}

#[async_trait]
impl PmidResolver for Stub {
    async fn resolve_to_pmid(
        &self,
        identifier: &Identifier,
        strategy: ResolveStrategy,
    ) -> FetchResult<String> {
        let doi = match identifier {
            Identifier::Pmid(p) => return Ok(p.clone()),
            Identifier::Doi(d) => d.clone(),
        };
        let published = self
            .details
            .as_ref()
            .and_then(|r| r.published_doi.clone());

        let (label, answers) = match strategy {
            ResolveStrategy::Preprint(Ecosystem::Biorxiv) => ("biorxiv-pmid", None),
            ResolveStrategy::Preprint(Ecosystem::Medrxiv) => ("medrxiv-pmid", None),
            ResolveStrategy::IdConverter if Some(&doi) == published.as_ref() => {
                ("published-doi-pmid", Some(&self.idconv))
            }
            ResolveStrategy::IdConverter => ("generic-pmid", Some(&self.idconv)),
            ResolveStrategy::Alternate => ("alternate-pmid", Some(&self.alternate)),
        };
        self.log(label);

        answers
            .and_then(|a| a.get(&doi).cloned())
            .ok_or_else(|| FetchError::Resolution(format!("{} has no PMID for {}", label, doi)))
    }

    async fn resolve_to_doi(&self, pmid: &str) -> FetchResult<String> {
        Err(FetchError::Resolution(pmid.to_string()))
    }
}

#[async_trait]
impl PreprintSource for Stub {
    async fn fetch_details(&self, doi: &str, ecosystem: Ecosystem) -> FetchResult<PreprintRecord> {
        self.log("details-lookup");
        self.detail_servers.lock().unwrap().push(ecosystem);
        let record = match ecosystem {
            Ecosystem::Biorxiv => &self.details,
            Ecosystem::Medrxiv => &self.medrxiv_details,
        };
        record
            .clone()
            .ok_or_else(|| FetchError::NotFound(doi.to_string()))
    }

    async fn search_pubmed_by_title(&self, title: &str) -> FetchResult<String> {
        Err(FetchError::NotFound(title.to_string()))
    }
}

#[async_trait]
impl AnnotationSource for Stub {
    async fn fetch_annotation(&self, pmid: &str) -> FetchResult<AnnotationDocument> {
        if let Some(delay) = self.annotation_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .annotations
            .get(pmid)
            .cloned()
            .map(AnnotationDocument::from_payload)
            .unwrap_or(AnnotationDocument::Absent))
    }
}

#[async_trait]
impl FallbackConverter for Stub {
    async fn convert(&self, source_url: &str, file_name: &str) -> FetchResult<ArtifactRef> {
        self.log("fallback-convert");
        if self.convert_ok {
            Ok(ArtifactRef {
                path: PathBuf::from(format!("/tmp/out/{}.html", file_name)),
                source_url: source_url.to_string(),
            })
        } else {
            Err(FetchError::Conversion("xsltproc failed".to_string()))
        }
    }
}

fn orchestrator(stub: Arc<Stub>) -> RetrievalOrchestrator {
    RetrievalOrchestrator::new(stub.clone(), stub.clone(), stub.clone(), stub)
}

fn preprint_record(published: Option<&str>) -> PreprintRecord {
    PreprintRecord {
        ecosystem: Ecosystem::Biorxiv,
        title: "Single-cell atlas of something".to_string(),
        source_doi: "10.1101/2020.01.01.900000".to_string(),
        jats_url: Some("https://www.biorxiv.org/content/900000.source.xml".to_string()),
        published_doi: published.map(str::to_string),
        status: "ok".to_string(),
    }
}

#[tokio::test]
async fn published_doi_resolves_through_id_converter() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([("10.1/abc".to_string(), "123".to_string())]),
        annotations: HashMap::from([("123".to_string(), json!([{"id": "a"}, {"id": "b"}]))]),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1/abc"]);

    let result = orchestrator(stub.clone()).resolve_published(&batch).await;

    assert!(result.unresolved.is_empty());
    assert_eq!(
        result.resolved["10.1/abc"].payload(),
        Some(&json!([{"id": "a"}, {"id": "b"}]))
    );
    assert_eq!(stub.trace(), vec!["generic-pmid"]);
}

#[tokio::test]
async fn empty_annotation_and_failed_alternate_is_unresolved() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([("10.1/abc".to_string(), "123".to_string())]),
        annotations: HashMap::from([("123".to_string(), json!([]))]),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1/abc"]);

    let result = orchestrator(stub.clone()).resolve_published(&batch).await;

    assert!(result.resolved.is_empty());
    assert_eq!(result.state_of("10.1/abc"), Some(KeyState::Unresolved));
    let failures = &result.unresolved["10.1/abc"];
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].strategy, Some(Strategy::Primary));
    assert!(matches!(failures[0].error, FetchError::NotFound(_)));
    assert_eq!(failures[1].strategy, Some(Strategy::Alternate));
    assert_eq!(stub.trace(), vec!["generic-pmid", "alternate-pmid"]);
}

#[tokio::test]
async fn empty_annotation_advances_to_alternate() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([("10.1/abc".to_string(), "123".to_string())]),
        alternate: HashMap::from([("10.1/abc".to_string(), "456".to_string())]),
        annotations: HashMap::from([
            ("123".to_string(), json!([])),
            ("456".to_string(), json!([{"id": "x"}])),
        ]),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["https://doi.org/10.1/abc"]);

    let result = orchestrator(stub).resolve_published(&batch).await;

    match &result.resolved["https://doi.org/10.1/abc"] {
        biocfetch::models::ResolvedDocument::Annotated { pmid, .. } => assert_eq!(pmid, "456"),
        other => panic!("unexpected document: {:?}", other),
    }
}

#[tokio::test]
async fn preprint_cascade_runs_in_order_to_fallback() {
    let stub = Arc::new(Stub {
        details: Some(preprint_record(Some("10.1038/published"))),
        convert_ok: true,
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["https://doi.org/10.1101/2020.01.01.900000"]);
    let key = batch.keys()[0].clone();

    let result = orchestrator(stub.clone()).resolve_preprint(&batch).await;

    assert_eq!(
        stub.trace(),
        vec![
            "biorxiv-pmid",
            "medrxiv-pmid",
            "generic-pmid",
            "details-lookup",
            "published-doi-pmid",
            "fallback-convert",
        ]
    );
    assert_eq!(result.state_of(&key), Some(KeyState::FallbackPending));
    match &result.resolved[&key] {
        biocfetch::models::ResolvedDocument::FallbackPending { artifact } => {
            assert_eq!(
                artifact.path,
                PathBuf::from("/tmp/out/10.1101_2020.01.01.900000.html")
            );
        }
        other => panic!("unexpected document: {:?}", other),
    }
}

#[tokio::test]
async fn published_version_of_preprint_is_annotated() {
    let stub = Arc::new(Stub {
        details: Some(preprint_record(Some("10.1038/published"))),
        idconv: HashMap::from([("10.1038/published".to_string(), "99".to_string())]),
        annotations: HashMap::from([("99".to_string(), json!([{"id": "99"}]))]),
        convert_ok: true,
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1101/2020.01.01.900000"]);

    let result = orchestrator(stub.clone()).resolve_preprint(&batch).await;

    assert_eq!(
        result.state_of("10.1101/2020.01.01.900000"),
        Some(KeyState::Annotated)
    );
    assert!(!stub.trace().contains(&"fallback-convert".to_string()));
}

#[tokio::test]
async fn failed_details_lookup_skips_to_unresolved() {
    let stub = Arc::new(Stub {
        convert_ok: true,
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1101/unknown"]);

    let result = orchestrator(stub.clone()).resolve_preprint(&batch).await;

    assert_eq!(result.state_of("10.1101/unknown"), Some(KeyState::Unresolved));
    // bioRxiv then medRxiv; the converter is never reached.
    let trace = stub.trace();
    assert_eq!(trace.iter().filter(|t| *t == "details-lookup").count(), 2);
    assert!(!trace.contains(&"fallback-convert".to_string()));
}

#[tokio::test]
async fn non_ok_biorxiv_status_falls_back_to_medrxiv_record() {
    let biorxiv = PreprintRecord {
        status: "error".to_string(),
        jats_url: Some("bio.xml".to_string()),
        ..preprint_record(None)
    };
    let medrxiv = PreprintRecord {
        ecosystem: Ecosystem::Medrxiv,
        jats_url: Some("med.xml".to_string()),
        ..preprint_record(None)
    };
    let stub = Arc::new(Stub {
        details: Some(biorxiv),
        medrxiv_details: Some(medrxiv),
        convert_ok: true,
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1101/2020.01.01.900000"]);

    let result = orchestrator(stub.clone()).resolve_preprint(&batch).await;

    assert_eq!(
        *stub.detail_servers.lock().unwrap(),
        vec![Ecosystem::Biorxiv, Ecosystem::Medrxiv]
    );
    match &result.resolved["10.1101/2020.01.01.900000"] {
        biocfetch::models::ResolvedDocument::FallbackPending { artifact } => {
            assert_eq!(artifact.source_url, "med.xml");
        }
        other => panic!("unexpected document: {:?}", other),
    }
}

#[tokio::test]
async fn partition_is_total_and_independent_of_worker_count() {
    let keys: Vec<String> = (0..40).map(|i| format!("10.1/k{}", i)).collect();
    let make_stub = || {
        Arc::new(Stub {
            idconv: keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), i.to_string()))
                .collect(),
            annotations: (0..40)
                .filter(|i| i % 3 == 0)
                .map(|i| (i.to_string(), json!([{"id": i}])))
                .collect(),
            ..Default::default()
        })
    };
    let batch = ResolutionBatch::new(&keys);

    let serial = orchestrator(make_stub())
        .with_options(OrchestratorOptions {
            workers: 1,
            ..Default::default()
        })
        .resolve_published(&batch)
        .await;
    let parallel = orchestrator(make_stub())
        .with_options(OrchestratorOptions {
            workers: 8,
            ..Default::default()
        })
        .resolve_published(&batch)
        .await;

    assert!(serial.is_partition_of(&batch));
    assert!(parallel.is_partition_of(&batch));
    assert_eq!(serial, parallel);
    assert_eq!(serial.resolved.len(), 14);
}

#[tokio::test]
async fn rerun_only_unresolved_keys() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([("10.1/a".to_string(), "1".to_string())]),
        annotations: HashMap::from([("1".to_string(), json!([{"id": 1}]))]),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1/a", "10.1/b"]);
    let result = orchestrator(stub).resolve_published(&batch).await;

    let retry = batch.without_resolved(&result);
    assert_eq!(retry.keys(), &["10.1/b"]);
}

#[tokio::test(start_paused = true)]
async fn slow_key_times_out() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([("10.1/slow".to_string(), "5".to_string())]),
        annotations: HashMap::from([("5".to_string(), json!([{"id": 5}]))]),
        annotation_delay: Some(Duration::from_secs(60)),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1/slow"]);

    let result = orchestrator(stub)
        .with_options(OrchestratorOptions {
            workers: 1,
            key_timeout: Duration::from_secs(5),
        })
        .resolve_published(&batch)
        .await;

    let failures = &result.unresolved["10.1/slow"];
    assert_eq!(
        failures.last().map(|f| &f.error),
        Some(&FetchError::Timeout(Duration::from_secs(5)))
    );
}

#[tokio::test(start_paused = true)]
async fn cancellation_returns_partial_partition() {
    let stub = Arc::new(Stub {
        idconv: HashMap::from([
            ("10.1/a".to_string(), "1".to_string()),
            ("10.1/b".to_string(), "2".to_string()),
            ("10.1/c".to_string(), "3".to_string()),
        ]),
        annotations: HashMap::from([("1".to_string(), json!([{"id": 1}]))]),
        annotation_delay: Some(Duration::from_secs(3600)),
        ..Default::default()
    });
    let batch = ResolutionBatch::new(["10.1/a", "10.1/b", "10.1/c"]);
    let (handle, token) = cancel_pair();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });

    let result = orchestrator(stub)
        .with_options(OrchestratorOptions {
            workers: 1,
            key_timeout: Duration::from_secs(7200),
        })
        .resolve_published_with_cancel(&batch, token)
        .await;

    assert!(result.is_partition_of(&batch));
    assert!(result.resolved.is_empty());
    for key in batch.keys() {
        let failures = &result.unresolved[key];
        assert_eq!(failures.last().map(|f| &f.error), Some(&FetchError::Cancelled));
    }
}
