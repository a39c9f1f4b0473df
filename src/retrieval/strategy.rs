//! Retrieval strategies and the two cascades built from them.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::FetchError;
use crate::models::Ecosystem;

/// One step of a retrieval cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Key as PMID (PMID batches) or ID-converter PMID, then annotation.
    Primary,
    /// Independent DOI lookup, then annotation.
    Alternate,
    /// Preprint details on one server, title search, then annotation.
    PreprintPmid(Ecosystem),
    /// Fetch the preprint record (bioRxiv first, medRxiv second).
    DetailsLookup,
    /// Published journal DOI through the ID converter, then annotation.
    PublishedDoiPmid,
    /// Convert the JATS source document.
    JatsFallback,
}

const PUBLISHED: &[Strategy] = &[Strategy::Primary, Strategy::Alternate];

const PUBLISHED_PMIDS: &[Strategy] = &[Strategy::Primary];

const PREPRINT: &[Strategy] = &[
    Strategy::PreprintPmid(Ecosystem::Biorxiv),
    Strategy::PreprintPmid(Ecosystem::Medrxiv),
    Strategy::Primary,
    Strategy::DetailsLookup,
    Strategy::PublishedDoiPmid,
    Strategy::JatsFallback,
];

impl Strategy {
    /// Cascade for published articles. The alternate lookup only applies to
    /// DOIs.
    pub fn published(identifiers_are_pmids: bool) -> &'static [Strategy] {
        if identifiers_are_pmids {
            PUBLISHED_PMIDS
        } else {
            PUBLISHED
        }
    }

    /// Cascade for preprints.
    pub fn preprint() -> &'static [Strategy] {
        PREPRINT
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Primary => "primary-pmid",
            Strategy::Alternate => "alternate-pmid",
            Strategy::PreprintPmid(Ecosystem::Biorxiv) => "biorxiv-pmid",
            Strategy::PreprintPmid(Ecosystem::Medrxiv) => "medrxiv-pmid",
            Strategy::DetailsLookup => "details-lookup",
            Strategy::PublishedDoiPmid => "published-doi-pmid",
            Strategy::JatsFallback => "fallback-convert",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Why a key did not resolve at one step.
///
/// `strategy` is `None` for batch-level outcomes (timeouts, cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyFailure {
    pub strategy: Option<Strategy>,
    #[serde(rename = "reason", serialize_with = "serialize_display")]
    pub error: FetchError,
}

impl StrategyFailure {
    pub fn new(strategy: Strategy, error: FetchError) -> Self {
        Self {
            strategy: Some(strategy),
            error,
        }
    }

    pub fn batch(error: FetchError) -> Self {
        Self {
            strategy: None,
            error,
        }
    }
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy {
            Some(strategy) => write!(f, "{}: {}", strategy, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}
