//! Preprint ecosystems and metadata records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::identifier::normalize_doi;

/// Status string the preprint services report for a successful lookup.
pub const STATUS_OK: &str = "ok";

/// One of the two preprint-hosting services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Biorxiv,
    Medrxiv,
}

impl Ecosystem {
    /// Path segment used by the details API (`/details/{server}/...`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Biorxiv => "biorxiv",
            Ecosystem::Medrxiv => "medrxiv",
        }
    }

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            Ecosystem::Biorxiv => "bioRxiv",
            Ecosystem::Medrxiv => "medRxiv",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "biorxiv" => Ok(Ecosystem::Biorxiv),
            "medrxiv" => Ok(Ecosystem::Medrxiv),
            other => Err(format!("unknown preprint server: {}", other)),
        }
    }
}

/// Metadata for one preprint, taken from the first collection entry of a
/// details response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprintRecord {
    pub ecosystem: Ecosystem,
    pub title: String,
    /// DOI of the preprint itself.
    pub source_doi: String,
    /// URL of the JATS XML source document.
    pub jats_url: Option<String>,
    /// DOI of the journal version, when the preprint has been published.
    pub published_doi: Option<String>,
    /// Status from the first `messages` entry.
    pub status: String,
}

impl PreprintRecord {
    /// Whether the service reported an `ok` status.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// The published DOI, if the preprint has since been formally published.
    pub fn published_doi(&self) -> Option<&str> {
        self.published_doi.as_deref()
    }
}

/// Normalize a `published` field: the services report `NA` for preprints
/// that have not been published.
pub fn published_doi_from_field(field: Option<&str>) -> Option<String> {
    let value = normalize_doi(field?);
    if value.is_empty() || value.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Title and first author for a PubMed article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub pmid: String,
    pub title: String,
    pub first_author: Option<String>,
}
