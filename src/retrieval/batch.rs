//! Batch input and the resolved/unresolved partition.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::strategy::StrategyFailure;
use crate::models::{Identifier, ResolvedDocument};

/// Ordered set of unique identifiers submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionBatch {
    keys: Vec<String>,
    identifiers_are_pmids: bool,
}

impl ResolutionBatch {
    /// A batch of DOIs. Blank and repeated keys are dropped; the first
    /// occurrence keeps its position.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(keys, false)
    }

    /// A batch whose keys are already PMIDs.
    pub fn pmids<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(keys, true)
    }

    fn build<I, S>(keys: I, identifiers_are_pmids: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        Self {
            keys,
            identifiers_are_pmids,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn identifiers_are_pmids(&self) -> bool {
        self.identifiers_are_pmids
    }

    /// Identifier for a key of this batch.
    pub fn identifier(&self, key: &str) -> Identifier {
        Identifier::from_key(key, self.identifiers_are_pmids)
    }

    /// The keys of this batch that `result` did not resolve, for a re-run.
    pub fn without_resolved(&self, result: &ResolutionResult) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .filter(|k| !result.resolved.contains_key(*k))
                .cloned()
                .collect(),
            identifiers_are_pmids: self.identifiers_are_pmids,
        }
    }
}

/// Terminal state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Annotated,
    FallbackPending,
    Unresolved,
}

/// Partition of a batch into resolved documents and unresolved keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub resolved: BTreeMap<String, ResolvedDocument>,
    /// Failure reasons per key, in the order the strategies ran.
    pub unresolved: BTreeMap<String, Vec<StrategyFailure>>,
}

impl ResolutionResult {
    pub fn state_of(&self, key: &str) -> Option<KeyState> {
        if let Some(doc) = self.resolved.get(key) {
            Some(if doc.is_fallback() {
                KeyState::FallbackPending
            } else {
                KeyState::Annotated
            })
        } else if self.unresolved.contains_key(key) {
            Some(KeyState::Unresolved)
        } else {
            None
        }
    }

    /// Whether every key of `batch` is in exactly one map and no other keys
    /// are present.
    pub fn is_partition_of(&self, batch: &ResolutionBatch) -> bool {
        let keys_ok = batch.keys().iter().all(|k| {
            self.resolved.contains_key(k) != self.unresolved.contains_key(k)
        });
        keys_ok && self.resolved.len() + self.unresolved.len() == batch.len()
    }

    pub fn fallback_count(&self) -> usize {
        self.resolved.values().filter(|d| d.is_fallback()).count()
    }

    pub(crate) fn record(&mut self, key: String, outcome: Result<ResolvedDocument, Vec<StrategyFailure>>) {
        match outcome {
            Ok(doc) => {
                self.unresolved.remove(&key);
                self.resolved.insert(key, doc);
            }
            Err(failures) => {
                self.resolved.remove(&key);
                self.unresolved.insert(key, failures);
            }
        }
    }
}
