//! Rate limiter configuration and types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A category of external endpoint sharing one call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceClass {
    /// BioC annotation endpoint.
    Annotation,
    /// PMC ID-conversion endpoint (DOI -> PMID).
    IdConversion,
    /// bioRxiv / medRxiv details endpoint.
    PreprintDetails,
    /// PMID -> DOI lookup.
    ReverseDoi,
    /// E-utilities title search.
    TitleSearch,
    /// E-utilities DOI term search (alternate resolver).
    AlternateLookup,
    /// E-utilities article summary.
    ArticleSummary,
    /// Raw JATS source downloads.
    JatsSource,
}

impl ServiceClass {
    pub const ALL: [ServiceClass; 8] = [
        ServiceClass::Annotation,
        ServiceClass::IdConversion,
        ServiceClass::PreprintDetails,
        ServiceClass::ReverseDoi,
        ServiceClass::TitleSearch,
        ServiceClass::AlternateLookup,
        ServiceClass::ArticleSummary,
        ServiceClass::JatsSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::Annotation => "annotation",
            ServiceClass::IdConversion => "id-conversion",
            ServiceClass::PreprintDetails => "preprint-details",
            ServiceClass::ReverseDoi => "reverse-doi",
            ServiceClass::TitleSearch => "title-search",
            ServiceClass::AlternateLookup => "alternate-lookup",
            ServiceClass::ArticleSummary => "article-summary",
            ServiceClass::JatsSource => "jats-source",
        }
    }

    /// Budget observed for the public NCBI and preprint services.
    pub fn default_budget(&self) -> CallBudget {
        match self {
            ServiceClass::PreprintDetails | ServiceClass::JatsSource => CallBudget::per_second(1),
            _ => CallBudget::per_second(3),
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('_', "-").to_ascii_lowercase();
        ServiceClass::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown service class: {}", s))
    }
}

/// At most `calls` dispatches within any trailing `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    pub calls: u32,
    pub period: Duration,
}

impl CallBudget {
    pub fn new(calls: u32, period: Duration) -> Self {
        Self {
            calls: calls.max(1),
            period,
        }
    }

    pub fn per_second(calls: u32) -> Self {
        Self::new(calls, Duration::from_secs(1))
    }
}

/// Configuration for rate limiting behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Budgets that differ from [`ServiceClass::default_budget`].
    pub overrides: HashMap<ServiceClass, CallBudget>,
}

impl RateLimitConfig {
    /// Effective budget for a service class.
    pub fn budget(&self, class: ServiceClass) -> CallBudget {
        self.overrides
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_budget())
    }

    /// Override the budget for one class.
    pub fn with_budget(mut self, class: ServiceClass, budget: CallBudget) -> Self {
        self.overrides.insert(class, budget);
        self
    }
}

/// Statistics for a service class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassStats {
    /// Dispatches granted since the limiter was created.
    pub total_requests: u64,
    /// Dispatches still inside the trailing window (including reserved ones).
    pub in_window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        assert_eq!(ServiceClass::Annotation.default_budget(), CallBudget::per_second(3));
        assert_eq!(ServiceClass::IdConversion.default_budget(), CallBudget::per_second(3));
        assert_eq!(ServiceClass::ReverseDoi.default_budget(), CallBudget::per_second(3));
        assert_eq!(
            ServiceClass::PreprintDetails.default_budget(),
            CallBudget::per_second(1)
        );
    }

    #[test]
    fn test_override_budget() {
        let config = RateLimitConfig::default()
            .with_budget(ServiceClass::Annotation, CallBudget::per_second(10));
        assert_eq!(config.budget(ServiceClass::Annotation).calls, 10);
        assert_eq!(config.budget(ServiceClass::IdConversion).calls, 3);
    }

    #[test]
    fn test_zero_calls_clamped() {
        assert_eq!(CallBudget::per_second(0).calls, 1);
    }

    #[test]
    fn test_service_class_parse() {
        assert_eq!(
            "preprint_details".parse::<ServiceClass>().unwrap(),
            ServiceClass::PreprintDetails
        );
        assert_eq!(
            "id-conversion".parse::<ServiceClass>().unwrap(),
            ServiceClass::IdConversion
        );
        assert!("nope".parse::<ServiceClass>().is_err());
    }
}
