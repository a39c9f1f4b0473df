//! Shared helper functions for CLI commands.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ResolvedDocument;
use crate::rate_limit::{ClassStats, ServiceClass};
use crate::retrieval::{ResolutionResult, StrategyFailure};

/// Parse identifier lines: one per line, blank lines and `#` comments
/// skipped, trailing comments stripped.
pub fn parse_identifier_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Identifiers from positional arguments followed by those in `input`.
pub async fn collect_identifiers(args: &[String], input: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let mut ids: Vec<String> = args.to_vec();
    if let Some(path) = input {
        let text = if path == Path::new("-") {
            let mut buf = String::new();
            tokio::io::AsyncReadExt::read_to_string(&mut tokio::io::stdin(), &mut buf).await?;
            buf
        } else {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?
        };
        ids.extend(parse_identifier_lines(&text));
    }
    Ok(ids)
}

/// Rate limiter usage for one service class.
#[derive(Debug, Serialize)]
pub struct ClassUsage {
    pub requests: u64,
}

/// JSON report written after a batch run.
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub mode: &'a str,
    pub resolved: &'a BTreeMap<String, ResolvedDocument>,
    pub unresolved: &'a BTreeMap<String, Vec<StrategyFailure>>,
    pub requests: BTreeMap<String, ClassUsage>,
}

impl<'a> BatchReport<'a> {
    pub fn new(
        mode: &'a str,
        result: &'a ResolutionResult,
        stats: BTreeMap<ServiceClass, ClassStats>,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            mode,
            resolved: &result.resolved,
            unresolved: &result.unresolved,
            requests: stats
                .into_iter()
                .map(|(class, s)| {
                    (
                        class.to_string(),
                        ClassUsage {
                            requests: s.total_requests,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Write `value` as pretty JSON to `output`, or stdout when `None`.
pub async fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_identifier_lines() {
        let text = "# header\n10.1/a\n\n  10.1/b  # trailing\n#10.1/c\n";
        assert_eq!(parse_identifier_lines(text), vec!["10.1/a", "10.1/b"]);
    }

    #[tokio::test]
    async fn test_collect_identifiers_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "10.1/b\n10.1/c\n").unwrap();

        let ids = collect_identifiers(&["10.1/a".to_string()], Some(&path))
            .await
            .unwrap();
        assert_eq!(ids, vec!["10.1/a", "10.1/b", "10.1/c"]);
    }

    #[tokio::test]
    async fn test_write_json_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports/out.json");
        let result = ResolutionResult::default();
        let report = BatchReport::new("published", &result, BTreeMap::new());

        write_json(&report, Some(&path)).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mode"], "published");
        assert!(value["resolved"].as_object().unwrap().is_empty());
    }
}
