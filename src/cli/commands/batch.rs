//! Batch commands: published and preprint resolution.

use console::style;
use tokio::sync::mpsc;

use super::BatchArgs;
use crate::cli::helpers::{collect_identifiers, write_json, BatchReport};
use crate::cli::icons::{dim_arrow, info, success, warn};
use crate::cli::progress::spawn_progress;
use crate::config::Settings;
use crate::retrieval::{ResolutionBatch, ResolutionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Published,
    Preprint,
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Published => "published",
            Mode::Preprint => "preprint",
        }
    }
}

/// Resolve published articles.
pub async fn cmd_published(settings: &Settings, args: BatchArgs, pmids: bool) -> anyhow::Result<()> {
    let ids = collect_identifiers(&args.ids, args.input.as_deref()).await?;
    let batch = if pmids {
        ResolutionBatch::pmids(&ids)
    } else {
        ResolutionBatch::new(&ids)
    };
    run_batch(settings, args, batch, Mode::Published).await
}

/// Resolve preprints.
pub async fn cmd_preprint(settings: &Settings, args: BatchArgs) -> anyhow::Result<()> {
    let ids = collect_identifiers(&args.ids, args.input.as_deref()).await?;
    run_batch(settings, args, ResolutionBatch::new(&ids), Mode::Preprint).await
}

async fn run_batch(
    settings: &Settings,
    args: BatchArgs,
    batch: ResolutionBatch,
    mode: Mode,
) -> anyhow::Result<()> {
    if batch.is_empty() {
        anyhow::bail!("No identifiers given. Pass them as arguments or with --input.");
    }

    let mut options = settings.orchestrator_options();
    if let Some(workers) = args.workers {
        options.workers = workers.max(1);
    }
    if let Some(secs) = args.key_timeout {
        options.key_timeout = std::time::Duration::from_secs(secs.max(1));
    }

    eprintln!(
        "{} Resolving {} {} identifiers using {} workers",
        info(),
        batch.len(),
        mode.as_str(),
        options.workers
    );

    let clients = settings.clients()?;
    if mode == Mode::Preprint && !clients.converter.is_available() {
        eprintln!(
            "  {} JATS conversion unavailable (needs xsltproc and {})",
            warn(),
            settings.stylesheet.display()
        );
    }

    let (tx, rx) = mpsc::channel::<ResolutionEvent>(100);
    let progress = spawn_progress(batch.len() as u64, rx);
    let orchestrator = clients.orchestrator(options).with_events(tx);

    let result = match mode {
        Mode::Published => orchestrator.resolve_published(&batch).await,
        Mode::Preprint => orchestrator.resolve_preprint(&batch).await,
    };
    // Close the event channel so the progress task can finish.
    drop(orchestrator);
    let tally = progress.await?;

    let stats = clients.request_stats().await;
    let report = BatchReport::new(mode.as_str(), &result, stats);
    write_json(&report, args.output.as_deref()).await?;

    eprintln!(
        "{} {} annotated, {} converted, {} unresolved",
        success(),
        tally.annotated,
        tally.fallback,
        tally.unresolved
    );
    if let Some(ref path) = args.output {
        eprintln!("  {} Report: {}", dim_arrow(), path.display());
    }
    if !result.unresolved.is_empty() {
        eprintln!(
            "  {} {} identifiers can be retried",
            style("↻").yellow(),
            batch.without_resolved(&result).len()
        );
    }

    Ok(())
}
