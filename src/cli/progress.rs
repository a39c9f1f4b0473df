//! Progress display for batch runs, fed by orchestrator events.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::retrieval::ResolutionEvent;

/// Tally of a finished batch as seen through its events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub annotated: usize,
    pub fallback: usize,
    pub unresolved: usize,
}

impl BatchTally {
    fn record(&mut self, event: &ResolutionEvent) -> bool {
        match event {
            ResolutionEvent::Started { .. } => return false,
            ResolutionEvent::Resolved { fallback: true, .. } => self.fallback += 1,
            ResolutionEvent::Resolved { .. } => self.annotated += 1,
            ResolutionEvent::Unresolved { .. } => self.unresolved += 1,
        }
        true
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Drive a progress bar from `rx` until every sender is dropped.
pub fn spawn_progress(total: u64, mut rx: mpsc::Receiver<ResolutionEvent>) -> JoinHandle<BatchTally> {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());

    tokio::spawn(async move {
        let mut tally = BatchTally::default();
        while let Some(event) = rx.recv().await {
            if let ResolutionEvent::Started { ref key, .. } = event {
                pb.set_message(key.clone());
            }
            if tally.record(&event) {
                pb.inc(1);
            }
        }
        pb.finish_and_clear();
        tally
    })
}
