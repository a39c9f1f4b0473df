//! JATS to HTML conversion through `xsltproc`.
//!
//! Used when a preprint has no annotation: the raw JATS XML is downloaded
//! and transformed with a local stylesheet so it can be annotated later.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::traits::FallbackConverter;
use crate::error::{FetchError, FetchResult};
use crate::http_client::HttpClient;
use crate::models::ArtifactRef;
use crate::rate_limit::ServiceClass;

const XSLTPROC: &str = "xsltproc";

/// Converts JATS source documents into HTML artifacts.
#[derive(Clone)]
pub struct XsltConverter {
    http: HttpClient,
    stylesheet: PathBuf,
    output_dir: PathBuf,
    xsltproc: Option<PathBuf>,
}

impl XsltConverter {
    /// Create a converter, locating `xsltproc` on `PATH`.
    pub fn new(http: HttpClient, stylesheet: PathBuf, output_dir: PathBuf) -> Self {
        let xsltproc = which::which(XSLTPROC).ok();
        if xsltproc.is_none() {
            debug!("{} not found on PATH; fallback conversion disabled", XSLTPROC);
        }
        Self {
            http,
            stylesheet,
            output_dir,
            xsltproc,
        }
    }

    /// Use a specific `xsltproc` binary.
    pub fn with_xsltproc(mut self, path: impl Into<PathBuf>) -> Self {
        self.xsltproc = Some(path.into());
        self
    }

    /// Check that the stylesheet and the binary are both available.
    pub fn is_available(&self) -> bool {
        self.stylesheet.is_file() && self.xsltproc.is_some()
    }

    fn binary(&self) -> FetchResult<&Path> {
        if !self.stylesheet.is_file() {
            return Err(FetchError::Conversion(format!(
                "stylesheet not found: {}",
                self.stylesheet.display()
            )));
        }
        self.xsltproc.as_deref().ok_or_else(|| {
            FetchError::Conversion(format!(
                "{} not found. Install libxslt (e.g. apt install xsltproc)",
                XSLTPROC
            ))
        })
    }

    async fn run_xsltproc(&self, binary: &Path, input: &Path, output: &Path) -> FetchResult<()> {
        let result = Command::new(binary)
            .arg("-o")
            .arg(output)
            .arg(&self.stylesheet)
            .arg(input)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                Err(FetchError::Conversion(format!(
                    "{} failed: {}",
                    XSLTPROC,
                    stderr.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::Conversion(
                format!("{} not found at {}", XSLTPROC, binary.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FallbackConverter for XsltConverter {
    async fn convert(&self, source_url: &str, file_name: &str) -> FetchResult<ArtifactRef> {
        let binary = self.binary()?.to_path_buf();

        let source = self.http.get_bytes(ServiceClass::JatsSource, source_url).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let mut input = tempfile::Builder::new()
            .prefix("jats-")
            .suffix(".xml")
            .tempfile()?;
        input.write_all(&source)?;
        input.flush()?;

        let output = self.output_dir.join(format!("{}.html", file_name));
        self.run_xsltproc(&binary, input.path(), &output).await?;

        info!("Converted {} to {}", source_url, output.display());
        Ok(ArtifactRef {
            path: output,
            source_url: source_url.to_string(),
        })
    }
}
