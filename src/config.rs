//! Configuration management for biocfetch using the prefer crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FetchResult;
use crate::http_client::{resolve_user_agent, HttpClient};
use crate::rate_limit::{CallBudget, RateLimitConfig, RateLimiter, ServiceClass};
use crate::retrieval::{OrchestratorOptions, DEFAULT_KEY_TIMEOUT, DEFAULT_WORKERS};
use crate::services::{Endpoints, NcbiIdentity, ServiceClients};

/// Name used for config discovery (`biocfetch.toml`, `biocfetch.yaml`, ...).
pub const CONFIG_NAME: &str = "biocfetch";

/// Default stylesheet filename, looked up in the data directory.
const DEFAULT_STYLESHEET: &str = "jats-to-html.xsl";

/// Default subdirectory for converted documents.
const CONVERTED_SUBDIR: &str = "converted";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Service base URLs.
    pub endpoints: Endpoints,
    /// Tool name and contact email sent to NCBI.
    pub identity: NcbiIdentity,
    /// Custom user agent (None = default with contact email).
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Concurrent workers per batch.
    pub workers: usize,
    /// Time budget per identifier in seconds.
    pub key_timeout: u64,
    /// Per-class call budgets.
    pub rate_limits: RateLimitConfig,
    /// Where converted JATS documents are written.
    pub output_dir: PathBuf,
    /// XSLT stylesheet for JATS conversion.
    pub stylesheet: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_NAME);

        Self {
            output_dir: data_dir.join(CONVERTED_SUBDIR),
            stylesheet: data_dir.join(DEFAULT_STYLESHEET),
            data_dir,
            endpoints: Endpoints::default(),
            identity: NcbiIdentity::default(),
            user_agent: None,
            request_timeout: 30,
            workers: DEFAULT_WORKERS,
            key_timeout: DEFAULT_KEY_TIMEOUT.as_secs(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl Settings {
    /// Effective user agent string.
    pub fn user_agent(&self) -> String {
        resolve_user_agent(self.user_agent.as_deref(), self.identity.email.as_deref())
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            workers: self.workers.max(1),
            key_timeout: Duration::from_secs(self.key_timeout.max(1)),
        }
    }

    /// Build the service clients over one shared rate limiter.
    pub fn clients(&self) -> FetchResult<ServiceClients> {
        let limiter = RateLimiter::new(self.rate_limits.clone());
        let http = HttpClient::with_user_agent(
            Duration::from_secs(self.request_timeout),
            limiter,
            &self.user_agent(),
        )?;
        Ok(ServiceClients::new(
            http,
            &self.endpoints,
            self.identity.clone(),
            self.stylesheet.clone(),
            self.output_dir.clone(),
        ))
    }
}

/// Service base URL overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct EndpointsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_converter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eutils: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biorxiv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medrxiv: Option<String>,
}

impl EndpointsConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, endpoints: &mut Endpoints) {
        let fields = [
            (&self.annotation, &mut endpoints.annotation),
            (&self.id_converter, &mut endpoints.id_converter),
            (&self.eutils, &mut endpoints.eutils),
            (&self.biorxiv, &mut endpoints.biorxiv),
            (&self.medrxiv, &mut endpoints.medrxiv),
        ];
        for (value, target) in fields {
            let Some(url) = value else { continue };
            match url::Url::parse(url) {
                Ok(_) => *target = url.clone(),
                Err(e) => warn!("Ignoring invalid endpoint {:?}: {}", url, e),
            }
        }
    }
}

/// Budget override for one service class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, prefer::FromValue)]
pub struct RateLimitOverride {
    /// Calls allowed per period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calls: Option<u64>,
    /// Window length in milliseconds (default 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_ms: Option<u64>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Contact email for NCBI E-utilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Tool name reported to NCBI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Concurrent workers per batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<u64>,
    /// Per-identifier time budget in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_timeout: Option<u64>,
    /// Output directory for converted documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// XSLT stylesheet for JATS conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    /// Service base URLs.
    #[serde(default, skip_serializing_if = "EndpointsConfig::is_default")]
    #[prefer(default)]
    pub endpoints: EndpointsConfig,
    /// Rate limit overrides keyed by service class (`annotation`,
    /// `preprint-details`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    #[prefer(default)]
    pub rate_limits: HashMap<String, RateLimitOverride>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers biocfetch config files in standard locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Ignoring config {}: {:#}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => {
                // No config file found
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).context("Failed to parse TOML config")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
            }
            _ => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Rate limit overrides with recognised class names.
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::default();
        for (name, value) in &self.rate_limits {
            let class: ServiceClass = match name.parse() {
                Ok(class) => class,
                Err(e) => {
                    warn!("Ignoring rate limit override: {}", e);
                    continue;
                }
            };
            let default = class.default_budget();
            let calls = value
                .calls
                .map(|c| u32::try_from(c).unwrap_or(u32::MAX))
                .unwrap_or(default.calls);
            let period = value
                .period_ms
                .map(Duration::from_millis)
                .unwrap_or(default.period);
            config = config.with_budget(class, CallBudget::new(calls, period));
        }
        config
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.output_dir = settings.data_dir.join(CONVERTED_SUBDIR);
            settings.stylesheet = settings.data_dir.join(DEFAULT_STYLESHEET);
        }
        if let Some(ref email) = self.email {
            settings.identity.email = Some(email.clone());
        }
        if let Some(ref tool) = self.tool {
            settings.identity.tool = tool.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(workers) = self.workers {
            settings.workers = usize::try_from(workers).unwrap_or(DEFAULT_WORKERS);
        }
        if let Some(timeout) = self.key_timeout {
            settings.key_timeout = timeout;
        }
        if let Some(ref output_dir) = self.output_dir {
            settings.output_dir = self.resolve_path(output_dir, base_dir);
        }
        if let Some(ref stylesheet) = self.stylesheet {
            settings.stylesheet = self.resolve_path(stylesheet, base_dir);
        }
        self.endpoints.apply(&mut settings.endpoints);
        if !self.rate_limits.is_empty() {
            settings.rate_limits = self.rate_limit_config();
        }
    }
}

/// Load settings from an explicit config path, or discover one.
/// Returns (Settings, Config) tuple.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config)> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    // NCBI_EMAIL environment variable takes precedence over config
    if let Some(email) = std::env::var("NCBI_EMAIL").ok().filter(|s| !s.is_empty()) {
        debug!("Using NCBI_EMAIL from environment: {}", email);
        settings.identity.email = Some(email);
    }

    // BIOCFETCH_OUTPUT_DIR overrides the converted document directory
    if let Some(dir) = std::env::var("BIOCFETCH_OUTPUT_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        debug!("Using BIOCFETCH_OUTPUT_DIR from environment: {}", dir);
        settings.output_dir = config.resolve_path(&dir, &base_dir);
    }

    Ok((settings, config))
}
