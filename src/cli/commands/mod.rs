//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod batch;
mod config_cmd;
mod lookup;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::load_settings;
use crate::models::Ecosystem;
use crate::services::ResolveStrategy;

#[derive(Parser)]
#[command(name = "biocfetch")]
#[command(about = "Resolve publication identifiers and fetch BioC annotation documents")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Identifier input and report output shared by the batch commands.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Identifiers to resolve
    ids: Vec<String>,
    /// File with one identifier per line (`-` for stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Number of concurrent workers (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Seconds allowed per identifier (overrides config)
    #[arg(long)]
    key_timeout: Option<u64>,
    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// PMID lookup backend for the `pmid` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Via {
    /// PMC ID converter
    #[default]
    IdConverter,
    /// E-utilities DOI search
    Alternate,
    /// bioRxiv details and title search
    Biorxiv,
    /// medRxiv details and title search
    Medrxiv,
}

impl From<Via> for ResolveStrategy {
    fn from(via: Via) -> Self {
        match via {
            Via::IdConverter => ResolveStrategy::IdConverter,
            Via::Alternate => ResolveStrategy::Alternate,
            Via::Biorxiv => ResolveStrategy::Preprint(Ecosystem::Biorxiv),
            Via::Medrxiv => ResolveStrategy::Preprint(Ecosystem::Medrxiv),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch annotations for published articles (DOIs, or PMIDs with --pmids)
    Published {
        #[command(flatten)]
        batch: BatchArgs,
        /// Identifiers are PMIDs rather than DOIs
        #[arg(long)]
        pmids: bool,
    },

    /// Fetch annotations for preprint DOIs, converting JATS when none exist
    Preprint {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Resolve a DOI to a PMID
    Pmid {
        doi: String,
        /// Lookup backend
        #[arg(long, value_enum, default_value = "id-converter")]
        via: Via,
    },

    /// Look up the DOI of a PMID
    Doi { pmid: String },

    /// Show preprint details for a DOI
    Details {
        doi: String,
        /// Preprint server (tries bioRxiv then medRxiv when omitted)
        #[arg(long)]
        server: Option<Ecosystem>,
    },

    /// Show title and first author for a PMID
    Summary { pmid: String },

    /// Print the local file name derived from a DOI or link
    Filename { link: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print the path of the config file in use
    Path,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Published { batch, pmids } => {
            batch::cmd_published(&settings, batch, pmids).await
        }
        Commands::Preprint { batch } => batch::cmd_preprint(&settings, batch).await,
        Commands::Pmid { doi, via } => lookup::cmd_pmid(&settings, &doi, via.into()).await,
        Commands::Doi { pmid } => lookup::cmd_doi(&settings, &pmid).await,
        Commands::Details { doi, server } => lookup::cmd_details(&settings, &doi, server).await,
        Commands::Summary { pmid } => lookup::cmd_summary(&settings, &pmid).await,
        Commands::Filename { link } => {
            lookup::cmd_filename(&link);
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings, &config),
            ConfigCommands::Path => {
                config_cmd::cmd_config_path(&config);
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_published_batch() {
        let cli = Cli::try_parse_from([
            "biocfetch", "published", "--pmids", "-w", "2", "-i", "ids.txt", "123", "456",
        ])
        .unwrap();
        match cli.command {
            Commands::Published { batch, pmids } => {
                assert!(pmids);
                assert_eq!(batch.ids, vec!["123", "456"]);
                assert_eq!(batch.workers, Some(2));
                assert_eq!(batch.input, Some(PathBuf::from("ids.txt")));
            }
            _ => panic!("expected published"),
        }
    }

    #[test]
    fn test_parse_pmid_via() {
        let cli = Cli::try_parse_from(["biocfetch", "pmid", "10.1/x", "--via", "medrxiv"]).unwrap();
        match cli.command {
            Commands::Pmid { via, .. } => assert_eq!(
                ResolveStrategy::from(via),
                ResolveStrategy::Preprint(Ecosystem::Medrxiv)
            ),
            _ => panic!("expected pmid"),
        }
    }
}
