//! Single-identifier lookups.

use console::style;

use crate::cli::helpers::write_json;
use crate::cli::icons::dim_arrow;
use crate::config::Settings;
use crate::models::{link_file_name, Ecosystem, Identifier, PreprintRecord};
use crate::services::{PmidResolver, PreprintMetadataClient, PreprintSource, ResolveStrategy};

/// Resolve a DOI to a PMID.
pub async fn cmd_pmid(settings: &Settings, doi: &str, strategy: ResolveStrategy) -> anyhow::Result<()> {
    let clients = settings.clients()?;
    let pmid = clients
        .resolver
        .resolve_to_pmid(&Identifier::doi(doi), strategy)
        .await?;
    println!("{}", pmid);
    Ok(())
}

/// Look up the DOI of a PMID.
pub async fn cmd_doi(settings: &Settings, pmid: &str) -> anyhow::Result<()> {
    let clients = settings.clients()?;
    let doi = clients.resolver.resolve_to_doi(pmid).await?;
    println!("{}", doi);
    Ok(())
}

/// Show preprint details.
pub async fn cmd_details(
    settings: &Settings,
    doi: &str,
    server: Option<Ecosystem>,
) -> anyhow::Result<()> {
    let clients = settings.clients()?;
    let record: PreprintRecord = match server {
        Some(ecosystem) => clients.preprints.fetch_details(doi, ecosystem).await?,
        None => match clients.preprints.fetch_details(doi, Ecosystem::Biorxiv).await {
            Ok(record) if record.is_ok() => record,
            _ => clients.preprints.fetch_details(doi, Ecosystem::Medrxiv).await?,
        },
    };

    eprintln!(
        "{} {} ({})",
        style(&record.title).bold(),
        record.ecosystem,
        record.status
    );
    match PreprintMetadataClient::extract_published_doi(&record) {
        Some(published) => eprintln!("  {} Published as {}", dim_arrow(), published),
        None => eprintln!("  {} Not yet published", dim_arrow()),
    }
    write_json(&record, None).await
}

/// Show the title and first author of a PMID.
pub async fn cmd_summary(settings: &Settings, pmid: &str) -> anyhow::Result<()> {
    let clients = settings.clients()?;
    let summary = clients.resolver.fetch_summary(pmid).await?;
    write_json(&summary, None).await
}

/// Print the derived file name for a DOI or link.
pub fn cmd_filename(link: &str) {
    println!("{}", link_file_name(link));
}
