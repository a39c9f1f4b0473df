//! biocfetch - publication identifier resolution and BioC annotation retrieval.
//!
//! Resolves DOIs, preprint DOIs and PMIDs across NCBI and the preprint
//! servers, fetches PubTator BioC documents, and falls back to converting
//! the JATS source when no annotation exists.

pub mod cli;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod rate_limit;
pub mod retrieval;
pub mod services;
