use std::path::PathBuf;

use llm_client::{GeminiClient, LlmError, TextCompletion};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::extractor;
use crate::fetcher::{self, FetchError};
use crate::registry::{RegistryError, Source, SourceRegistry};
use crate::store::{SiteStore, StoreError, UpsertOutcome};
use crate::validator::{self, ParseError};

/// Fatal for the whole run. Raised before any source is fetched; the caller
/// logs it exactly once and processes nothing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("no active source named '{name}'")]
    UnknownSource { name: String },

    #[error("content store has no live listing page")]
    NoLiveListing,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Anything that abandons one source's pass. Recovered at the source
/// boundary; the run continues with the next source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Everything the run level needs, resolved by the binary shell from CLI
/// arguments and environment variables.
pub struct RunOptions {
    /// Restrict the run to one active source by name.
    pub source: Option<String>,
    pub api_key: Option<String>,
    pub sources_file: PathBuf,
    pub content_file: PathBuf,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run level: resolve credentials, the source set, and the live listing page
/// (all fail fast), then drive the per-source loop. Per-source failures never
/// escape past that loop.
pub async fn run(
    options: RunOptions,
    client: &reqwest::Client,
) -> Result<RunSummary, ConfigError> {
    let api_key = options.api_key.ok_or(ConfigError::MissingApiKey)?;

    let registry = SourceRegistry::load(&options.sources_file)?;
    let sources = match &options.source {
        Some(name) => vec![registry
            .active_named(name)
            .ok_or_else(|| ConfigError::UnknownSource { name: name.clone() })?],
        None => registry.active(),
    };

    let mut store = SiteStore::open(&options.content_file)?;
    let listing_slug = store
        .live_listing()
        .ok_or(ConfigError::NoLiveListing)?
        .slug
        .clone();

    let model = GeminiClient::new(client.clone(), api_key);
    Ok(run_sources(client, &model, &sources, &mut store, &listing_slug).await)
}

/// The per-source loop. Failures are logged and counted; the loop always
/// reaches the final completion line.
pub async fn run_sources(
    client: &reqwest::Client,
    model: &dyn TextCompletion,
    sources: &[Source],
    store: &mut SiteStore,
    listing_slug: &str,
) -> RunSummary {
    info!(count = sources.len(), "Starting scrape run");

    let mut summary = RunSummary::default();
    for source in sources {
        info!(source = %source.name, "Scraping source");
        match scrape_source(client, model, source, store, listing_slug).await {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                error!(source = %source.name, error = %e, "Source failed, moving on");
                summary.failed += 1;
            }
        }
    }

    info!("All scraping tasks complete");
    summary
}

/// One source's pass: fetch, extract, validate, then upsert each candidate.
/// A persistence failure skips that article only; remaining candidates still
/// attempt their upsert.
#[instrument(skip_all, fields(source = %source.name))]
pub async fn scrape_source(
    client: &reqwest::Client,
    model: &dyn TextCompletion,
    source: &Source,
    store: &mut SiteStore,
    listing_slug: &str,
) -> Result<(), SourceError> {
    let snippet = fetcher::fetch_content(client, &source.target_url, &source.selector).await?;

    let raw = extractor::extract_articles(model, &snippet, &source.base_url).await?;

    let articles = match validator::parse_articles(&raw) {
        Ok(articles) => articles,
        Err(e) => {
            // Keep the raw text around so a bad run can be diagnosed without
            // re-prompting the model.
            error!(source = %source.name, raw_response = %raw, "Model output failed validation");
            return Err(e.into());
        }
    };

    info!(source = %source.name, count = articles.len(), "Validated articles");

    for candidate in &articles {
        match store.upsert(candidate, listing_slug) {
            Ok(UpsertOutcome::Updated) => info!(title = %candidate.title, "Updated article page"),
            Ok(UpsertOutcome::Created) => info!(title = %candidate.title, "Added article page"),
            Err(e) => warn!(
                source = %source.name,
                url = %candidate.source_url,
                error = %e,
                "Failed to persist article, skipping it"
            ),
        }
    }

    Ok(())
}
