use clap::Parser;
use llm_client::init_logging;
use news_agent::pipeline::{self, RunOptions};
use std::path::PathBuf;
use tracing::{error, info};

const DEFAULT_SOURCES_FILE: &str = "config/sources.json";
const DEFAULT_CONTENT_FILE: &str = "data/content.json";

/// Scrape configured news sources into the content store.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Scrape only a single source by its name
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_logging();

    let args = Cli::parse();

    let options = RunOptions {
        source: args.source,
        api_key: std::env::var("GEMINI_API_KEY").ok(),
        sources_file: path_from_env("SOURCES_FILE", DEFAULT_SOURCES_FILE),
        content_file: path_from_env("CONTENT_FILE", DEFAULT_CONTENT_FILE),
    };

    let client = reqwest::Client::new();

    // Config failures abort here with a single log line; per-source failures
    // are absorbed inside the run and never surface past it.
    match pipeline::run(options, &client).await {
        Ok(summary) => {
            info!(succeeded = summary.succeeded, failed = summary.failed, "Run finished");
        }
        Err(e) => error!(error = %e, "Run aborted by configuration error"),
    }
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(var).unwrap_or_else(|_| default.to_string()))
}
