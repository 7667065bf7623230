//! # KB Crawler
//!
//! Crawls help-center sites, extracts each article's body by CSS class and
//! exports the results as JSON. Progress is checkpointed after every
//! article so an interrupted crawl resumes where it stopped.
//!
//! ## Usage
//!
//! ```sh
//! kb_crawler crawl -c sites.yaml
//! kb_crawler strip -i articles.json -o articles_processed.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Discovery**: find article URLs per site (static crawl, headless
//!    crawl or XML sitemap), bounded by depth and domain
//! 2. **Fetching**: download each article not already in the checkpoint
//! 3. **Extraction**: pick the body by configured class, or the whole page
//! 4. **Output**: the full article list, then a plain-text corpus of the
//!    strictly matched articles with per-domain IDs

use clap::Parser;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod checkpoint;
mod cli;
mod config;
mod error;
mod extract;
mod fetcher;
mod frontier;
mod links;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod utils;

use checkpoint::CheckpointStore;
use cli::{Cli, Command, CrawlArgs};
use config::{CrawlConfig, DiscoveryMode};
use fetcher::SiteFetcher;
use fetcher::http::HttpFetcher;
use fetcher::render::HeadlessRenderer;
use outputs::json::{read_records, write_records};
use outputs::processed::strip_records;
use pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();

    match args.command {
        Command::Crawl(crawl_args) => crawl(crawl_args).await,
        Command::Strip { input, output } => {
            let Some(records) = read_records(&input).await? else {
                error!(path = %input.display(), "Input file not found");
                return Err(format!("input file {} not found", input.display()).into());
            };
            let stripped = strip_records(records);
            write_records(&output, &stripped).await?;
            info!(path = %output.display(), count = stripped.len(), "Processed articles have been saved");
            Ok(())
        }
    }
}

async fn crawl(args: CrawlArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("kb_crawler starting up");

    let mut config = CrawlConfig::load(&args.config).await?;
    args.apply(&mut config);
    let paths = args.paths(&config);
    info!(
        sites = config.sites.len(),
        checkpoint = %paths.checkpoint.display(),
        output = %paths.output.display(),
        processed = %paths.processed.display(),
        "Loaded configuration"
    );

    let http = HttpFetcher::new(&config.http)?;
    let renderer = config
        .sites
        .iter()
        .any(|s| s.mode == DiscoveryMode::Rendered)
        .then(|| HeadlessRenderer::new(config.render.clone(), config.http.user_agent.clone()));
    let fetcher = SiteFetcher::new(http, renderer);

    let store = CheckpointStore::load(&paths.checkpoint).await?;
    let resumed = store.len();
    if !store.is_empty() {
        info!(resumed, "Resuming crawl; committed articles will be skipped");
    }
    let mut pipeline = Pipeline::new(fetcher, store);

    let crawled = pipeline.run(&config.sites).await;
    pipeline.fetcher().shutdown().await;
    let stats = match crawled {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "Checkpoint write failed; aborting");
            return Err(e.into());
        }
    };

    let summary = pipeline.finalize(&paths.output, &paths.processed).await?;

    let elapsed = start_time.elapsed();
    info!(
        resumed,
        committed = stats.committed,
        failed = stats.failed,
        total = summary.total,
        exported = summary.exported,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
