//! Command-line interface definitions for the crawler.
//!
//! Options given here override the matching values in the configuration
//! file. The session cookie can also come from `KB_SESSION_COOKIE` so it
//! never has to be written to disk.

use crate::config::CrawlConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CHECKPOINT_PATH: &str = "articles_temp.json";
pub const DEFAULT_OUTPUT_PATH: &str = "articles.json";
pub const DEFAULT_PROCESSED_PATH: &str = "articles_processed.json";

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Crawl every site in sites.yaml, resuming from articles_temp.json
/// kb_crawler crawl -c sites.yaml
///
/// # Strip HTML from an existing article file
/// kb_crawler strip -i articles.json -o articles_processed.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the configured sites and export their articles
    Crawl(CrawlArgs),
    /// Convert the bodies of an article file to plain text
    Strip {
        /// Article JSON file to read
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the stripped articles
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// YAML file listing the sites to crawl
    #[arg(short, long, env = "KB_CRAWLER_CONFIG")]
    pub config: PathBuf,

    /// Checkpoint file, rewritten after every article
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Output file for all crawled articles
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file for the plain-text, strict-match-only corpus
    #[arg(short, long)]
    pub processed_output: Option<PathBuf>,

    /// Session cookie sent with every static request
    #[arg(long, env = "KB_SESSION_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// User agent for static requests and the headless browser
    #[arg(long)]
    pub user_agent: Option<String>,
}

/// File locations for one crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    pub processed: PathBuf,
}

impl CrawlArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(cookie) = &self.cookie {
            config.http.cookie = Some(cookie.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            config.http.user_agent = user_agent.clone();
        }
    }

    /// Command line first, then configuration file, then defaults.
    pub fn paths(&self, config: &CrawlConfig) -> RunPaths {
        let pick = |cli: &Option<PathBuf>, file: &Option<PathBuf>, default: &str| {
            cli.clone()
                .or_else(|| file.clone())
                .unwrap_or_else(|| PathBuf::from(default))
        };
        RunPaths {
            checkpoint: pick(&self.checkpoint, &config.checkpoint_path, DEFAULT_CHECKPOINT_PATH),
            output: pick(&self.output, &config.output_path, DEFAULT_OUTPUT_PATH),
            processed: pick(
                &self.processed_output,
                &config.processed_path,
                DEFAULT_PROCESSED_PATH,
            ),
        }
    }
}
