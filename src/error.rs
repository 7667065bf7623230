//! Error types for fetching, configuration and checkpoint persistence.
//!
//! Fetch errors are recoverable: the pipeline logs them and moves on to the
//! next URL. Checkpoint errors are fatal because continuing would leave
//! committed records unpersisted.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain content for a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// More redirects than the client allows.
    #[error("too many redirects while fetching {url}")]
    RedirectLoop { url: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Any other transport failure (DNS, connection reset, TLS, body read).
    #[error("network error while fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// Content arrived but could not be interpreted (malformed sitemap XML).
    #[error("failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    /// The headless browser or one of its pages could not be acquired or driven.
    #[error("headless browser failure for {url}: {message}")]
    Resource { url: String, message: String },
}

impl FetchError {
    /// Classify a `reqwest` error into the fetch taxonomy.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_redirect() {
            FetchError::RedirectLoop { url }
        } else if err.is_timeout() {
            FetchError::Timeout { url }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            FetchError::Network {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// Invalid or unreadable crawl configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure to read or write the checkpoint and output files.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed article JSON in {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
