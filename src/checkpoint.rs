//! Crash-resumable article persistence.
//!
//! The checkpoint file is the durable copy of every record committed so far.
//! It is rewritten in full after each new article, so an interrupted run
//! loses at most the article being fetched. On the next start the records
//! are loaded back and their URLs are skipped.

use crate::error::CheckpointError;
use crate::models::{ArticleRecord, ExtractedArticle, record_id};
use crate::outputs::json::{read_records, write_records};
use crate::outputs::processed::process_records;
use crate::utils::normalize_url;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Record counts reported by [`CheckpointStore::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub total: usize,
    pub exported: usize,
}

/// In-memory article list mirrored to the checkpoint file.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    records: Vec<ArticleRecord>,
    known_urls: HashSet<String>,
    per_domain: HashMap<String, usize>,
}

impl CheckpointStore {
    /// Load the checkpoint at `path`. A missing file starts an empty store.
    ///
    /// Records repeating an earlier `html_url` are dropped so the loaded
    /// list upholds the one-record-per-URL invariant.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, CheckpointError> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
            known_urls: HashSet::new(),
            per_domain: HashMap::new(),
        };

        match read_records(path).await? {
            Some(records) => {
                for record in records {
                    if !store.remember(&record) {
                        warn!(url = %record.html_url, "Dropping duplicate record from checkpoint");
                        continue;
                    }
                    store.records.push(record);
                }
                info!(count = store.records.len(), "Loaded articles from previous run");
            }
            None => info!("No checkpoint found; starting fresh"),
        }
        Ok(store)
    }

    fn remember(&mut self, record: &ArticleRecord) -> bool {
        if !self.known_urls.insert(normalize_url(&record.html_url)) {
            return false;
        }
        *self.per_domain.entry(record.domain()).or_insert(0) += 1;
        true
    }

    /// Whether a record for `url` is already committed.
    pub fn contains(&self, url: &str) -> bool {
        self.known_urls.contains(&normalize_url(url))
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ArticleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Build a record for `url` with the next provisional ID for its domain.
    pub fn new_record(&self, url: &str, extracted: ExtractedArticle) -> ArticleRecord {
        let mut record = ArticleRecord::new(String::new(), url.to_string(), extracted);
        let domain = record.domain();
        let next = self.per_domain.get(&domain).copied().unwrap_or(0) + 1;
        record.id = record_id(&domain, next);
        record
    }

    /// Commit `record` and rewrite the checkpoint file with the full list.
    ///
    /// Returns `Ok(false)` without writing if a record with the same URL is
    /// already committed.
    ///
    /// # Errors
    ///
    /// Any write failure. The record stays in memory, but callers should
    /// abort: the on-disk state no longer matches.
    #[instrument(level = "debug", skip_all, fields(url = %record.html_url))]
    pub async fn append_and_persist(&mut self, record: ArticleRecord) -> Result<bool, CheckpointError> {
        if !self.remember(&record) {
            debug!("Record already committed");
            return Ok(false);
        }
        self.records.push(record);
        write_records(&self.path, &self.records).await?;
        info!(path = %self.path.display(), count = self.records.len(), "Progress saved");
        Ok(true)
    }

    /// Write the full list to `output_path`, then the processed corpus to `processed_path`.
    #[instrument(level = "info", skip_all, fields(output = %output_path.display(), processed = %processed_path.display()))]
    pub async fn finalize(
        &self,
        output_path: &Path,
        processed_path: &Path,
    ) -> Result<FinalizeSummary, CheckpointError> {
        write_records(output_path, &self.records).await?;
        info!(count = self.records.len(), "All articles saved");

        let processed = process_records(&self.records);
        write_records(processed_path, &processed).await?;
        info!(count = processed.len(), "Processed articles saved");

        Ok(FinalizeSummary {
            total: self.records.len(),
            exported: processed.len(),
        })
    }
}
