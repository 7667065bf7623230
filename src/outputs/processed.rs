//! The processed corpus: plain-text bodies of confidently extracted articles.

use crate::models::{ArticleRecord, record_id};
use crate::normalize::normalize;
use std::collections::HashMap;

/// Build the exported corpus from raw records.
///
/// Keeps only `strict_match` records, converts each body to plain text and
/// assigns final IDs `<domain>#1`, `<domain>#2`, … per domain in list order.
/// Provisional IDs from the crawl are discarded.
pub fn process_records(records: &[ArticleRecord]) -> Vec<ArticleRecord> {
    let mut sequence: HashMap<String, usize> = HashMap::new();
    records
        .iter()
        .filter(|r| r.strict_match)
        .map(|r| {
            let domain = r.domain();
            let n = sequence.entry(domain.clone()).or_insert(0);
            *n += 1;
            ArticleRecord {
                id: record_id(&domain, *n),
                body: normalize(&r.body),
                ..r.clone()
            }
        })
        .collect()
}

/// Convert every body to plain text, keeping all records and their IDs.
pub fn strip_records(records: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    records
        .into_iter()
        .map(|mut r| {
            if !r.body.is_empty() {
                r.body = normalize(&r.body);
            }
            r
        })
        .collect()
}
