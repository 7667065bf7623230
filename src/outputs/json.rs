//! JSON array files of [`ArticleRecord`].
//!
//! Files are pretty-printed with two-space indentation so successive runs
//! diff cleanly. Writes go to a sibling `.tmp` file that is then renamed
//! over the target, so a crash mid-write leaves the previous file intact.

use crate::error::CheckpointError;
use crate::models::ArticleRecord;
use crate::utils::ensure_parent_dir;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("articles.json"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read an article array. A missing file yields `Ok(None)`.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_records(path: &Path) -> Result<Option<Vec<ArticleRecord>>, CheckpointError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    let records = serde_json::from_str(&raw).map_err(|source| CheckpointError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(records))
}

/// Replace `path` with the pretty-printed `records`.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_records(path: &Path, records: &[ArticleRecord]) -> Result<(), CheckpointError> {
    let json = serde_json::to_string_pretty(records).map_err(|source| CheckpointError::Serde {
        path: path.to_path_buf(),
        source,
    })?;

    ensure_parent_dir(path).await.map_err(io_err(path))?;
    let tmp = temp_path(path);
    fs::write(&tmp, json).await.map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).await.map_err(io_err(path))?;
    debug!("Wrote article file");
    Ok(())
}
