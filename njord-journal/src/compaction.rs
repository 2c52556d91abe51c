use crate::error::JournalError;
use chrono::{NaiveDate, Utc};
use flate2::{write::GzEncoder, Compression};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Rewrite every rotated (non-today) plain `.ndjson` file older than
/// `older_than_days` as gzip (level 6), removing the original only after
/// the compressed file has been fully written and flushed (spec §4.B).
/// Returns the paths that were compacted.
pub async fn compact(base_dir: &Path, older_than_days: i64) -> Result<Vec<PathBuf>, JournalError> {
    let base_dir = base_dir.to_path_buf();
    tokio::task::spawn_blocking(move || compact_blocking(&base_dir, older_than_days))
        .await
        .expect("compact blocking task panicked")
}

fn compact_blocking(base_dir: &Path, older_than_days: i64) -> Result<Vec<PathBuf>, JournalError> {
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(older_than_days);
    let mut compacted = Vec::new();

    let entries = std::fs::read_dir(base_dir).map_err(|source| JournalError::Io {
        path: base_dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| JournalError::Io {
            path: base_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("ndjson") {
            continue;
        }
        let Some(date) = extract_date(&path) else {
            continue;
        };
        if date >= cutoff {
            continue;
        }
        compress_and_remove(&path)?;
        compacted.push(path);
    }

    Ok(compacted)
}

fn extract_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?; // "<topic>.<symbol?>.<date>"
    let date_segment = stem.rsplit('.').next()?;
    NaiveDate::parse_from_str(date_segment, "%Y-%m-%d").ok()
}

fn compress_and_remove(path: &Path) -> Result<(), JournalError> {
    let contents = std::fs::read(path).map_err(|source| JournalError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let gz_path = {
        let mut p = path.to_path_buf().into_os_string();
        p.push(".gz");
        PathBuf::from(p)
    };

    let gz_file = std::fs::File::create(&gz_path).map_err(|source| JournalError::Io {
        path: gz_path.clone(),
        source,
    })?;
    let mut encoder = GzEncoder::new(gz_file, Compression::new(6));
    encoder.write_all(&contents).map_err(|source| JournalError::Io {
        path: gz_path.clone(),
        source,
    })?;
    encoder.finish().map_err(|source| JournalError::Io {
        path: gz_path.clone(),
        source,
    })?;

    // Only remove the original once the compressed copy is fully committed.
    std::fs::remove_file(path).map_err(|source| JournalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %gz_path.display(), "journal file compacted");
    Ok(())
}
