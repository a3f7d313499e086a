//! JSON persistence for scraped listings. Runs write one pretty-printed
//! UTF-8 array per invocation, into `data/` by default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::record::{CanonicalRecord, DraftRecord};

pub const DEFAULT_DIR: &str = "data";

/// Timestamped default output path, e.g. `data/pure_data_20250824_153000.json`.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_DIR).join(format!(
        "pure_data_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Write the records as a pretty-printed JSON array, creating parent
/// directories as needed.
pub fn save_records(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!("saved {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read back a canonical array written by [`save_records`].
pub fn load_records(path: &Path) -> Result<Vec<CanonicalRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a listing record array", path.display()))
}

/// Read a raw draft array from an earlier extraction, for offline
/// normalization.
pub fn load_drafts(path: &Path) -> Result<Vec<DraftRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a draft listing array", path.display()))
}
