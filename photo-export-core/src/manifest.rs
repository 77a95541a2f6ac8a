//! Sidecar manifest recording which files a batch produced.
//!
//! Written to `<root>/<logical path>/metadata.json` as a JSON array of
//! `{"file_name", "size"}` objects, in transfer order. Every export replaces
//! the previous manifest for the same path.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::contract::{ExportTarget, PhotoRecord};
use crate::error::Result;

pub const MANIFEST_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file_name: String,
    pub size: String,
}

impl From<&PhotoRecord> for ManifestEntry {
    fn from(record: &PhotoRecord) -> Self {
        Self {
            file_name: record.file_name.clone(),
            size: record.size_label.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestWriter {
    root: PathBuf,
}

impl ManifestWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, target: &ExportTarget) -> PathBuf {
        target
            .segments()
            .into_iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
            .join(MANIFEST_FILE_NAME)
    }

    pub async fn write(&self, target: &ExportTarget, records: &[PhotoRecord]) -> Result<PathBuf> {
        let path = self.path_for(target);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let entries: Vec<ManifestEntry> = records.iter().map(ManifestEntry::from).collect();
        fs::write(&path, serde_json::to_vec(&entries)?).await?;
        info!(path = %path.display(), entries = entries.len(), "Wrote metadata manifest");
        Ok(path)
    }
}
