//! Sink adapters: where exported photos end up.

pub mod google_drive;
pub mod yandex_disk;

pub use google_drive::GoogleDriveSink;
pub use yandex_disk::YandexDiskSink;

use reqwest::Client;
use tracing::debug;

use crate::contract::PhotoRecord;
use crate::error::{ExportError, Result};

/// Download the binary content of `record` with a plain GET.
pub(crate) async fn fetch_source(client: &Client, record: &PhotoRecord) -> Result<Vec<u8>> {
    let resp = client
        .get(&record.source_url)
        .send()
        .await
        .map_err(|e| ExportError::transfer(&record.file_name, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ExportError::transfer(
            &record.file_name,
            format!("source answered {status}"),
        ));
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| ExportError::transfer(&record.file_name, e))?;
    debug!(file = %record.file_name, bytes = bytes.len(), "Fetched source content");
    Ok(bytes.to_vec())
}
