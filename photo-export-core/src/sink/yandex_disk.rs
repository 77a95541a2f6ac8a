//! Yandex Disk sink.
//!
//! Folders are plain path strings. Every level of an export path gets its own
//! existence check; a missing level is created, and a level that cannot be
//! created stops the export. Uploads ask the API for an upload URL with
//! `overwrite=true`, so re-exports replace files in place.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::YandexDiskSettings;
use crate::contract::{ExportTarget, FolderHandle, PhotoRecord, PhotoSink, SinkProvider};
use crate::error::{ExportError, Result};
use crate::manifest::ManifestWriter;
use crate::sink::fetch_source;

#[derive(Debug, Deserialize)]
struct DiskInfo {
    user: DiskUser,
}

#[derive(Debug, Deserialize)]
struct DiskUser {
    display_name: Option<String>,
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadLink {
    href: String,
}

pub struct YandexDiskSink {
    client: Client,
    settings: YandexDiskSettings,
    token: String,
    account_name: String,
    manifests: ManifestWriter,
}

impl YandexDiskSink {
    /// Validate the OAuth token by reading the disk owner.
    pub async fn connect(
        settings: YandexDiskSettings,
        token: impl Into<String>,
        manifests: ManifestWriter,
    ) -> Result<Self> {
        let mut sink = Self {
            client: Client::new(),
            settings,
            token: token.into(),
            account_name: String::new(),
            manifests,
        };

        let resp = sink
            .authorized(sink.client.get(sink.endpoint("")))
            .query(&[("fields", "user")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, "Yandex Disk rejected the token");
            return Err(ExportError::Auth(format!(
                "Yandex Disk rejected the token (status {status})"
            )));
        }
        let info: DiskInfo = resp.json().await?;
        sink.account_name = info
            .user
            .display_name
            .or(info.user.login)
            .unwrap_or_default();
        info!(account = %sink.account_name, "Connected to Yandex Disk");
        Ok(sink)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("OAuth {}", self.token))
    }

    async fn upload_inner(&self, record: &PhotoRecord, folder: &FolderHandle) -> Result<()> {
        let remote_path = folder.child_path(&record.file_name);
        let resp = self
            .authorized(self.client.get(self.endpoint("/resources/upload")))
            .query(&[("path", remote_path.as_str()), ("overwrite", "true")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExportError::transfer(
                &record.file_name,
                format!("upload link request answered {status}: {body}"),
            ));
        }
        let link: UploadLink = resp.json().await?;

        let content = fetch_source(&self.client, record).await?;
        let resp = self.client.put(&link.href).body(content).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExportError::transfer(
                &record.file_name,
                format!("upload answered {status}"),
            ));
        }
        info!(path = %remote_path, "Uploaded photo to Yandex Disk");
        Ok(())
    }
}

#[async_trait]
impl PhotoSink for YandexDiskSink {
    fn provider(&self) -> SinkProvider {
        SinkProvider::YandexDisk
    }

    fn account_name(&self) -> String {
        self.account_name.clone()
    }

    fn root_folder(&self) -> FolderHandle {
        FolderHandle {
            id: String::new(),
            path: String::new(),
        }
    }

    async fn ensure_folder(&self, name: &str, parent: &FolderHandle) -> Result<FolderHandle> {
        let path = parent.child_path(name);
        let handle = FolderHandle {
            id: path.clone(),
            path: path.clone(),
        };
        let creation_failed = |reason: String| ExportError::FolderCreation {
            path: path.clone(),
            reason,
        };

        let exists = self
            .authorized(self.client.get(self.endpoint("/resources")))
            .query(&[("path", path.as_str())])
            .send()
            .await
            .map_err(|e| creation_failed(e.to_string()))?;
        if exists.status() == StatusCode::OK {
            debug!(path = %path, "Folder already exists on Yandex Disk");
            return Ok(handle);
        }

        let created = self
            .authorized(self.client.put(self.endpoint("/resources")))
            .query(&[("path", path.as_str())])
            .send()
            .await
            .map_err(|e| creation_failed(e.to_string()))?;
        match created.status() {
            status if status.is_success() => {
                info!(path = %path, "Created folder on Yandex Disk");
                Ok(handle)
            }
            // Someone else created it between our check and our create.
            StatusCode::CONFLICT => {
                debug!(path = %path, "Folder appeared concurrently on Yandex Disk");
                Ok(handle)
            }
            status => {
                let body = created.text().await.unwrap_or_default();
                error!(path = %path, status = %status, "Failed to create folder on Yandex Disk");
                Err(creation_failed(format!("status {status}: {body}")))
            }
        }
    }

    async fn upload(&self, record: &PhotoRecord, folder: &FolderHandle) -> Result<()> {
        self.upload_inner(record, folder).await.map_err(|e| match e {
            ExportError::Transfer { .. } => e,
            other => ExportError::transfer(&record.file_name, other),
        })
    }

    async fn finalize(&self, records: &[PhotoRecord], target: &ExportTarget) -> Result<PathBuf> {
        self.manifests.write(target, records).await
    }
}
