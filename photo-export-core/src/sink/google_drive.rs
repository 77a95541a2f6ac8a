//! Google Drive sink.
//!
//! Drive folders are first-class objects addressed by id. Exports are rooted
//! in the first folder shared with the (service) account; the account reported
//! back is that folder's owner. Existing files with the same name are deleted
//! before the replacement is uploaded.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::GoogleDriveSettings;
use crate::contract::{ExportTarget, FolderHandle, PhotoRecord, PhotoSink, SinkProvider};
use crate::error::{ExportError, Result};
use crate::manifest::ManifestWriter;
use crate::sink::fetch_source;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const PHOTO_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Permission {
    role: String,
    email_address: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum ObjectKind {
    Folder,
    File,
}

/// Quote `value` for use inside a Drive query string literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

async fn api_error(resp: Response) -> ExportError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    ExportError::Api { status, message }
}

pub struct GoogleDriveSink {
    client: Client,
    settings: GoogleDriveSettings,
    token: String,
    shared_folder: FolderHandle,
    account_name: String,
    manifests: ManifestWriter,
}

impl GoogleDriveSink {
    /// Locate the shared container and its owner.
    pub async fn connect(
        settings: GoogleDriveSettings,
        token: impl Into<String>,
        manifests: ManifestWriter,
    ) -> Result<Self> {
        let client = Client::new();
        let token = token.into();
        let url = format!("{}/files", settings.api_url.trim_end_matches('/'));

        let resp = client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("q", "sharedWithMe = true"),
                ("pageSize", "10"),
                ("fields", "nextPageToken, files(id, name, permissions(role, emailAddress))"),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            error!(status = %status, "Google Drive rejected the credentials");
            return Err(ExportError::Auth(format!(
                "Google Drive rejected the credentials (status {status})"
            )));
        }

        let listing: FileList = resp.json().await?;
        let shared = listing.files.into_iter().next().ok_or_else(|| {
            ExportError::Auth("no folder has been shared with this Google account".to_string())
        })?;
        let account_name = shared
            .permissions
            .iter()
            .find(|p| p.role == "owner")
            .and_then(|p| p.email_address.clone())
            .unwrap_or_else(|| shared.name.clone());

        info!(folder_id = %shared.id, account = %account_name, "Connected to Google Drive");
        Ok(Self {
            client,
            settings,
            token,
            shared_folder: FolderHandle {
                id: shared.id,
                path: String::new(),
            },
            account_name,
            manifests,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Objects named `name` directly under `parent_id`.
    async fn find(&self, name: &str, parent_id: &str, kind: ObjectKind) -> Result<Vec<DriveFile>> {
        let mime_clause = match kind {
            ObjectKind::Folder => format!("mimeType = '{FOLDER_MIME_TYPE}'"),
            ObjectKind::File => format!("mimeType != '{FOLDER_MIME_TYPE}'"),
        };
        let query = format!(
            "name = '{}' and '{}' in parents and {} and trashed = false",
            escape_query(name),
            escape_query(parent_id),
            mime_clause
        );
        let resp = self
            .authorized(self.client.get(self.api("/files")))
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("orderBy", "createdTime"),
                ("fields", "nextPageToken, files(id, name)"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(resp.json::<FileList>().await?.files)
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let resp = self
            .authorized(self.client.delete(self.api(&format!("/files/{file_id}"))))
            .send()
            .await?;
        match resp.status() {
            status if status.is_success() => Ok(()),
            // Already gone.
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(api_error(resp).await),
        }
    }

    /// Same-named files are removed only once the new content is stored, so
    /// a failed transfer leaves the previous export in place.
    async fn upload_inner(&self, record: &PhotoRecord, folder: &FolderHandle) -> Result<()> {
        let content = fetch_source(&self.client, record).await?;
        let previous = self.find(&record.file_name, &folder.id, ObjectKind::File).await?;

        let session = self
            .authorized(self.client.post(format!(
                "{}/files",
                self.settings.upload_url.trim_end_matches('/')
            )))
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", PHOTO_MIME_TYPE)
            .json(&json!({
                "name": record.file_name,
                "parents": [folder.id],
            }))
            .send()
            .await?;
        if !session.status().is_success() {
            return Err(api_error(session).await);
        }
        let location = session
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ExportError::transfer(&record.file_name, "upload session has no Location header")
            })?;

        let resp = self
            .authorized(self.client.put(&location))
            .header(header::CONTENT_TYPE, PHOTO_MIME_TYPE)
            .body(content)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        for existing in previous {
            debug!(file = %record.file_name, file_id = %existing.id, "Deleting replaced file");
            self.delete(&existing.id).await?;
        }
        info!(file = %record.file_name, folder = %folder.path, "Uploaded photo to Google Drive");
        Ok(())
    }
}

#[async_trait]
impl PhotoSink for GoogleDriveSink {
    fn provider(&self) -> SinkProvider {
        SinkProvider::GoogleDrive
    }

    fn account_name(&self) -> String {
        self.account_name.clone()
    }

    fn root_folder(&self) -> FolderHandle {
        self.shared_folder.clone()
    }

    async fn ensure_folder(&self, name: &str, parent: &FolderHandle) -> Result<FolderHandle> {
        let path = parent.child_path(name);
        if let Some(existing) = self
            .find(name, &parent.id, ObjectKind::Folder)
            .await?
            .into_iter()
            .next()
        {
            debug!(path = %path, folder_id = %existing.id, "Folder already exists on Google Drive");
            return Ok(FolderHandle {
                id: existing.id,
                path,
            });
        }

        let resp = self
            .authorized(self.client.post(self.api("/files")))
            .query(&[("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent.id],
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let created: DriveFile = resp.json().await?;
        info!(path = %path, folder_id = %created.id, "Created folder on Google Drive");

        // A concurrent run may have created the same folder; settle on the
        // oldest one so every run resolves the same id.
        let id = match self
            .find(name, &parent.id, ObjectKind::Folder)
            .await?
            .into_iter()
            .next()
        {
            Some(first) if first.id != created.id => {
                warn!(path = %path, kept = %first.id, duplicate = %created.id, "Folder was created concurrently, using the earliest");
                first.id
            }
            _ => created.id,
        };
        Ok(FolderHandle { id, path })
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
