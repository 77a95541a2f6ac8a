//! # contract: shared data model and the capability traits of the pipeline
//!
//! The orchestrator in [`crate::export`] only ever talks to the traits defined
//! here. Each provider gets one concrete implementation:
//!
//! - [`PhotoSource`]: VKontakte ([`crate::source::vk`]) and Instagram ([`crate::source::instagram`])
//! - [`PhotoSink`]: Google Drive ([`crate::sink::google_drive`]) and Yandex Disk ([`crate::sink::yandex_disk`])
//! - [`CountSelector`]: decides how many photos to transfer when a grouping exceeds the default cap
//!
//! ## Mocking & Testing
//! - The traits are annotated for `mockall` so the orchestrator can be tested without network access.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;

use crate::error::Result;
use crate::source::instagram::InstagramMedia;
use crate::source::vk::VkPhoto;

/// The uniform transfer unit produced by [`crate::normalize::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoRecord {
    /// Album or media-group identifier at the source.
    pub group_key: String,
    /// Unique within the batch it was normalized in.
    pub file_name: String,
    /// Resolution/variant tag (VK size type, `IMAGE`, `profile`).
    pub size_label: String,
    /// Where the binary content can be fetched with a plain GET.
    pub source_url: String,
}

/// A real, user-created album at the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDescriptor {
    pub id: String,
    pub title: String,
}

/// One entry of a provider listing, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Vk(VkPhoto),
    Instagram(InstagramMedia),
    /// The subject's profile picture, exported as a one-photo grouping.
    ProfilePicture { url: String },
}

/// Result of a listing call.
///
/// Providers that answer with an error payload instead of a result produce an
/// empty listing carrying the provider's error text, so the caller can report
/// it and move on.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub provider_error: Option<String>,
}

impl<T> Listing<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self {
            items,
            provider_error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            provider_error: Some(message.into()),
        }
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProvider {
    VKontakte,
    Instagram,
}

impl SourceProvider {
    /// Top level of every logical path exported from this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceProvider::VKontakte => "VKontakte",
            SourceProvider::Instagram => "Instagram",
        }
    }

    /// Groupings exported by "all", ahead of the real albums.
    pub fn default_groupings(&self) -> Vec<Grouping> {
        match self {
            SourceProvider::VKontakte => vec![Grouping::profile(), Grouping::wall()],
            SourceProvider::Instagram => vec![Grouping::profile(), Grouping::feed()],
        }
    }
}

impl fmt::Display for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkProvider {
    GoogleDrive,
    YandexDisk,
}

impl SinkProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            SinkProvider::GoogleDrive => "Google Drive",
            SinkProvider::YandexDisk => "Yandex Disk",
        }
    }
}

impl fmt::Display for SinkProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identifier passed to [`PhotoSource::fetch_photos`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// Pseudo-album holding the subject's profile photos.
    Profile,
    /// Pseudo-album holding photos posted to the subject's wall.
    Wall,
    /// A real album, by provider id.
    Album(String),
    /// A flat media feed without albums.
    Feed,
}

impl GroupKey {
    pub fn as_str(&self) -> &str {
        match self {
            GroupKey::Profile => "profile",
            GroupKey::Wall => "wall",
            GroupKey::Album(id) => id,
            GroupKey::Feed => "media",
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named collection of photos at the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub key: GroupKey,
    /// Third level of the logical path; `None` exports straight into the
    /// subject's folder.
    pub display_name: Option<String>,
}

impl Grouping {
    pub fn profile() -> Self {
        Self {
            key: GroupKey::Profile,
            display_name: None,
        }
    }

    pub fn wall() -> Self {
        Self {
            key: GroupKey::Wall,
            display_name: Some("wall".to_string()),
        }
    }

    pub fn feed() -> Self {
        Self {
            key: GroupKey::Feed,
            display_name: Some("Media".to_string()),
        }
    }

    pub fn album(album: &AlbumDescriptor) -> Self {
        Self {
            key: GroupKey::Album(album.id.clone()),
            display_name: Some(album.title.clone()),
        }
    }

    /// Human-facing label, used in prompts and reports.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.key.as_str())
    }
}

/// Which groupings one export call covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Profile,
    Wall,
    Album(AlbumDescriptor),
}

/// Three-level logical path: `provider / subject / group?`.
///
/// The same path always resolves to the same remote location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub root_folder: String,
    pub sub_folder: String,
    pub album_name: Option<String>,
}

impl ExportTarget {
    pub fn new(provider: SourceProvider, subject: &str, album_name: Option<&str>) -> Self {
        Self {
            root_folder: provider.display_name().to_string(),
            sub_folder: subject.to_string(),
            album_name: album_name.map(str::to_string),
        }
    }

    /// Folder names from the top down.
    pub fn segments(&self) -> Vec<&str> {
        let mut segments = vec![self.root_folder.as_str(), self.sub_folder.as_str()];
        if let Some(album) = &self.album_name {
            segments.push(album);
        }
        segments
    }

    pub fn logical_path(&self) -> String {
        self.segments().join("/")
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.logical_path())
    }
}

/// A remote folder resolved by [`PhotoSink::ensure_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    /// Opaque remote id (equal to `path` on path-addressed sinks).
    pub id: String,
    /// Logical path of the folder, empty for the sink's root.
    pub path: String,
}

impl FolderHandle {
    pub fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        }
    }
}

/// Fetches photo listings for one bound subject.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PhotoSource: Send + Sync {
    fn provider(&self) -> SourceProvider;

    /// Display name of the subject this source is bound to.
    fn subject_name(&self) -> String;

    /// Whether `identifier` names a subject the credentials can read.
    async fn user_exists(&self, identifier: &str) -> Result<bool>;

    /// List the raw photos of one grouping, in provider order.
    async fn fetch_photos(&self, group: &GroupKey) -> Result<Listing<RawItem>>;

    /// List the subject's real albums. Pseudo-albums are never included.
    async fn fetch_albums(&self) -> Result<Listing<AlbumDescriptor>>;
}

/// Writes photos into one bound cloud-storage account.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PhotoSink: Send + Sync {
    fn provider(&self) -> SinkProvider;

    /// The account photos are exported into.
    fn account_name(&self) -> String;

    /// Handle of the container every export path starts from.
    fn root_folder(&self) -> FolderHandle;

    /// Return the folder `name` under `parent`, creating it only if absent.
    async fn ensure_folder(&self, name: &str, parent: &FolderHandle) -> Result<FolderHandle>;

    /// Fetch `record.source_url` and store it as `record.file_name` in
    /// `folder`, replacing any file of the same name.
    async fn upload(&self, record: &PhotoRecord, folder: &FolderHandle) -> Result<()>;

    /// Persist the manifest for a completed batch; returns where it was written.
    async fn finalize(&self, records: &[PhotoRecord], target: &ExportTarget) -> Result<PathBuf>;
}

/// Picks how many photos of a grouping to transfer.
///
/// Only asked when the grouping holds more photos than the default cap; the
/// answer must lie in `1..=available`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CountSelector: Send + Sync {
    fn select_count(&self, grouping: &str, available: usize) -> usize;
}

/// A preset count, clamped into `1..=available`.
#[derive(Debug, Clone, Copy)]
pub struct FixedCount(pub usize);

impl CountSelector for FixedCount {
    fn select_count(&self, _grouping: &str, available: usize) -> usize {
        self.0.clamp(1, available.max(1))
    }
}
