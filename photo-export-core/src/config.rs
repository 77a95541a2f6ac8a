use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Default number of photos exported per grouping without asking.
pub const DEFAULT_MAX_PHOTOS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Local directory the metadata manifests are written under.
    pub manifest_dir: PathBuf,
    pub max_photos: usize,
    pub vk: VkSettings,
    pub instagram: InstagramSettings,
    pub google_drive: GoogleDriveSettings,
    pub yandex_disk: YandexDiskSettings,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            manifest_dir: PathBuf::from("."),
            max_photos: DEFAULT_MAX_PHOTOS,
            vk: VkSettings::default(),
            instagram: InstagramSettings::default(),
            google_drive: GoogleDriveSettings::default(),
            yandex_disk: YandexDiskSettings::default(),
        }
    }
}

impl ExportConfig {
    pub fn trace_loaded(&self) {
        info!(
            manifest_dir = %self.manifest_dir.display(),
            max_photos = self.max_photos,
            vk_version = %self.vk.version,
            "Loaded ExportConfig"
        );
        debug!(?self, "ExportConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VkSettings {
    pub api_url: String,
    pub version: String,
}

impl Default for VkSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.vk.com/method".to_string(),
            version: "5.130".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramSettings {
    /// Graph API base, including the version segment.
    pub api_url: String,
}

impl Default for InstagramSettings {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com/v10.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDriveSettings {
    pub api_url: String,
    pub upload_url: String,
}

impl Default for GoogleDriveSettings {
    fn default() -> Self {
        Self {
            api_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YandexDiskSettings {
    pub api_url: String,
}

impl Default for YandexDiskSettings {
    fn default() -> Self {
        Self {
            api_url: "https://cloud-api.yandex.net/v1/disk".to_string(),
        }
    }
}
