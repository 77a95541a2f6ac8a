//! VKontakte photo source.
//!
//! Every VK API method answers HTTP 200 with either `{"response": ...}` or
//! `{"error": {"error_msg": ...}}`. Error payloads on listing calls become an
//! empty [`Listing`] carrying the message, so the caller can report it and let
//! the user try another subject.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::VkSettings;
use crate::contract::{AlbumDescriptor, GroupKey, Listing, PhotoSource, RawItem, SourceProvider};
use crate::error::{ExportError, Result};

/// One photo from `photos.get` with `extended=1&photo_sizes=1`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VkPhoto {
    #[serde(default)]
    pub id: Option<i64>,
    pub album_id: i64,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub likes: Option<VkLikes>,
    /// Ordered smallest to largest.
    #[serde(default)]
    pub sizes: Vec<VkPhotoSize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VkLikes {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VkPhotoSize {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct VkUser {
    id: i64,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct VkItems<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VkAlbum {
    id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct VkApiError {
    error_msg: String,
}

#[derive(Debug, Deserialize)]
struct VkEnvelope<T> {
    response: Option<T>,
    error: Option<VkApiError>,
}

enum VkReply<T> {
    Data(T),
    Refused(String),
}

struct VkApi {
    client: Client,
    settings: VkSettings,
    token: String,
}

impl VkApi {
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<VkReply<T>> {
        let url = format!("{}/{}", self.settings.api_url.trim_end_matches('/'), method);
        debug!(method, "Calling VK API");
        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str()), ("v", self.settings.version.as_str())])
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ExportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: VkEnvelope<T> = resp.json().await?;
        match (envelope.response, envelope.error) {
            (Some(data), _) => Ok(VkReply::Data(data)),
            (None, Some(err)) => Ok(VkReply::Refused(err.error_msg)),
            (None, None) => Ok(VkReply::Refused(format!(
                "VK method {method} returned neither response nor error"
            ))),
        }
    }

    async fn users(&self, identifier: &str) -> Result<VkReply<Vec<VkUser>>> {
        self.call("users.get", &[("user_ids", identifier.to_string())])
            .await
    }
}

/// A VK account bound to one target user.
pub struct VkSource {
    api: VkApi,
    owner_id: i64,
    subject_name: String,
}

impl VkSource {
    /// Resolve `target_id` (numeric id or screen name) and bind to it.
    pub async fn connect(settings: VkSettings, token: impl Into<String>, target_id: &str) -> Result<Self> {
        let api = VkApi {
            client: Client::new(),
            settings,
            token: token.into(),
        };

        let user = match api.users(target_id).await? {
            VkReply::Data(users) => users.into_iter().next().ok_or_else(|| {
                ExportError::Auth(format!("VK user {target_id} was not found"))
            })?,
            VkReply::Refused(message) => {
                warn!(target_id, error = %message, "VK refused user lookup");
                return Err(ExportError::Auth(message));
            }
        };

        let subject_name = format!("{} {}", user.first_name, user.last_name);
        info!(owner_id = user.id, subject = %subject_name, "Bound VK source");
        Ok(Self {
            api,
            owner_id: user.id,
            subject_name,
        })
    }

    pub fn owner_id(&self) -> i64 {
        self.owner_id
    }
}

#[async_trait]
impl PhotoSource for VkSource {
    fn provider(&self) -> SourceProvider {
        SourceProvider::VKontakte
    }

    fn subject_name(&self) -> String {
        self.subject_name.clone()
    }

    async fn user_exists(&self, identifier: &str) -> Result<bool> {
        match self.api.users(identifier).await? {
            VkReply::Data(users) => Ok(!users.is_empty()),
            VkReply::Refused(message) => {
                warn!(identifier, error = %message, "VK user is not accessible");
                Ok(false)
            }
        }
    }

    async fn fetch_photos(&self, group: &GroupKey) -> Result<Listing<RawItem>> {
        let album_id = match group {
            GroupKey::Profile | GroupKey::Wall | GroupKey::Album(_) => group.as_str().to_string(),
            GroupKey::Feed => {
                return Err(ExportError::UnsupportedGrouping {
                    provider: SourceProvider::VKontakte.display_name(),
                    grouping: group.to_string(),
                })
            }
        };

        let params = [
            ("owner_id", self.owner_id.to_string()),
            ("album_id", album_id),
            ("extended", "1".to_string()),
            ("photo_sizes", "1".to_string()),
        ];
        match self.api.call::<VkItems<VkPhoto>>("photos.get", &params).await? {
            VkReply::Data(page) => {
                info!(group = %group, count = page.items.len(), "Fetched VK photos");
                Ok(Listing::ok(page.items.into_iter().map(RawItem::Vk).collect()))
            }
            VkReply::Refused(message) => {
                warn!(group = %group, error = %message, "VK refused photo listing");
                Ok(Listing::failed(message))
            }
        }
    }

    async fn fetch_albums(&self) -> Result<Listing<AlbumDescriptor>> {
        let params = [("owner_id", self.owner_id.to_string())];
        match self.api.call::<VkItems<VkAlbum>>("photos.getAlbums", &params).await? {
            VkReply::Data(page) => {
                info!(count = page.items.len(), "Fetched VK albums");
                Ok(Listing::ok(
                    page.items
                        .into_iter()
                        .map(|album| AlbumDescriptor {
                            id: album.id.to_string(),
                            title: album.title,
                        })
                        .collect(),
                ))
            }
            VkReply::Refused(message) => {
                warn!(error = %message, "VK refused album listing");
                Ok(Listing::failed(message))
            }
        }
    }
}
