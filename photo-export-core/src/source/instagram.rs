//! Instagram photo source, via the Graph API "business discovery" field.
//!
//! The credentials belong to an Instagram business account linked to a
//! Facebook page; other public business/creator accounts are read through
//! `business_discovery.username(...)`. There are no albums: the subject has a
//! profile picture and a flat media feed.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::InstagramSettings;
use crate::contract::{AlbumDescriptor, GroupKey, Listing, PhotoSource, RawItem, SourceProvider};
use crate::error::{ExportError, Result};

/// One entry of `business_discovery.media.data`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstagramMedia {
    /// `IMAGE`, `VIDEO` or `CAROUSEL_ALBUM`.
    pub media_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Absent when the owner hides like counts.
    #[serde(default)]
    pub like_count: Option<u64>,
}

impl InstagramMedia {
    pub fn is_image(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("IMAGE")
    }
}

#[derive(Debug, Deserialize)]
struct Id {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Accounts {
    data: Vec<Id>,
}

#[derive(Debug, Deserialize)]
struct PageAccount {
    instagram_business_account: Option<Id>,
}

#[derive(Debug, Deserialize)]
struct Discovery<T> {
    business_discovery: T,
}

#[derive(Debug, Deserialize)]
struct DiscoveredProfile {
    username: Option<String>,
    #[serde(default)]
    media_count: u64,
    profile_picture_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveredMedia {
    media: Option<MediaPage>,
}

#[derive(Debug, Deserialize)]
struct MediaPage {
    data: Vec<InstagramMedia>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

enum GraphReply<T> {
    Data(T),
    Refused(String),
}

struct GraphApi {
    client: Client,
    settings: InstagramSettings,
    token: String,
}

impl GraphApi {
    async fn get<T: DeserializeOwned>(&self, node: &str, fields: &str) -> Result<GraphReply<T>> {
        let url = format!("{}/{}", self.settings.api_url.trim_end_matches('/'), node);
        debug!(node, fields, "Calling Graph API");
        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str()), ("fields", fields)])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(GraphReply::Data(resp.json().await?));
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GraphErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("status {status}: {body}"));
        Ok(GraphReply::Refused(message))
    }

    /// Status of a discovery lookup, without reading the body.
    async fn discovery_status(&self, account_id: &str, username: &str) -> Result<StatusCode> {
        let url = format!("{}/{}", self.settings.api_url.trim_end_matches('/'), account_id);
        let fields = format!("business_discovery.username({username})");
        let resp = self
            .client
            .get(&url)
            .query(&[("access_token", self.token.as_str()), ("fields", fields.as_str())])
            .send()
            .await?;
        Ok(resp.status())
    }

    async fn business_discovery<T: DeserializeOwned>(
        &self,
        account_id: &str,
        username: &str,
        subfields: &str,
    ) -> Result<GraphReply<T>> {
        let fields = format!("business_discovery.username({username}){{{subfields}}}");
        self.get(account_id, &fields).await
    }
}

fn require_data<T>(reply: GraphReply<T>, context: &str) -> Result<T> {
    match reply {
        GraphReply::Data(data) => Ok(data),
        GraphReply::Refused(message) => {
            warn!(context, error = %message, "Graph API refused request");
            Err(ExportError::Auth(format!("{context}: {message}")))
        }
    }
}

/// An Instagram business account bound to one target username.
pub struct InstagramSource {
    api: GraphApi,
    account_id: String,
    username: String,
    media_count: u64,
    profile_picture_url: Option<String>,
}

impl InstagramSource {
    pub async fn connect(
        settings: InstagramSettings,
        token: impl Into<String>,
        username: &str,
    ) -> Result<Self> {
        let api = GraphApi {
            client: Client::new(),
            settings,
            token: token.into(),
        };

        let accounts: Accounts = require_data(
            api.get("me/accounts", "instagram_business_account").await?,
            "listing linked pages",
        )?;
        let page = accounts
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ExportError::Auth("token has no linked Facebook page".to_string()))?;

        let page_account: PageAccount = require_data(
            api.get(&page.id, "instagram_business_account").await?,
            "resolving business account",
        )?;
        let account_id = page_account
            .instagram_business_account
            .ok_or_else(|| {
                ExportError::Auth(format!("page {} has no Instagram business account", page.id))
            })?
            .id;

        let profile: Discovery<DiscoveredProfile> = require_data(
            api.business_discovery(
                &account_id,
                username,
                "username,ig_id,id,media_count,profile_picture_url",
            )
            .await?,
            "looking up Instagram user",
        )?;
        let profile = profile.business_discovery;

        info!(
            username,
            media_count = profile.media_count,
            "Bound Instagram source"
        );
        Ok(Self {
            api,
            account_id,
            username: profile.username.unwrap_or_else(|| username.to_string()),
            media_count: profile.media_count,
            profile_picture_url: profile.profile_picture_url,
        })
    }

    /// Total media (of every kind) the subject has published.
    pub fn media_count(&self) -> u64 {
        self.media_count
    }
}

#[async_trait]
impl PhotoSource for InstagramSource {
    fn provider(&self) -> SourceProvider {
        SourceProvider::Instagram
    }

    fn subject_name(&self) -> String {
        self.username.clone()
    }

    async fn user_exists(&self, identifier: &str) -> Result<bool> {
        let status = self.api.discovery_status(&self.account_id, identifier).await?;
        if status != StatusCode::OK {
            warn!(identifier, status = %status, "Instagram user is not accessible");
        }
        Ok(status == StatusCode::OK)
    }

    async fn fetch_photos(&self, group: &GroupKey) -> Result<Listing<RawItem>> {
        match group {
            GroupKey::Profile => Ok(Listing::ok(
                self.profile_picture_url
                    .iter()
                    .map(|url| RawItem::ProfilePicture { url: url.clone() })
                    .collect(),
            )),
            GroupKey::Feed => {
                let reply = self
                    .api
                    .business_discovery::<Discovery<DiscoveredMedia>>(
                        &self.account_id,
                        &self.username,
                        "media{media_type,timestamp,media_url,like_count}",
                    )
                    .await?;
                match reply {
                    GraphReply::Data(found) => {
                        let items: Vec<RawItem> = found
                            .business_discovery
                            .media
                            .map(|page| page.data)
                            .unwrap_or_default()
                            .into_iter()
                            .map(RawItem::Instagram)
                            .collect();
                        info!(count = items.len(), "Fetched Instagram media");
                        Ok(Listing::ok(items))
                    }
                    GraphReply::Refused(message) => {
                        warn!(error = %message, "Graph API refused media listing");
                        Ok(Listing::failed(message))
                    }
                }
            }
            GroupKey::Wall | GroupKey::Album(_) => Err(ExportError::UnsupportedGrouping {
                provider: SourceProvider::Instagram.display_name(),
                grouping: group.to_string(),
            }),
        }
    }

    async fn fetch_albums(&self) -> Result<Listing<AlbumDescriptor>> {
        Ok(Listing::default())
    }
}
