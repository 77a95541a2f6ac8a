//! Converts provider listings into [`PhotoRecord`]s.
//!
//! File names are derived from the popularity counter (`<likes>.jpg`). When a
//! name is already taken earlier in the same batch, the item's date is
//! appended to the counter (`<likes><date>.jpg`). Names are only unique within
//! one batch; replacing files already present at the sink is the sink's job.

use std::collections::HashSet;

use tracing::debug;

use crate::contract::{PhotoRecord, RawItem};

const EXTENSION: &str = "jpg";

/// Size label for the single-resolution Instagram media.
pub const INSTAGRAM_SIZE_LABEL: &str = "IMAGE";
pub const INSTAGRAM_GROUP_KEY: &str = "Media";
pub const PROFILE_PICTURE_NAME: &str = "profile_photo.jpg";
pub const PROFILE_SIZE_LABEL: &str = "profile";

/// Names already handed out in the current batch.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a file name for an item with popularity `counter`, falling back
    /// to `counter + disambiguator` when the plain name is taken.
    pub fn claim(&mut self, counter: &str, disambiguator: &str) -> String {
        let primary = format!("{counter}.{EXTENSION}");
        if self.used.insert(primary.clone()) {
            return primary;
        }

        let stem = format!("{counter}{disambiguator}");
        let mut candidate = format!("{stem}.{EXTENSION}");
        let mut n = 1;
        // Same counter and same date: keep appending until free.
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{stem}_{n}.{EXTENSION}");
            n += 1;
        }
        debug!(primary = %primary, resolved = %candidate, "Resolved file name collision");
        candidate
    }

    /// Reserve a name that is not derived from a counter.
    fn reserve(&mut self, name: &str) -> String {
        let (stem, ext) = name.rsplit_once('.').unwrap_or((name, EXTENSION));
        let mut candidate = name.to_string();
        let mut n = 1;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{stem}_{n}.{ext}");
            n += 1;
        }
        candidate
    }
}

/// Normalize a listing in a single pass, preserving input order.
///
/// Instagram items that are not images, and VK items without any size
/// variant, are dropped.
pub fn normalize(items: &[RawItem]) -> Vec<PhotoRecord> {
    let mut names = NameRegistry::new();
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        match item {
            RawItem::Vk(photo) => {
                let Some(largest) = photo.sizes.last() else {
                    debug!(album_id = photo.album_id, "Skipping VK photo without sizes");
                    continue;
                };
                let likes = photo.likes.as_ref().map(|l| l.count).unwrap_or(0);
                let date = photo.date.map(|d| d.to_string()).unwrap_or_default();
                records.push(PhotoRecord {
                    group_key: photo.album_id.to_string(),
                    file_name: names.claim(&likes.to_string(), &date),
                    size_label: largest.kind.clone(),
                    source_url: largest.url.clone(),
                });
            }
            RawItem::Instagram(media) => {
                if !media.is_image() {
                    debug!(media_type = %media.media_type, "Skipping non-image media");
                    continue;
                }
                let Some(url) = &media.media_url else {
                    debug!("Skipping image media without media_url");
                    continue;
                };
                let likes = media.like_count.unwrap_or(0);
                let timestamp = media.timestamp.clone().unwrap_or_default();
                records.push(PhotoRecord {
                    group_key: INSTAGRAM_GROUP_KEY.to_string(),
                    file_name: names.claim(&likes.to_string(), &timestamp),
                    size_label: INSTAGRAM_SIZE_LABEL.to_string(),
                    source_url: url.clone(),
                });
            }
            RawItem::ProfilePicture { url } => records.push(PhotoRecord {
                group_key: PROFILE_SIZE_LABEL.to_string(),
                file_name: names.reserve(PROFILE_PICTURE_NAME),
                size_label: PROFILE_SIZE_LABEL.to_string(),
                source_url: url.clone(),
            }),
        }
    }

    records
}
