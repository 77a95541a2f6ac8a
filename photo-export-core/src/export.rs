//! High-level pipeline: orchestrates fetch → normalize → upload → manifest for one subject.
//!
//! An [`Exporter`] is bound to one [`PhotoSource`] (a subject on VKontakte or
//! Instagram) and one [`PhotoSink`] (a Google Drive or Yandex Disk account),
//! both chosen once per session. For every grouping it:
//!   - resolves the [`ExportTarget`] `provider / subject / group?`
//!   - fetches and normalizes the grouping's listing
//!   - skips empty groupings without touching the sink
//!   - decides how many photos to transfer (all of them up to the default cap,
//!     otherwise whatever the [`CountSelector`] picks)
//!   - ensures the folder chain, uploads each photo in order, writes the manifest
//!
//! # Error Handling
//! A failed photo ends its grouping (no retry, no skip); sibling groupings of
//! an "all" export still run. Fatal errors ([`ExportError::is_fatal`]) stop
//! the whole export.
//!
//! # Navigation
//! - Main entrypoint: [`Exporter::export`]
//! - Supporting types: [`ExportReport`], [`GroupingReport`], [`GroupingOutcome`].

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_MAX_PHOTOS;
use crate::contract::{
    CountSelector, ExportTarget, FolderHandle, Grouping, PhotoSink, PhotoSource, Selection,
};
use crate::error::{ExportError, Result};
use crate::normalize::normalize;

#[derive(Debug, Default)]
pub struct ExportReport {
    pub groupings: Vec<GroupingReport>,
}

impl ExportReport {
    /// Photos uploaded across all groupings, including partially failed ones.
    pub fn transferred(&self) -> usize {
        self.groupings
            .iter()
            .map(|g| match &g.outcome {
                GroupingOutcome::Completed { files, .. } => files.len(),
                GroupingOutcome::Failed { transferred, .. } => *transferred,
                GroupingOutcome::Empty { .. } => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.groupings
            .iter()
            .filter(|g| matches!(g.outcome, GroupingOutcome::Failed { .. }))
            .count()
    }
}

#[derive(Debug)]
pub struct GroupingReport {
    pub grouping: String,
    pub target: ExportTarget,
    pub outcome: GroupingOutcome,
}

#[derive(Debug, PartialEq)]
pub enum GroupingOutcome {
    /// Every selected photo was uploaded and the manifest written.
    Completed { files: Vec<String>, manifest: PathBuf },
    /// Nothing eligible to export; the sink was not touched.
    Empty { provider_error: Option<String> },
    /// The grouping stopped at the first failure.
    Failed { transferred: usize, error: String },
}

pub struct Exporter<'a> {
    source: &'a dyn PhotoSource,
    sink: &'a dyn PhotoSink,
    selector: &'a dyn CountSelector,
    default_cap: usize,
}

impl<'a> Exporter<'a> {
    pub fn new(
        source: &'a dyn PhotoSource,
        sink: &'a dyn PhotoSink,
        selector: &'a dyn CountSelector,
    ) -> Self {
        Self {
            source,
            sink,
            selector,
            default_cap: DEFAULT_MAX_PHOTOS,
        }
    }

    pub fn with_default_cap(mut self, cap: usize) -> Self {
        self.default_cap = cap;
        self
    }

    /// Run every grouping covered by `selection`, in order.
    pub async fn export(&self, selection: &Selection) -> Result<ExportReport> {
        info!(
            source = %self.source.provider(),
            subject = %self.source.subject_name(),
            sink = %self.sink.provider(),
            account = %self.sink.account_name(),
            ?selection,
            "[EXPORT] Starting export"
        );

        let groupings = self.resolve(selection).await?;
        let mut report = ExportReport::default();

        for grouping in &groupings {
            match self.export_grouping(grouping).await {
                Ok(grouping_report) => report.groupings.push(grouping_report),
                Err(e) if e.is_fatal() => {
                    error!(grouping = grouping.label(), error = %e, "[EXPORT][ERROR] Fatal error, stopping export");
                    return Err(e);
                }
                Err(e) => {
                    warn!(grouping = grouping.label(), error = %e, "[EXPORT] Grouping failed, continuing");
                    report.groupings.push(GroupingReport {
                        grouping: grouping.label().to_string(),
                        target: self.target_for(grouping),
                        outcome: GroupingOutcome::Failed {
                            transferred: 0,
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        info!(
            groupings = report.groupings.len(),
            transferred = report.transferred(),
            failures = report.failures(),
            "[EXPORT] Export finished"
        );
        Ok(report)
    }

    /// Export a single grouping.
    pub async fn export_grouping(&self, grouping: &Grouping) -> Result<GroupingReport> {
        let target = self.target_for(grouping);
        let label = grouping.label().to_string();
        info!(grouping = %label, target = %target, "[EXPORT] Fetching grouping");

        let listing = self.source.fetch_photos(&grouping.key).await?;
        let records = normalize(&listing.items);
        if records.is_empty() {
            info!(grouping = %label, provider_error = ?listing.provider_error, "[EXPORT] Nothing available in grouping");
            return Ok(GroupingReport {
                grouping: label,
                target,
                outcome: GroupingOutcome::Empty {
                    provider_error: listing.provider_error,
                },
            });
        }

        let count = self.transfer_count(&label, records.len())?;
        let batch = &records[..count];
        info!(grouping = %label, available = records.len(), count, "[EXPORT] Transferring photos");

        let folder = match self.ensure_target(&target).await {
            Ok(folder) => folder,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(grouping = %label, error = %e, "[EXPORT][ERROR] Could not resolve target folder");
                return Ok(GroupingReport {
                    grouping: label,
                    target,
                    outcome: GroupingOutcome::Failed {
                        transferred: 0,
                        error: e.to_string(),
                    },
                });
            }
        };

        let mut files = Vec::with_capacity(batch.len());
        for record in batch {
            if let Err(e) = self.sink.upload(record, &folder).await {
                error!(file = %record.file_name, error = %e, "[EXPORT][ERROR] Upload failed, aborting grouping");
                if e.is_fatal() {
                    return Err(e);
                }
                return Ok(GroupingReport {
                    grouping: label,
                    target,
                    outcome: GroupingOutcome::Failed {
                        transferred: files.len(),
                        error: e.to_string(),
                    },
                });
            }
            debug!(file = %record.file_name, "[EXPORT] Uploaded");
            files.push(record.file_name.clone());
        }

        let manifest = match self.sink.finalize(batch, &target).await {
            Ok(manifest) => manifest,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(grouping = %label, error = %e, "[EXPORT][ERROR] Photos uploaded but manifest not written");
                return Ok(GroupingReport {
                    grouping: label,
                    target,
                    outcome: GroupingOutcome::Failed {
                        transferred: files.len(),
                        error: e.to_string(),
                    },
                });
            }
        };
        info!(grouping = %label, files = files.len(), manifest = %manifest.display(), "[EXPORT] Grouping complete");
        Ok(GroupingReport {
            grouping: label,
            target,
            outcome: GroupingOutcome::Completed { files, manifest },
        })
    }

    async fn resolve(&self, selection: &Selection) -> Result<Vec<Grouping>> {
        Ok(match selection {
            Selection::Profile => vec![Grouping::profile()],
            Selection::Wall => vec![Grouping::wall()],
            Selection::Album(album) => vec![Grouping::album(album)],
            Selection::All => {
                let mut groupings = self.source.provider().default_groupings();
                let albums = self.source.fetch_albums().await?;
                if let Some(message) = &albums.provider_error {
                    warn!(error = %message, "[EXPORT] Album listing unavailable, exporting default groupings only");
                }
                groupings.extend(albums.items.iter().map(Grouping::album));
                groupings
            }
        })
    }

    fn target_for(&self, grouping: &Grouping) -> ExportTarget {
        ExportTarget::new(
            self.source.provider(),
            &self.source.subject_name(),
            grouping.display_name.as_deref(),
        )
    }

    fn transfer_count(&self, label: &str, available: usize) -> Result<usize> {
        if available <= self.default_cap {
            return Ok(available);
        }
        let requested = self.selector.select_count(label, available);
        if requested == 0 || requested > available {
            return Err(ExportError::InvalidCount {
                requested,
                available,
            });
        }
        Ok(requested)
    }

    /// Resolve `root → sub → album?`, creating whatever is missing.
    async fn ensure_target(&self, target: &ExportTarget) -> Result<FolderHandle> {
        let mut folder = self.sink.root_folder();
        for segment in target.segments() {
            folder = self.sink.ensure_folder(segment, &folder).await?;
        }
        Ok(folder)
    }
}
