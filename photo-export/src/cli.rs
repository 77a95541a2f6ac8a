/// Command-line surface of photo-export: argument parsing, provider binding and report output.
///
/// All pipeline logic lives in [`photo_export_core`]; this module only turns
/// flags and environment secrets into a bound source and sink, runs the
/// [`Exporter`] and prints what happened.
///
/// For programmatic or integration use, call [`run`] with a constructed [`Cli`].
use crate::load_config::{
    load_config, token_from_env, GOOGLE_DRIVE_TOKEN_ENV, INSTAGRAM_TOKEN_ENV, VK_TOKEN_ENV,
    YANDEX_DISK_TOKEN_ENV,
};
use crate::prompt::PromptCountSelector;
use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use photo_export_core::config::ExportConfig;
use photo_export_core::contract::{
    CountSelector, FixedCount, PhotoSink, PhotoSource, Selection,
};
use photo_export_core::export::{ExportReport, Exporter, GroupingOutcome};
use photo_export_core::manifest::ManifestWriter;
use photo_export_core::sink::{GoogleDriveSink, YandexDiskSink};
use photo_export_core::source::{InstagramSource, VkSource};
use std::path::PathBuf;

/// CLI for photo-export: copy social-network photo collections into cloud storage.
#[derive(Parser)]
#[clap(
    name = "photo-export",
    version,
    about = "Export VKontakte and Instagram photos into Google Drive or Yandex Disk"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export one grouping, or all of them, of a subject's photos
    Export {
        #[clap(long, value_enum)]
        source: SourceKind,
        /// VK user id / screen name, or Instagram username
        #[clap(long)]
        subject: String,
        #[clap(long, value_enum)]
        sink: SinkKind,
        #[clap(long, value_enum, default_value = "all")]
        group: GroupArg,
        /// Album id, required with `--group album`
        #[clap(long)]
        album_id: Option<String>,
        /// Photos to export from groupings larger than the default cap; prompts when absent
        #[clap(long)]
        count: Option<usize>,
        /// Path to the YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// List a subject's albums
    Albums {
        #[clap(long, value_enum)]
        source: SourceKind,
        #[clap(long)]
        subject: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Vk,
    Instagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    GoogleDrive,
    YandexDisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupArg {
    All,
    Profile,
    Wall,
    Album,
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Export {
            source,
            subject,
            sink,
            group,
            album_id,
            count,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "export", ?source, ?sink, ?group, "Starting export");

            let source = connect_source(source, &config, &subject).await?;
            if !source.user_exists(&subject).await? {
                bail!("{subject} is not accessible on {}", source.provider());
            }
            let sink = connect_sink(sink, &config).await?;
            let selection = resolve_selection(source.as_ref(), group, album_id).await?;

            let selector: Box<dyn CountSelector> = match count {
                Some(n) => Box::new(FixedCount(n)),
                None => Box::new(PromptCountSelector::stdin()),
            };
            let exporter = Exporter::new(source.as_ref(), sink.as_ref(), selector.as_ref())
                .with_default_cap(config.max_photos);

            let report = exporter.export(&selection).await.map_err(|e| {
                tracing::error!(command = "export", error = %e, "Export aborted");
                anyhow!("Export aborted: {e}")
            })?;
            print_report(&report, sink.account_name().as_str());

            if report.failures() > 0 {
                bail!("{} grouping(s) failed", report.failures());
            }
            tracing::info!(command = "export", transferred = report.transferred(), "Export complete");
            Ok(())
        }
        Commands::Albums {
            source,
            subject,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            tracing::info!(command = "albums", ?source, "Listing albums");
            match source {
                SourceKind::Vk => {
                    let vk = connect_vk(&config, &subject).await?;
                    print_albums(&vk).await
                }
                SourceKind::Instagram => {
                    let ig = connect_instagram(&config, &subject).await?;
                    println!("{} has published {} media item(s)", subject, ig.media_count());
                    print_albums(&ig).await
                }
            }
        }
    }
}

async fn connect_vk(config: &ExportConfig, subject: &str) -> Result<VkSource> {
    let token = token_from_env(VK_TOKEN_ENV)?;
    Ok(VkSource::connect(config.vk.clone(), token, subject).await?)
}

async fn connect_instagram(config: &ExportConfig, subject: &str) -> Result<InstagramSource> {
    let token = token_from_env(INSTAGRAM_TOKEN_ENV)?;
    Ok(InstagramSource::connect(config.instagram.clone(), token, subject).await?)
}

async fn connect_source(
    kind: SourceKind,
    config: &ExportConfig,
    subject: &str,
) -> Result<Box<dyn PhotoSource>> {
    let source: Box<dyn PhotoSource> = match kind {
        SourceKind::Vk => Box::new(connect_vk(config, subject).await?),
        SourceKind::Instagram => Box::new(connect_instagram(config, subject).await?),
    };
    Ok(source)
}

async fn connect_sink(kind: SinkKind, config: &ExportConfig) -> Result<Box<dyn PhotoSink>> {
    let manifests = ManifestWriter::new(config.manifest_dir.clone());
    let sink: Box<dyn PhotoSink> = match kind {
        SinkKind::GoogleDrive => {
            let token = token_from_env(GOOGLE_DRIVE_TOKEN_ENV)?;
            Box::new(GoogleDriveSink::connect(config.google_drive.clone(), token, manifests).await?)
        }
        SinkKind::YandexDisk => {
            let token = token_from_env(YANDEX_DISK_TOKEN_ENV)?;
            Box::new(YandexDiskSink::connect(config.yandex_disk.clone(), token, manifests).await?)
        }
    };
    Ok(sink)
}

/// Turns `--group`/`--album-id` into a [`Selection`], looking the album up by id.
pub async fn resolve_selection(
    source: &dyn PhotoSource,
    group: GroupArg,
    album_id: Option<String>,
) -> Result<Selection> {
    match group {
        GroupArg::All => Ok(Selection::All),
        GroupArg::Profile => Ok(Selection::Profile),
        GroupArg::Wall => Ok(Selection::Wall),
        GroupArg::Album => {
            let id = album_id.ok_or_else(|| anyhow!("--album-id is required with --group album"))?;
            let albums = source.fetch_albums().await?;
            if let Some(message) = albums.provider_error {
                bail!("Could not list albums: {message}");
            }
            albums
                .items
                .into_iter()
                .find(|album| album.id == id)
                .map(Selection::Album)
                .ok_or_else(|| anyhow!("{} has no album with id {id}", source.subject_name()))
        }
    }
}

async fn print_albums(source: &dyn PhotoSource) -> Result<()> {
    let albums = source.fetch_albums().await?;
    if let Some(message) = albums.provider_error {
        bail!("Could not list albums: {message}");
    }
    if albums.items.is_empty() {
        println!("{} has no albums", source.subject_name());
    }
    for album in &albums.items {
        println!("{}\t{}", album.id, album.title);
    }
    Ok(())
}

fn print_report(report: &ExportReport, account: &str) {
    for grouping in &report.groupings {
        match &grouping.outcome {
            GroupingOutcome::Completed { files, manifest } => println!(
                "{}: exported {} photo(s) to {} ({}), manifest {}",
                grouping.grouping,
                files.len(),
                grouping.target,
                account,
                manifest.display()
            ),
            GroupingOutcome::Empty {
                provider_error: Some(message),
            } => println!("{}: nothing exported ({message})", grouping.grouping),
            GroupingOutcome::Empty { provider_error: None } => {
                println!("{}: no photos to export", grouping.grouping)
            }
            GroupingOutcome::Failed { transferred, error } => println!(
                "{}: failed after {transferred} photo(s): {error}",
                grouping.grouping
            ),
        }
    }
    println!("Transferred {} photo(s) in total", report.transferred());
}
