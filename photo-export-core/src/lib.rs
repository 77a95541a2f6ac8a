#![doc = "photo-export-core: the export pipeline behind photo-export."]

//! Normalizes photo listings from VKontakte and Instagram into uniform
//! [`contract::PhotoRecord`]s and transfers them into Google Drive or Yandex
//! Disk, writing a metadata manifest per exported grouping.
//!
//! # Usage
//! Bind a source (`source::VkSource`, `source::InstagramSource`) and a sink
//! (`sink::GoogleDriveSink`, `sink::YandexDiskSink`), then drive them with
//! [`export::Exporter`].

pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod manifest;
pub mod normalize;
pub mod sink;
pub mod source;

pub use error::{ExportError, Result};
