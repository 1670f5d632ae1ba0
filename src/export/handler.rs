//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Errzip.
//! The Errzip project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Export Handler Module
//!
//! The inbound trigger of an export. A host that has already decided to serve
//! the error log download calls [`export_error_log`] with the response stream,
//! its two cancellation sources and the store; everything else is wired here.
//!
//! [`EzExportRoute`] describes when a host should make that call and
//! [`EzArchiveResponse`] what it should announce before the first byte.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cancel::EzCancelToken;
use crate::errors::Result;
use crate::export::archive::EzZipArchive;
use crate::export::writer::{EzArchiveConfig, EzArchiveWriter, EzExportStats};
use crate::export::xml::EzXmlSerializer;
use crate::pager::EzStorePager;
use crate::sink::EzPositionSink;
use crate::store::EzLogStore;

/// Content type of the archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Response metadata for an archive download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzArchiveResponse {
    pub content_type: String,
    pub content_disposition: String,
}

impl EzArchiveResponse {
    pub fn for_file(file_name: &str) -> Self {
        EzArchiveResponse {
            content_type: ARCHIVE_CONTENT_TYPE.to_string(),
            content_disposition: format!("attachment; filename={}", file_name),
        }
    }

    pub fn from_config(config: &EzArchiveConfig) -> Self {
        Self::for_file(&config.file_name)
    }
}

/// When a host should dispatch to the exporter.
///
/// A request qualifies when the caller is authenticated and any `/`-separated
/// segment of its path equals one of `segments` exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzExportRoute {
    pub segments: Vec<String>,
    pub require_authenticated: bool,
}

impl Default for EzExportRoute {
    fn default() -> Self {
        EzExportRoute {
            segments: vec!["eldump".to_string(), "eldump.axd".to_string()],
            require_authenticated: true,
        }
    }
}

impl EzExportRoute {
    /// `path` is the request path without its query string.
    pub fn matches(&self, path: &str, authenticated: bool) -> bool {
        if self.require_authenticated && !authenticated {
            return false;
        }
        path.split('/')
            .any(|segment| self.segments.iter().any(|s| s == segment))
    }
}

/// Inputs of one export run.
pub struct EzExportRequest<W: Write, S: EzLogStore> {
    /// Destination stream. Only ever written forward.
    pub destination: W,
    /// Fires when the caller's deadline elapses.
    pub timeout: CancellationToken,
    /// Fires when the destination transport goes away.
    pub disconnect: CancellationToken,
    pub store: S,
    pub config: EzArchiveConfig,
}

impl<W: Write, S: EzLogStore> EzExportRequest<W, S> {
    /// Request with default configuration.
    pub fn new(
        destination: W,
        timeout: CancellationToken,
        disconnect: CancellationToken,
        store: S,
    ) -> Self {
        EzExportRequest {
            destination,
            timeout,
            disconnect,
            store,
            config: EzArchiveConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EzArchiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn response(&self) -> EzArchiveResponse {
        EzArchiveResponse::from_config(&self.config)
    }
}

/// Outcome of a completed export.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzExportReport {
    pub stats: EzExportStats,
    /// Archive bytes delivered to the destination.
    pub bytes_written: u64,
}

/// Streams the whole error log into `request.destination` as a ZIP archive.
pub async fn export_error_log<W: Write, S: EzLogStore>(
    request: EzExportRequest<W, S>,
) -> Result<EzExportReport> {
    let cancel = EzCancelToken::new(request.timeout, request.disconnect);
    export_with_token(
        request.destination,
        request.store,
        request.config,
        &cancel,
    )
    .await
}

/// Like [`export_error_log`] with an already merged token.
///
/// When the run fails the central directory is still written, best effort,
/// so the destination holds a valid archive of the entries closed so far.
/// The exception is a destination that rejected a write: its last entry may
/// be incomplete, so no directory is written and no partial entry is listed.
/// A failure while closing is logged and the run's own error is returned.
pub async fn export_with_token<W: Write, S: EzLogStore>(
    destination: W,
    store: S,
    config: EzArchiveConfig,
    cancel: &EzCancelToken,
) -> Result<EzExportReport> {
    config.validate()?;

    let pager = EzStorePager::new(store);
    let serializer = EzXmlSerializer::new();
    let mut archive = EzZipArchive::new(EzPositionSink::new(destination))
        .with_compression(config.compression)
        .with_tidy_names(config.tidy_entry_names);
    let mut writer = EzArchiveWriter::new().with_config(config);

    log::debug!("exporting error log from '{}'", pager.store().name());
    let outcome = writer
        .run(&pager, &pager, &serializer, &mut archive, cancel)
        .await;

    match outcome {
        Ok(stats) => {
            let bytes_written = archive.finish()?;
            Ok(EzExportReport {
                stats,
                bytes_written,
            })
        }
        Err(err) => {
            let entries = archive.entries();
            match archive.finish() {
                Ok(bytes) => log::debug!(
                    "partial archive closed with {} entries, {} bytes",
                    entries,
                    bytes
                ),
                Err(finish_err) => {
                    log::warn!("could not close partial archive: {}", finish_err)
                }
            }
            Err(err)
        }
    }
}
