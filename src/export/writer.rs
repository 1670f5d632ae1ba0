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

//! # Archive Writer Module
//!
//! Drives one export run: page through the log, fetch each listed record's
//! detail, encode it, and write it as one archive entry.
//!
//! The run is strictly sequential. Pages are requested in increasing index
//! order starting at zero and records are written in the order each page
//! lists them, so the archive preserves store order. An empty page ends the
//! run. The cancellation token is checked before every fetch and raced
//! against every fetch while it is pending.
//!
//! Entry writes are plain blocking `std::io::Write` calls. A write cannot be
//! interrupted by the token; a transport that goes away surfaces as an `Io`
//! error from the write itself instead.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::cancel::EzCancelToken;
use crate::errors::{EzError, Result};
use crate::export::archive::{EzEntryCompression, EzEntryOpener};
use crate::export::xml::{EzRecordSerializer, EzTextEncoding};
use crate::pager::{EzDetailFetcher, EzLogPager};
use crate::record::EzRecord;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Suggested download name for the archive.
pub const DEFAULT_FILE_NAME: &str = "errorlog.zip";

/// What to do when a listed record has disappeared by the time its detail
/// is fetched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EzMissingDetailPolicy {
    /// Leave the record out and keep going.
    #[default]
    Skip,
    /// Fail the run with `NotFound`.
    Abort,
}

/// Configuration for an export run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EzArchiveConfig {
    /// Records requested per page. Fixed for the whole run.
    pub page_size: usize,
    /// Text encoding of each entry.
    pub encoding: EzTextEncoding,
    /// Handling of records deleted between listing and detail fetch.
    pub missing_detail: EzMissingDetailPolicy,
    /// Compression applied to each entry.
    pub compression: EzEntryCompression,
    /// Tidy record ids before using them in entry names.
    pub tidy_entry_names: bool,
    /// Suggested download name announced to the caller.
    pub file_name: String,
}

impl Default for EzArchiveConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            encoding: EzTextEncoding::Utf8,
            missing_detail: EzMissingDetailPolicy::Skip,
            compression: EzEntryCompression::Deflated,
            tidy_entry_names: false,
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

impl EzArchiveConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a YAML configuration.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(EzError::validation("page_size must be greater than zero"));
        }
        if self.file_name.trim().is_empty() {
            return Err(EzError::validation("file_name must not be empty"));
        }
        Ok(())
    }
}

/// Counters for one export run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzExportStats {
    /// Page queries issued, including the final empty one.
    pub pages_fetched: usize,
    /// Records listed across all pages.
    pub records_listed: usize,
    /// Entries written and closed.
    pub entries_written: usize,
    /// Records skipped because their detail had disappeared.
    pub records_skipped: usize,
    /// Serialized bytes handed to entries, before compression.
    pub bytes_encoded: u64,
}

/// Export orchestrator.
#[derive(Debug, Default)]
pub struct EzArchiveWriter {
    config: EzArchiveConfig,
    stats: EzExportStats,
}

impl EzArchiveWriter {
    /// Creates a writer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EzArchiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EzArchiveConfig {
        &self.config
    }

    /// Counters of the last run, complete or not.
    pub fn stats(&self) -> &EzExportStats {
        &self.stats
    }

    /// Runs one export.
    ///
    /// On `Cancelled` or any failure the entries closed so far stay in the
    /// archive and [`EzArchiveWriter::stats`] describes them.
    pub async fn run<P, F, S, O>(
        &mut self,
        pager: &P,
        fetcher: &F,
        serializer: &S,
        opener: &mut O,
        cancel: &EzCancelToken,
    ) -> Result<EzExportStats>
    where
        P: EzLogPager + ?Sized,
        F: EzDetailFetcher + ?Sized,
        S: EzRecordSerializer + ?Sized,
        O: EzEntryOpener + ?Sized,
    {
        self.config.validate()?;
        self.stats = EzExportStats::default();
        log::info!(
            "error log export started (page size {}, {:?} on missing detail)",
            self.config.page_size,
            self.config.missing_detail
        );

        match self.run_pages(pager, fetcher, serializer, opener, cancel).await {
            Ok(()) => {
                log::info!(
                    "error log export finished: {} entries from {} pages, {} skipped",
                    self.stats.entries_written,
                    self.stats.pages_fetched,
                    self.stats.records_skipped
                );
                Ok(self.stats.clone())
            }
            Err(err) if err.is_cancellation() => {
                log::info!(
                    "error log export stopped after {} entries: {}",
                    self.stats.entries_written,
                    err
                );
                Err(err)
            }
            Err(err) => {
                log::error!(
                    "error log export failed after {} entries: {}",
                    self.stats.entries_written,
                    err
                );
                Err(err)
            }
        }
    }

    async fn run_pages<P, F, S, O>(
        &mut self,
        pager: &P,
        fetcher: &F,
        serializer: &S,
        opener: &mut O,
        cancel: &EzCancelToken,
    ) -> Result<()>
    where
        P: EzLogPager + ?Sized,
        F: EzDetailFetcher + ?Sized,
        S: EzRecordSerializer + ?Sized,
        O: EzEntryOpener + ?Sized,
    {
        let page_size = self.config.page_size;

        for page_index in 0.. {
            cancel.check()?;
            let page = cancel
                .run_until_cancelled(pager.fetch_page(page_index, page_size, cancel))
                .await?;
            self.stats.pages_fetched += 1;

            if page.is_empty() {
                log::debug!("page {} is empty, end of log", page_index);
                break;
            }
            log::debug!("page {} listed {} records", page_index, page.len());
            self.stats.records_listed += page.len();

            for record in page {
                cancel.check()?;
                self.export_record(&record, fetcher, serializer, opener, cancel)
                    .await?;
            }
        }

        Ok(())
    }

    async fn export_record<F, S, O>(
        &mut self,
        record: &EzRecord,
        fetcher: &F,
        serializer: &S,
        opener: &mut O,
        cancel: &EzCancelToken,
    ) -> Result<()>
    where
        F: EzDetailFetcher + ?Sized,
        S: EzRecordSerializer + ?Sized,
        O: EzEntryOpener + ?Sized,
    {
        let fetched = cancel
            .run_until_cancelled(fetcher.fetch_detail(&record.id, cancel))
            .await;
        let detail = match fetched {
            Ok(detail) => detail,
            Err(EzError::NotFound { id })
                if self.config.missing_detail == EzMissingDetailPolicy::Skip =>
            {
                log::warn!("error log entry {} disappeared before export, skipping", id);
                self.stats.records_skipped += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        cancel.check()?;

        // Encode before opening so a failed encode leaves no empty entry.
        let bytes = serializer.encode(&detail, self.config.encoding)?;

        blocking_write(|| -> Result<()> {
            let mut entry = opener.open_entry(record)?;
            entry.write_all(&bytes)?;
            Ok(())
        })?;

        self.stats.entries_written += 1;
        self.stats.bytes_encoded += bytes.len() as u64;
        log::trace!("exported error log entry {}", record.id);
        Ok(())
    }
}

/// Runs a blocking sink write without stalling other tasks on the worker.
///
/// On a multi-threaded runtime the worker hands its other tasks off for the
/// duration of `f`. A current-thread runtime has nowhere to hand them, so `f`
/// runs inline there.
fn blocking_write<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
