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

//! # Archive Target Module
//!
//! Opens one named entry per exported record inside a ZIP container that is
//! written straight into a forward-only sink.
//!
//! The container is written in streaming mode: every entry is followed by a
//! data descriptor instead of having its local header patched afterwards, and
//! the central directory goes out once, when [`EzZipArchive::finish`] runs.
//! Nothing already written is ever revisited, so the destination never needs
//! to seek.
//!
//! Entry names are unique within one archive. A record whose name is already
//! taken (two ids that tidy to the same text, or an id listed twice) gets a
//! numeric suffix.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{Datelike, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use zip::write::{SimpleFileOptions, StreamWriter};
use zip::{CompressionMethod, ZipWriter};

use crate::errors::{EzError, Result};
use crate::record::EzRecord;
use crate::sink::{EzPositionSink, EzSinkCursor};

/// Compression applied to each entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EzEntryCompression {
    /// Entries are stored as-is.
    Stored,
    /// Entries are deflate-compressed.
    #[default]
    Deflated,
}

impl EzEntryCompression {
    fn method(self) -> CompressionMethod {
        match self {
            EzEntryCompression::Stored => CompressionMethod::Stored,
            EzEntryCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Opens archive entries for records.
///
/// The returned handle is scoped: dropping it closes the entry, including
/// when a write into it failed, so the container bookkeeping stays
/// consistent for whatever comes next.
pub trait EzEntryOpener {
    fn open_entry(&mut self, record: &EzRecord) -> Result<Box<dyn Write + '_>>;
}

/// Archive entry name for a record id: `error-<id>.xml`.
pub fn entry_name(id: &str) -> String {
    format!("error-{}.xml", id)
}

/// Replaces every character outside `[A-Za-z0-9-]` with `-` and collapses
/// runs of `-`.
pub fn tidy_entry_id(id: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    static RUNS: OnceLock<Regex> = OnceLock::new();

    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\-]").expect("valid pattern"));
    let dash_runs = RUNS.get_or_init(|| Regex::new(r"-{2,}").expect("valid pattern"));

    let replaced = unsafe_chars.replace_all(id, "-");
    dash_runs.replace_all(&replaced, "-").into_owned()
}

/// ZIP container written in streaming mode into an [`EzPositionSink`].
///
/// Once the destination rejects a write the archive is considered broken:
/// no further entry can be opened and [`EzZipArchive::finish`] does not write
/// a central directory, so an entry the destination only partly received is
/// never listed.
pub struct EzZipArchive<W: Write> {
    zip: ZipWriter<StreamWriter<EzArchiveOutput<W>>>,
    cursor: EzSinkCursor,
    failed: Arc<AtomicBool>,
    compression: EzEntryCompression,
    tidy_names: bool,
    names: HashSet<String>,
    entries: usize,
}

impl<W: Write> EzZipArchive<W> {
    /// Starts an archive over `sink`. Nothing is written until the first
    /// entry is opened.
    pub fn new(sink: EzPositionSink<W>) -> Self {
        let cursor = sink.cursor();
        let failed = Arc::new(AtomicBool::new(false));
        let output = EzArchiveOutput {
            sink,
            failed: failed.clone(),
        };
        EzZipArchive {
            zip: ZipWriter::new_stream(output),
            cursor,
            failed,
            compression: EzEntryCompression::default(),
            tidy_names: false,
            names: HashSet::new(),
            entries: 0,
        }
    }

    pub fn with_compression(mut self, compression: EzEntryCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Tidies record ids before they are used in entry names.
    pub fn with_tidy_names(mut self, tidy: bool) -> Self {
        self.tidy_names = tidy;
        self
    }

    /// Entries opened so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Bytes delivered to the destination so far.
    pub fn bytes_written(&self) -> u64 {
        self.cursor.get()
    }

    /// Whether the destination has rejected a write.
    pub fn destination_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Preferred name for the entry of `record`.
    ///
    /// The entry gets a `-2`, `-3`, ... suffix instead when an earlier entry
    /// of this archive already took the name.
    pub fn name_for(&self, record: &EzRecord) -> String {
        entry_name(&self.entry_id(record))
    }

    /// Writes the central directory and flushes the destination.
    ///
    /// Returns the total number of bytes delivered. Fails without writing
    /// the directory when the destination rejected a write earlier.
    pub fn finish(self) -> Result<u64> {
        if self.destination_failed() {
            // Output is latched, so this only settles the writer's state.
            let _ = self.zip.finish();
            log::debug!(
                "destination failed after {} bytes, central directory not written",
                self.cursor.get()
            );
            return Err(EzError::Io(format!(
                "destination failed after {} bytes; archive left without a central directory",
                self.cursor.get()
            )));
        }

        let mut inner = self.zip.finish()?;
        inner.flush()?;
        log::debug!(
            "archive finished with {} entries, {} bytes",
            self.entries,
            self.cursor.get()
        );
        Ok(self.cursor.get())
    }

    fn entry_id(&self, record: &EzRecord) -> String {
        if self.tidy_names {
            tidy_entry_id(&record.id)
        } else {
            record.id.clone()
        }
    }

    fn claim_name(&mut self, record: &EzRecord) -> String {
        let id = self.entry_id(record);
        let mut name = entry_name(&id);
        let mut suffix = 2;
        while self.names.contains(&name) {
            name = entry_name(&format!("{}-{}", id, suffix));
            suffix += 1;
        }
        if suffix > 2 {
            log::debug!("entry name for {} taken, using {}", record.id, name);
        }
        self.names.insert(name.clone());
        name
    }

    fn file_options(&self, record: &EzRecord) -> SimpleFileOptions {
        let options = SimpleFileOptions::default().compression_method(self.compression.method());
        match record.time.and_then(zip_time) {
            Some(time) => options.last_modified_time(time),
            None => options,
        }
    }
}

/// ZIP timestamps cover 1980 to 2107; anything else keeps the default.
fn zip_time(time: chrono::DateTime<chrono::Utc>) -> Option<zip::DateTime> {
    let year = u16::try_from(time.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second().min(59) as u8,
    )
    .ok()
}

impl<W: Write> EzEntryOpener for EzZipArchive<W> {
    fn open_entry(&mut self, record: &EzRecord) -> Result<Box<dyn Write + '_>> {
        if self.destination_failed() {
            return Err(EzError::Io(destination_failed().to_string()));
        }
        let name = self.claim_name(record);
        let options = self.file_options(record);
        self.zip.start_file(name.clone(), options)?;
        self.entries += 1;
        Ok(Box::new(EzZipEntry {
            zip: &mut self.zip,
            failed: &self.failed,
            name,
            written: 0,
        }))
    }
}

/// Archive-side view of the destination.
///
/// The first failed write latches `failed`; everything the ZIP writer emits
/// afterwards is dropped. The writer's own cleanup therefore cannot append a
/// central directory behind a half-written entry.
struct EzArchiveOutput<W: Write> {
    sink: EzPositionSink<W>,
    failed: Arc<AtomicBool>,
}

impl<W: Write> EzArchiveOutput<W> {
    fn latch(&self, err: io::Error) -> io::Error {
        if err.kind() != io::ErrorKind::Interrupted {
            self.failed.store(true, Ordering::Release);
        }
        err
    }
}

impl<W: Write> Write for EzArchiveOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed.load(Ordering::Acquire) {
            return Ok(buf.len());
        }
        self.sink.write(buf).map_err(|e| self.latch(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.failed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.sink.flush().map_err(|e| self.latch(e))
    }
}

fn destination_failed() -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        "archive destination failed earlier",
    )
}

/// Open entry handle. The container closes the entry when the next one is
/// started or the archive is finished; dropping the handle ends the caller's
/// access to it.
struct EzZipEntry<'a, W: Write> {
    zip: &'a mut ZipWriter<StreamWriter<EzArchiveOutput<W>>>,
    failed: &'a AtomicBool,
    name: String,
    written: u64,
}

impl<W: Write> Write for EzZipEntry<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failed.load(Ordering::Acquire) {
            return Err(destination_failed());
        }
        let n = self.zip.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.failed.load(Ordering::Acquire) {
            return Err(destination_failed());
        }
        self.zip.flush()
    }
}

impl<W: Write> Drop for EzZipEntry<'_, W> {
    fn drop(&mut self) {
        log::trace!("closed entry {} ({} bytes)", self.name, self.written);
    }
}
