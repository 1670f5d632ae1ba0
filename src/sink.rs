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

//! # Forward-Only Sink Module
//!
//! Archive writers like to know how many bytes they have emitted so far, and
//! some query the destination with `Seek` to find out. A live response stream
//! cannot seek. [`EzPositionSink`] sits in between: it forwards writes to the
//! wrapped stream, counts what the stream accepted, and answers position
//! queries from that count while refusing every operation that would need real
//! random access.
//!
//! The cursor can also be observed through an [`EzSinkCursor`] handle, which
//! stays readable after the sink itself has been handed to an archive writer.
//! Neither the handle nor the sink offers a way to set it.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Read-only view of a sink's virtual cursor.
#[derive(Clone, Debug, Default)]
pub struct EzSinkCursor(Arc<AtomicU64>);

impl EzSinkCursor {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn advance(&self, by: u64) {
        self.0.fetch_add(by, Ordering::AcqRel);
    }
}

/// Write-only adapter that tracks a virtual cursor over a non-seekable stream.
#[derive(Debug)]
pub struct EzPositionSink<W: Write> {
    inner: W,
    cursor: EzSinkCursor,
}

impl<W: Write> EzPositionSink<W> {
    /// Wraps `inner`; the cursor starts at zero.
    pub fn new(inner: W) -> Self {
        EzPositionSink {
            inner,
            cursor: EzSinkCursor::default(),
        }
    }

    /// Number of bytes the wrapped stream has accepted through this adapter.
    pub fn position(&self) -> u64 {
        self.cursor.get()
    }

    /// Shared handle onto the cursor.
    pub fn cursor(&self) -> EzSinkCursor {
        self.cursor.clone()
    }

    /// Always false: positions can be reported but never restored.
    pub fn is_seekable(&self) -> bool {
        false
    }

    /// Length is unknowable on a forward-only stream.
    pub fn len(&self) -> io::Result<u64> {
        Err(unsupported("length query"))
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consumes the adapter and returns the wrapped stream.
    pub fn into_inner(self) -> W {
        log::debug!("forward-only sink closed at byte {}", self.position());
        self.inner
    }
}

impl<W: Write> Write for EzPositionSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Advance only by what the stream reports as accepted.
        let written = self.inner.write(buf)?;
        self.cursor.advance(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Read for EzPositionSink<W> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(unsupported("read"))
    }
}

impl<W: Write> Seek for EzPositionSink<W> {
    /// Answers position queries; rejects anything that would move the cursor.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.position();
        match pos {
            SeekFrom::Current(0) => Ok(position),
            SeekFrom::Start(offset) if offset == position => Ok(position),
            SeekFrom::End(_) => Err(unsupported("length query")),
            _ => Err(unsupported("seek")),
        }
    }
}

fn unsupported(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} is not supported on a forward-only sink", operation),
    )
}
