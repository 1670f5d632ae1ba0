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


//! # Errzip Core Library
//!
//! Errzip streams the contents of an error log to a client as a single ZIP
//! archive, one XML document per logged error, without buffering the archive
//! and without ever seeking the destination.
//!
//! ## Module Overview
//!
//! - **errors**: EzError and the crate Result alias
//! - **record**: Record summaries, error payloads and pages
//! - **store**: Log store interface and an in-memory store
//! - **pager**: Page and detail access over a store
//! - **sink**: Forward-only destination adapter with a virtual cursor
//! - **cancel**: Merged timeout/disconnect cancellation token
//! - **export**: XML serializer, ZIP target, archive writer and the handler
//!
//! ## Quick Start
//!
//! ```rust
//! use errzip::{export_error_log, EzExportRequest, EzMemoryErrorLog};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = EzMemoryErrorLog::default();
//! let request = EzExportRequest::new(
//!     std::fs::File::create("errorlog.zip")?,
//!     CancellationToken::new(),
//!     CancellationToken::new(),
//!     store,
//! );
//! let report = export_error_log(request).await?;
//! ```
//!
//! ## Architecture
//!
//! Data flows in one direction:
//! 1. **Pager**: lists records a page at a time until an empty page
//! 2. **Detail Fetcher**: loads each listed record
//! 3. **Serializer**: encodes the record as an XML document
//! 4. **Archive**: writes the document as entry `error-<id>.xml`
//! 5. **Sink**: forwards archive bytes to the transport
//!
//! ## Error Handling
//!
//! All operations return `Result<T, EzError>`. Cancellation and transport
//! failures end a run but leave the entries written so far in place.

#![allow(non_snake_case)]

pub mod errors;
pub mod record;
pub mod store;
pub mod pager;
pub mod sink;
pub mod cancel;
pub mod export;

pub use errors::{EzError, Result};
pub use record::{EzErrorPayload, EzNameValues, EzPage, EzRecord, EzRecordDetail};
pub use store::{EzLogStore, EzMemoryErrorLog};
pub use pager::{EzDetailFetcher, EzLogPager, EzStorePager};
pub use sink::{EzPositionSink, EzSinkCursor};
pub use cancel::{spawn_deadline, EzCancelReason, EzCancelToken};
pub use export::{
    export_error_log, export_with_token, EzArchiveConfig, EzArchiveResponse, EzArchiveWriter,
    EzEntryCompression, EzEntryOpener, EzExportReport, EzExportRequest, EzExportRoute,
    EzExportStats, EzMissingDetailPolicy, EzRecordSerializer, EzTextEncoding, EzXmlSerializer,
    EzZipArchive,
};
