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


//! # Archive Export Module
//!
//! This module turns an error log into a streamed ZIP archive with one XML
//! document per record.
//!
//! ## Module Components
//!
//! - **Xml** ([xml.rs](xml/index.html)): Error document serializer and decoder
//! - **Archive** ([archive.rs](archive/index.html)): Streaming ZIP entry opener
//! - **Writer** ([writer.rs](writer/index.html)): Page → detail → entry orchestration
//! - **Handler** ([handler.rs](handler/index.html)): Inbound trigger, route and response metadata
//!
//! ## Usage Patterns
//!
//! ### Exporting a store
//!
//! ```rust
//! use errzip::export::{export_error_log, EzExportRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let request = EzExportRequest::new(response_body, timeout, disconnect, store);
//! let report = export_error_log(request).await?;
//! ```
//!
//! ### Driving the writer directly
//!
//! ```rust
//! use errzip::export::{EzArchiveWriter, EzXmlSerializer, EzZipArchive};
//!
//! let mut archive = EzZipArchive::new(EzPositionSink::new(out));
//! let stats = EzArchiveWriter::new()
//!     .run(&pager, &pager, &EzXmlSerializer::new(), &mut archive, &cancel)
//!     .await?;
//! archive.finish()?;
//! ```

pub mod xml;
pub mod archive;
pub mod writer;
pub mod handler;

pub use xml::{EzRecordSerializer, EzTextEncoding, EzXmlSerializer};
pub use archive::{entry_name, tidy_entry_id, EzEntryCompression, EzEntryOpener, EzZipArchive};
pub use writer::{
    EzArchiveConfig, EzArchiveWriter, EzExportStats, EzMissingDetailPolicy,
    DEFAULT_FILE_NAME, DEFAULT_PAGE_SIZE,
};
pub use handler::{
    export_error_log, export_with_token, EzArchiveResponse, EzExportReport,
    EzExportRequest, EzExportRoute, ARCHIVE_CONTENT_TYPE,
};
