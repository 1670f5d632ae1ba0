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

//! # Log Store Module
//!
//! The storage engine behind an error log is not part of Errzip. This module
//! names the paging interface Errzip expects from one, [`EzLogStore`], and
//! ships an in-memory implementation for embedding and tests.
//!
//! - **Memory** ([memory.rs](memory/index.html)): append/prune-capable log held in process

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::Result;
use crate::record::{EzRecord, EzRecordDetail};

pub use memory::EzMemoryErrorLog;

/// Native query interface of an error log store.
///
/// Listings must be stable for the duration of one export: asking for the
/// same page twice during a run returns the same records in the same order.
#[async_trait]
pub trait EzLogStore: Send + Sync {
    /// Human-readable store name used in log output.
    fn name(&self) -> &str;

    /// Lists the summaries on page `page_index`; an empty list past the end.
    async fn get_errors(&self, page_index: usize, page_size: usize) -> Result<Vec<EzRecord>>;

    /// Fetches the full document for `id`, or `None` if it no longer exists.
    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>>;
}

#[async_trait]
impl<S: EzLogStore + ?Sized> EzLogStore for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get_errors(&self, page_index: usize, page_size: usize) -> Result<Vec<EzRecord>> {
        (**self).get_errors(page_index, page_size).await
    }

    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>> {
        (**self).get_error(id).await
    }
}
