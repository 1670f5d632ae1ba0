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

//! # Pager Module
//!
//! Pull-based access to an error log during an export.
//!
//! [`EzLogPager`] yields the record listing one fixed-size page at a time
//! and [`EzDetailFetcher`] loads the full document for a single listed id.
//! [`EzStorePager`] implements both on top of any [`EzLogStore`], adding the
//! cancellation check and the error mapping the archive writer relies on:
//!
//! | store outcome                 | surfaced as    |
//! |-------------------------------|----------------|
//! | token already triggered       | `Cancelled`    |
//! | `get_error` returned `None`   | `NotFound`     |
//! | detail id differs from query  | `StoreFailure` |
//! | any other store error         | `StoreFailure` |
//!
//! Nothing is retried here.

use async_trait::async_trait;

use crate::cancel::EzCancelToken;
use crate::errors::{EzError, Result};
use crate::record::{EzPage, EzRecordDetail};
use crate::store::EzLogStore;

/// Fixed-size page source.
#[async_trait]
pub trait EzLogPager: Send + Sync {
    /// Fetches page `page_index`; an empty page ends the stream.
    async fn fetch_page(
        &self,
        page_index: usize,
        page_size: usize,
        cancel: &EzCancelToken,
    ) -> Result<EzPage>;
}

/// Per-record detail source.
#[async_trait]
pub trait EzDetailFetcher: Send + Sync {
    /// Fetches the detail for `id`; the returned detail carries the same id.
    async fn fetch_detail(&self, id: &str, cancel: &EzCancelToken) -> Result<EzRecordDetail>;
}

/// Pager and detail fetcher backed by an [`EzLogStore`].
#[derive(Debug)]
pub struct EzStorePager<S> {
    store: S,
}

impl<S: EzLogStore> EzStorePager<S> {
    pub fn new(store: S) -> Self {
        EzStorePager { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn store_failure(&self, operation: &str, err: EzError) -> EzError {
        match err {
            EzError::Cancelled { .. } | EzError::NotFound { .. } | EzError::StoreFailure { .. } => {
                err
            }
            other => EzError::store(format!(
                "{} on '{}' failed: {}",
                operation,
                self.store.name(),
                other
            )),
        }
    }
}

#[async_trait]
impl<S: EzLogStore> EzLogPager for EzStorePager<S> {
    async fn fetch_page(
        &self,
        page_index: usize,
        page_size: usize,
        cancel: &EzCancelToken,
    ) -> Result<EzPage> {
        cancel.check()?;
        if page_size == 0 {
            return Err(EzError::validation("page size must be greater than zero"));
        }

        let records = self
            .store
            .get_errors(page_index, page_size)
            .await
            .map_err(|e| self.store_failure("page query", e))?;

        if records.len() > page_size {
            return Err(EzError::store(format!(
                "'{}' returned {} records for a page of {}",
                self.store.name(),
                records.len(),
                page_size
            )));
        }

        Ok(EzPage::new(page_index, records))
    }
}

#[async_trait]
impl<S: EzLogStore> EzDetailFetcher for EzStorePager<S> {
    async fn fetch_detail(&self, id: &str, cancel: &EzCancelToken) -> Result<EzRecordDetail> {
        cancel.check()?;

        let detail = self
            .store
            .get_error(id)
            .await
            .map_err(|e| self.store_failure("detail fetch", e))?
            .ok_or_else(|| EzError::not_found(id))?;

        if detail.id != id {
            return Err(EzError::store(format!(
                "'{}' answered a request for '{}' with entry '{}'",
                self.store.name(),
                id,
                detail.id
            )));
        }

        Ok(detail)
    }
}
