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

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::{EzError, Result};
use crate::record::{EzErrorPayload, EzRecord, EzRecordDetail};
use crate::store::EzLogStore;

/// In-process error log.
///
/// Entries are listed newest first. Appends and prunes may run concurrently
/// with an export; each page query sees a consistent snapshot of the log.
#[derive(Debug)]
pub struct EzMemoryErrorLog {
    name: String,
    // Oldest entry first; listings walk it in reverse.
    entries: RwLock<Vec<EzRecordDetail>>,
    next_id: AtomicU64,
}

impl EzMemoryErrorLog {
    pub fn new(name: impl Into<String>) -> Self {
        EzMemoryErrorLog {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Appends `payload` under a generated id and returns that id.
    pub async fn log(&self, payload: EzErrorPayload) -> String {
        let id = format!("{:016x}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .await
            .push(EzRecordDetail::new(id.clone(), payload));
        id
    }

    /// Appends `payload` under a caller-chosen id.
    pub async fn log_with_id(&self, id: impl Into<String>, payload: EzErrorPayload) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(EzError::validation("error log ids must not be empty"));
        }

        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == id) {
            return Err(EzError::validation(format!("duplicate error log id '{}'", id)));
        }
        entries.push(EzRecordDetail::new(id, payload));
        Ok(())
    }

    /// Prunes the entry with `id`; returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for EzMemoryErrorLog {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl EzLogStore for EzMemoryErrorLog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_errors(&self, page_index: usize, page_size: usize) -> Result<Vec<EzRecord>> {
        let Some(skip) = page_index.checked_mul(page_size) else {
            return Ok(Vec::new());
        };

        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .skip(skip)
            .take(page_size)
            .map(EzRecordDetail::summary)
            .collect())
    }

    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }
}
