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

//! # Errzip Record Module
//!
//! Data structures for error log entries as they move through an export.
//!
//! A page query lists [`EzRecord`] summaries only. The full error document,
//! [`EzErrorPayload`], is fetched separately per record as an
//! [`EzRecordDetail`] so that paging stays cheap regardless of how large the
//! individual documents are.
//!
//! ## Usage Example
//!
//! ```rust
//! use chrono::Utc;
//! use errzip::record::{EzErrorPayload, EzRecordDetail};
//!
//! let mut payload = EzErrorPayload::new("System.InvalidOperationException", Utc::now());
//! payload.message = Some("Sequence contains no elements".into());
//! payload.server_variables.push("REMOTE_ADDR", "10.0.0.7");
//!
//! let detail = EzRecordDetail::new("3f2a", payload);
//! let summary = detail.summary();
//! assert_eq!(summary.id, "3f2a");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary-level log entry as returned by a page query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzRecord {
    /// Opaque identifier, unique and stable within one store.
    pub id: String,
    /// Exception or error type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Short error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Host that logged the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Time the error was logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

impl EzRecord {
    /// Constructs a summary carrying only an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        EzRecord {
            id: id.into(),
            type_name: None,
            message: None,
            host: None,
            time: None,
        }
    }
}

/// Ordered name/value collection.
///
/// Names may repeat (a query string can carry the same key twice) and the
/// original order is significant, so this is a list of pairs rather than a
/// map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EzNameValues(pub Vec<(String, String)>);

impl EzNameValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pair, keeping any earlier pair with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value recorded under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for EzNameValues {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        EzNameValues(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

/// Full error document for one log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzErrorPayload {
    /// Application that raised the error.
    pub application: Option<String>,
    /// Host that logged the error.
    pub host: Option<String>,
    /// Exception or error type name.
    pub type_name: String,
    /// Short error message.
    pub message: Option<String>,
    /// Component or assembly that raised the error.
    pub source: Option<String>,
    /// Full diagnostic text, typically a stack trace.
    pub detail: Option<String>,
    /// Authenticated user at the time of the error.
    pub user: Option<String>,
    /// Time the error was logged.
    pub time: DateTime<Utc>,
    /// HTTP status code associated with the error, if any.
    pub status_code: Option<u16>,
    /// Error page rendered by the web host, if captured.
    pub web_host_html_message: Option<String>,
    /// Server variables captured with the request.
    #[serde(default)]
    pub server_variables: EzNameValues,
    /// Query string parameters.
    #[serde(default)]
    pub query_string: EzNameValues,
    /// Posted form fields.
    #[serde(default)]
    pub form: EzNameValues,
    /// Request cookies.
    #[serde(default)]
    pub cookies: EzNameValues,
}

impl EzErrorPayload {
    /// Constructs a payload with only the required fields populated.
    pub fn new(type_name: impl Into<String>, time: DateTime<Utc>) -> Self {
        EzErrorPayload {
            application: None,
            host: None,
            type_name: type_name.into(),
            message: None,
            source: None,
            detail: None,
            user: None,
            time,
            status_code: None,
            web_host_html_message: None,
            server_variables: EzNameValues::new(),
            query_string: EzNameValues::new(),
            form: EzNameValues::new(),
            cookies: EzNameValues::new(),
        }
    }
}

/// Full payload fetched for one listed record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EzRecordDetail {
    /// Identifier of the record this detail belongs to.
    pub id: String,
    pub payload: EzErrorPayload,
}

impl EzRecordDetail {
    pub fn new(id: impl Into<String>, payload: EzErrorPayload) -> Self {
        EzRecordDetail {
            id: id.into(),
            payload,
        }
    }

    /// Derives the page-listing summary for this detail.
    pub fn summary(&self) -> EzRecord {
        EzRecord {
            id: self.id.clone(),
            type_name: Some(self.payload.type_name.clone()),
            message: self.payload.message.clone(),
            host: self.payload.host.clone(),
            time: Some(self.payload.time),
        }
    }
}

/// One bounded batch of record summaries.
///
/// An empty page is the only end-of-stream signal; no total count is known
/// ahead of time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EzPage {
    /// Zero-based index this page was requested with.
    pub index: usize,
    pub records: Vec<EzRecord>,
}

impl EzPage {
    pub fn new(index: usize, records: Vec<EzRecord>) -> Self {
        EzPage { index, records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl IntoIterator for EzPage {
    type Item = EzRecord;
    type IntoIter = std::vec::IntoIter<EzRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
