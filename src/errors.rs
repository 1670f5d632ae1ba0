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

//! # Errzip Error Module
//!
//! This module defines the error type shared by every stage of an export run.
//!
//! ## Error Categories
//!
//! - **Cancelled**: a timeout, disconnect or explicit stop ended the run
//! - **StoreFailure**: the log store failed while paging or fetching detail
//! - **NotFound**: a listed record vanished before its detail was fetched
//! - **Io**: the destination stream rejected a write
//! - **Unsupported**: a read or seek was attempted on a forward-only sink
//! - **Validation**: invalid configuration or arguments
//! - **Serde**: XML, JSON or YAML encoding failures
//! - **Zip**: ZIP container failures
//! - **Internal**: unexpected internal failures
//!
//! ## Control Flow
//!
//! Only `NotFound` is ever recovered from inside a run, and only when the
//! missing-detail policy says to skip. Everything else aborts the run; `Io`
//! is treated like `Cancelled` because the transport behind a failed write is
//! usually already gone.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

/// Convenience result type used throughout Errzip.
pub type Result<T> = std::result::Result<T, EzError>;

/// Canonical error enumeration for Errzip.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum EzError {
    /// The run was stopped by one of its cancellation sources.
    #[error("export cancelled: {reason}")]
    Cancelled { reason: String },

    /// Paging or detail retrieval failed inside the log store.
    #[error("log store failure: {message}")]
    StoreFailure { message: String },

    /// The record was listed but no longer exists in the store.
    #[error("error log entry '{id}' not found")]
    NotFound { id: String },

    /// Errors originating from the destination stream.
    #[error("io error: {0}")]
    Io(String),

    /// Operation not available on a forward-only sink.
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Validation errors triggered by invalid parameters or inputs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Wrapper for serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors originating from ZIP container operations.
    #[error("zip error: {0}")]
    Zip(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for EzError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Unsupported => EzError::Unsupported {
                operation: err.to_string(),
            },
            _ => EzError::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for EzError {
    fn from(err: serde_json::Error) -> Self {
        EzError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for EzError {
    fn from(err: serde_yaml::Error) -> Self {
        EzError::Serde(err.to_string())
    }
}

impl From<quick_xml::Error> for EzError {
    fn from(err: quick_xml::Error) -> Self {
        EzError::Serde(err.to_string())
    }
}

impl From<ZipError> for EzError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(io_err) => EzError::from(io_err),
            other => EzError::Zip(other.to_string()),
        }
    }
}

impl EzError {
    /// Helper to construct cancellation errors.
    pub fn cancelled<T: Into<String>>(reason: T) -> Self {
        EzError::Cancelled {
            reason: reason.into(),
        }
    }

    /// Helper to construct store failures.
    pub fn store<T: Into<String>>(message: T) -> Self {
        EzError::StoreFailure {
            message: message.into(),
        }
    }

    /// Helper to construct missing-record errors.
    pub fn not_found<T: Into<String>>(id: T) -> Self {
        EzError::NotFound { id: id.into() }
    }

    /// Helper to construct unsupported-operation errors.
    pub fn unsupported<T: Into<String>>(operation: T) -> Self {
        EzError::Unsupported {
            operation: operation.into(),
        }
    }

    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        EzError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        EzError::Internal(message.into())
    }

    /// True for outcomes that end a run without being an application fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EzError::Cancelled { .. })
    }

    /// True when the run stopped because the destination went away.
    ///
    /// Cancellations and write failures share this path: the run aborts,
    /// closed entries stay in the output and nothing is retried.
    pub fn is_terminal_transport(&self) -> bool {
        matches!(self, EzError::Cancelled { .. } | EzError::Io(_))
    }
}
