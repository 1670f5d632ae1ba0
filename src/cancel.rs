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

//! # Cancellation Module
//!
//! An export run listens to two signals it does not own: the caller giving up
//! (request timeout) and the destination transport going away (client
//! disconnect). [`EzCancelToken`] merges both with a run-local stop switch
//! into a single token that the archive writer checks before every fetch and
//! races against every fetch while it is in flight.
//!
//! Once any source fires the token stays triggered for the rest of the run.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::{EzError, Result};

/// Which source triggered a cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EzCancelReason {
    /// The caller's processing deadline elapsed.
    TimedOut,
    /// The destination transport disconnected.
    Disconnected,
    /// The run was stopped explicitly.
    Stopped,
}

impl EzCancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EzCancelReason::TimedOut => "request timed out",
            EzCancelReason::Disconnected => "client disconnected",
            EzCancelReason::Stopped => "export stopped",
        }
    }

    pub fn into_error(self) -> EzError {
        EzError::cancelled(self.as_str())
    }
}

/// Merged cancellation token for one export run.
#[derive(Clone, Debug)]
pub struct EzCancelToken {
    timeout: CancellationToken,
    disconnect: CancellationToken,
    stop: CancellationToken,
}

impl EzCancelToken {
    /// Links the caller-timeout and transport-disconnect signals.
    pub fn new(timeout: CancellationToken, disconnect: CancellationToken) -> Self {
        EzCancelToken {
            timeout,
            disconnect,
            stop: CancellationToken::new(),
        }
    }

    /// A token whose external sources are held by nobody.
    ///
    /// Only [`EzCancelToken::stop`] can trigger it.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), CancellationToken::new())
    }

    /// Stops the run. Irreversible.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// The first triggered source, if any.
    pub fn reason(&self) -> Option<EzCancelReason> {
        if self.timeout.is_cancelled() {
            Some(EzCancelReason::TimedOut)
        } else if self.disconnect.is_cancelled() {
            Some(EzCancelReason::Disconnected)
        } else if self.stop.is_cancelled() {
            Some(EzCancelReason::Stopped)
        } else {
            None
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Fails with `Cancelled` when any source has fired.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(reason.into_error()),
            None => Ok(()),
        }
    }

    /// Resolves once any source fires.
    pub async fn cancelled(&self) -> EzCancelReason {
        tokio::select! {
            biased;
            _ = self.timeout.cancelled() => EzCancelReason::TimedOut,
            _ = self.disconnect.cancelled() => EzCancelReason::Disconnected,
            _ = self.stop.cancelled() => EzCancelReason::Stopped,
        }
    }

    /// Drives `fut` to completion unless the token fires first.
    ///
    /// A token that is already triggered never polls `fut`. When the token
    /// and `fut` are ready together the cancellation wins.
    pub async fn run_until_cancelled<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason.into_error()),
            out = fut => out,
        }
    }
}

/// Cancels `token` once `after` has elapsed.
///
/// Hosts that only know a deadline use this to produce the timeout signal.
/// Aborting the returned handle disarms the deadline.
pub fn spawn_deadline(token: CancellationToken, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(after) => {
                log::debug!("export deadline of {:?} elapsed", after);
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
