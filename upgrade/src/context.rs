// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-operation context

use tokio_util::sync::CancellationToken;

/// Context supplied with every coordinator operation
///
/// Cancelling the token aborts whatever store call is in flight for
/// operations using this context; they then fail with
/// [`fleet_common::api::external::Error::Cancelled`].
#[derive(Clone, Debug, Default)]
pub struct OpContext {
    cancel: CancellationToken,
}

impl OpContext {
    pub fn new() -> OpContext {
        OpContext::default()
    }

    /// Builds a context that is cancelled along with `cancel`
    ///
    /// Use [`CancellationToken::child_token`] to tie a single request to a
    /// wider shutdown signal.
    pub fn with_cancellation(cancel: CancellationToken) -> OpContext {
        OpContext { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once this context has been cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
