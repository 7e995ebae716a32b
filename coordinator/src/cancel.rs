//! Cancellation for coordinator operations.
//!
//! A [`CancelSource`] broadcasts a one-shot cancel through a
//! `tokio::sync::watch` channel. Operations hold a [`Cancellation`] and race
//! every suspension point against it, so a cancel takes effect at the next
//! ledger or encryption call. Tokens from several sources can be combined:
//! an operation started by a session stops on either its own cancel or the
//! session's disconnect.

use std::future::Future;
use std::time::Duration;

use futures_util::future::select_all;
use tokio::sync::watch;

use crate::CoordinatorError;

/// Owner side of a cancel signal.
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Get a token that observes this source.
    pub fn token(&self) -> Cancellation {
        Cancellation {
            signals: vec![self.tx.subscribe()],
        }
    }

    /// Cancel every operation holding a token from this source.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of one or more cancel signals. The default token never fires.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    signals: Vec<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    /// A token that fires when either `self` or `other` fires.
    pub fn or(mut self, other: &Cancellation) -> Self {
        self.signals.extend(other.signals.iter().cloned());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.iter().any(|rx| *rx.borrow())
    }

    /// Resolves once any underlying source is cancelled.
    ///
    /// A source that is dropped without cancelling never fires.
    pub async fn cancelled(&self) {
        if self.signals.is_empty() {
            return std::future::pending().await;
        }
        let waits = self.signals.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    /// Run `fut` to completion unless cancelled first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, CoordinatorError> {
        if self.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(CoordinatorError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// Await a confirmation, bounded by `timeout` (if any) and by `cancel`.
pub(crate) async fn bounded<F: Future>(
    fut: F,
    cancel: &Cancellation,
    timeout: Option<Duration>,
) -> Result<F::Output, CoordinatorError> {
    match timeout {
        Some(limit) => cancel
            .run(tokio::time::timeout(limit, fut))
            .await?
            .map_err(|_| CoordinatorError::Timeout(limit)),
        None => cancel.run(fut).await,
    }
}
