//! The single visible transaction status and its timed dismissal.
//!
//! State machine: `Idle -> Pending -> {Success, Error} -> Idle`. Success and
//! error states schedule a dismissal back to idle; setting any new status
//! aborts the scheduled dismissal first, so an old timer can never hide a
//! newer status. Observers either poll [`TransactionStatusMachine::current`]
//! or hold a `watch` receiver from [`TransactionStatusMachine::subscribe`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lock;

/// How long a success notification stays visible.
pub const DEFAULT_SUCCESS_DISMISS: Duration = Duration::from_secs(2);

/// How long an error notification stays visible.
pub const DEFAULT_ERROR_DISMISS: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPhase {
    Pending,
    Success,
    Error,
}

/// What the user currently sees. `visible == false` is the idle state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionStatus {
    pub visible: bool,
    pub phase: StatusPhase,
    pub message: String,
}

impl TransactionStatus {
    pub fn idle() -> Self {
        Self {
            visible: false,
            phase: StatusPhase::Pending,
            message: String::new(),
        }
    }

    fn shown(phase: StatusPhase, message: impl Into<String>) -> Self {
        Self {
            visible: true,
            phase,
            message: message.into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.visible
    }
}

struct DismissTimer {
    /// Bumped on every status change; a timer only fires for its own generation.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    tx: watch::Sender<TransactionStatus>,
    timer: Mutex<DismissTimer>,
}

pub struct TransactionStatusMachine {
    inner: Arc<Inner>,
    success_dismiss: Duration,
    error_dismiss: Duration,
}

impl TransactionStatusMachine {
    pub fn new(success_dismiss: Duration, error_dismiss: Duration) -> Self {
        let (tx, _) = watch::channel(TransactionStatus::idle());
        Self {
            inner: Arc::new(Inner {
                tx,
                timer: Mutex::new(DismissTimer {
                    generation: 0,
                    handle: None,
                }),
            }),
            success_dismiss,
            error_dismiss,
        }
    }

    /// Snapshot of the visible status.
    pub fn current(&self) -> TransactionStatus {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.inner.tx.subscribe()
    }

    /// Start (or continue) a visible operation. Never auto-dismissed.
    pub fn pending(&self, message: impl Into<String>) {
        self.set(TransactionStatus::shown(StatusPhase::Pending, message), None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.set(
            TransactionStatus::shown(StatusPhase::Success, message),
            Some(self.success_dismiss),
        );
    }

    pub fn error(&self, message: impl Into<String>) {
        self.set(
            TransactionStatus::shown(StatusPhase::Error, message),
            Some(self.error_dismiss),
        );
    }

    /// Return to idle immediately.
    pub fn clear(&self) {
        self.set(TransactionStatus::idle(), None);
    }

    fn set(&self, status: TransactionStatus, dismiss_after: Option<Duration>) {
        let mut timer = lock(&self.inner.timer);
        if let Some(handle) = timer.handle.take() {
            handle.abort();
        }
        timer.generation += 1;
        let generation = timer.generation;

        tracing::debug!(phase = ?status.phase, visible = status.visible, message = %status.message, "status");
        self.inner.tx.send_replace(status);

        let Some(delay) = dismiss_after else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; status will not auto-dismiss");
            return;
        };
        let deadline = tokio::time::Instant::now() + delay;
        let inner = Arc::clone(&self.inner);
        timer.handle = Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut timer = lock(&inner.timer);
            if timer.generation == generation {
                timer.handle = None;
                inner.tx.send_replace(TransactionStatus::idle());
            }
        }));
    }
}

impl Default for TransactionStatusMachine {
    fn default() -> Self {
        Self::new(DEFAULT_SUCCESS_DISMISS, DEFAULT_ERROR_DISMISS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Let spawned timers observe the advanced clock.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_dismisses_after_success_interval() {
        let status = TransactionStatusMachine::default();
        status.success("done");
        assert_eq!(status.current().phase, StatusPhase::Success);

        tokio::time::advance(Duration::from_millis(1999)).await;
        settle().await;
        assert!(status.current().visible);

        tokio::time::advance(Duration::from_millis(2)).await;
        settle().await;
        assert!(status.current().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn error_stays_longer_than_success() {
        let status = TransactionStatusMachine::default();
        status.error("boom");
        tokio::time::advance(Duration::from_millis(2500)).await;
        settle().await;
        assert_eq!(status.current().phase, StatusPhase::Error);
        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;
        assert!(status.current().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_cancels_an_earlier_dismissal() {
        let status = TransactionStatusMachine::default();
        status.success("first");
        tokio::time::advance(Duration::from_millis(1500)).await;
        settle().await;

        status.pending("second");
        tokio::time::advance(Duration::from_secs(10)).await;
        settle().await;

        let current = status.current();
        assert!(current.visible);
        assert_eq!(current.phase, StatusPhase::Pending);
        assert_eq!(current.message, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn newer_result_gets_its_own_full_interval() {
        let status = TransactionStatusMachine::default();
        status.error("old");
        tokio::time::advance(Duration::from_millis(2900)).await;
        settle().await;

        status.success("new");
        // The old error timer would have fired 100ms from now.
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(status.current().message, "new");

        tokio::time::advance(Duration::from_millis(1600)).await;
        settle().await;
        assert!(status.current().is_idle());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let status = TransactionStatusMachine::default();
        let mut rx = status.subscribe();
        status.pending("working");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().message, "working");
    }

    #[test]
    fn works_without_a_runtime() {
        let status = TransactionStatusMachine::default();
        status.success("no runtime");
        assert!(status.current().visible);
        status.clear();
        assert!(status.current().is_idle());
    }
}
