//! Encrypted-vote lifecycle coordinator.
//!
//! Orchestrates the client side of encrypted feature voting:
//! - [`submission`]: encrypt a vote, submit the record, await confirmation
//! - [`decryption`]: request a decryption with proof, commit it on-ledger,
//!   and recover when another party verified first
//! - [`store`]: the local record cache, action history and derived statistics
//! - [`status`]: the single visible transaction status with timed dismissal
//! - [`session`]: the controller that owns all of the above for one identity
//!
//! Every ledger or encryption call is a suspension point. Shared state sits
//! behind short-lived mutexes that are never held across one.

pub mod cancel;
pub mod config;
pub mod context;
pub mod decryption;
pub mod encryption;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod status;
pub mod store;
pub mod submission;

pub use cancel::{CancelSource, Cancellation};
pub use config::CoordinatorConfig;
pub use context::CoordinatorContext;
pub use decryption::DecryptionCoordinator;
pub use encryption::EncryptionService;
pub use error::CoordinatorError;
pub use logging::{init_logging, LogFormat};
pub use metrics::CoordinatorMetrics;
pub use session::Session;
pub use status::{
    StatusPhase, TransactionStatus, TransactionStatusMachine, DEFAULT_ERROR_DISMISS,
    DEFAULT_SUCCESS_DISMISS,
};
pub use store::{DerivedStats, LocalDataStore, ReloadReport};
pub use submission::VoteSubmissionCoordinator;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section here is a plain field update, so the data is
/// consistent even after a panic elsewhere.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
