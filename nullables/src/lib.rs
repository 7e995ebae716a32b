//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the coordinator (ledger, encryption
//! service, clock, id source) is abstracted behind a trait. This crate
//! provides in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (failures, delays, races)
//! - Record every call for assertions
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and in the simulator.

pub mod clock;
pub mod encryption;
pub mod ids;
pub mod ledger;

pub use clock::NullClock;
pub use encryption::{decode_clear_values, encode_clear_values, NullEncryption};
pub use ids::NullIdGenerator;
pub use ledger::NullLedger;
