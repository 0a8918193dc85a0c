//! Foundation types for the MedChain ledger.
//!
//! Every other MedChain crate depends on `medchain-types`.
//!
//! # Key Types
//!
//! - [`Fingerprint`]: Fixed-width 32-byte digest, rendered as 64 hex characters
//! - [`LedgerTime`]: Totally ordered `(physical_ms, logical)` timestamp
//! - [`LedgerClock`]: Monotonic clock handing out strictly increasing [`LedgerTime`]s

pub mod clock;
pub mod error;
pub mod fingerprint;
pub mod temporal;

pub use clock::{LedgerClock, TimeSource};
pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use temporal::LedgerTime;
