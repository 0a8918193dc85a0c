//! Supply-chain audit views over the MedChain ledger.
//!
//! Transactions become [`AuditEvent`]s; dispatch and receive events of the
//! same batch are paired and every row is classified as complete, pending,
//! or waiting. [`StatusIndex`] caches the classified events and follows the
//! ledger incrementally. Queries filter and sort rows; [`trace`] rebuilds a
//! batch's chain of custody.

pub mod error;
pub mod event;
pub mod query;
pub mod status;
pub mod trace;

pub use error::AuditError;
pub use event::{extract_events, AuditEvent, EventKind};
pub use query::{filter_and_sort, AuditQuery, SortKey, StatusFilter};
pub use status::{classify_all, classify_step, match_transfers, row_statuses, AuditStatus, StatusIndex};
pub use trace::{trace, CustodyHop, CustodyStage, CustodyTrail};
