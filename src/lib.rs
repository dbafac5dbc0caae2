//! Quorum - Multi-Owner Custody Ledger
//!
//! A fixed set of owners jointly holds a value pool. Any owner may propose an
//! outbound call; it is dispatched only once a threshold of distinct owners
//! has confirmed it.
//!
//! Key principles:
//! - Owner set and threshold are immutable after creation
//! - Each proposal executes at most once, even across a crash
//! - A failed dispatch leaves no trace and stays retryable
//! - Every committed operation is persisted and observable as a record

pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod principal;
pub mod registry;
pub mod serialization;
pub mod store;

pub use error::{CustodyError, CustodyResult};
pub use ledger::{Ledger, LedgerOptions};
pub use principal::Principal;
pub use registry::OwnerRegistry;
