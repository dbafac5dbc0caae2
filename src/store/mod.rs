//! Durable ledger state.
//!
//! Persisted layout: owner list, threshold, the append-only proposal array
//! with confirmation sets, the pool balance, and the record log. Every
//! committed operation is written through a [`LedgerStore`] before the
//! in-memory ledger reflects it.

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Change, LedgerStore, Snapshot, StoreError, StoreResult};
