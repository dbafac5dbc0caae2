//! In-memory ledger store.
//!
//! Clones share the same state, so a test can drop a ledger and reopen a
//! new one from the same store to simulate a restart.

use super::traits::*;
use crate::ledger::Record;
use crate::registry::OwnerRegistry;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Store backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    snapshot: Option<Snapshot>,
    records: Vec<Record>,
    failing_commits: usize,
}

impl MemoryStore {
    /// Create an empty, uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` commits fail without applying anything.
    pub fn fail_next_commits(&self, count: usize) {
        self.lock().failing_commits = count;
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn initialize(&self, registry: &OwnerRegistry) -> StoreResult<()> {
        let mut state = self.lock();
        if state.snapshot.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }
        state.snapshot = Some(Snapshot::new(registry.clone()));
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<Snapshot>> {
        let state = self.lock();
        Ok(state.snapshot.clone().map(|mut snapshot| {
            snapshot.next_seq = state.records.len() as u64;
            snapshot
        }))
    }

    async fn commit(&self, change: &Change, record: Option<&Record>) -> StoreResult<()> {
        let mut state = self.lock();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(StoreError::Other("injected commit failure".to_string()));
        }

        let expected_seq = state.records.len() as u64;
        if let Some(record) = record {
            if record.seq != expected_seq {
                return Err(StoreError::Corrupt(format!(
                    "record seq {} is not next ({})",
                    record.seq, expected_seq
                )));
            }
        }

        // `apply` validates before mutating, so a rejected change leaves
        // nothing behind.
        state
            .snapshot
            .as_mut()
            .ok_or_else(|| StoreError::Corrupt("store is not initialized".to_string()))?
            .apply(change)?;

        if let Some(record) = record {
            state.records.push(record.clone());
        }
        Ok(())
    }

    async fn records(&self, limit: Option<usize>) -> StoreResult<Vec<Record>> {
        let state = self.lock();
        let skip = limit.map_or(0, |limit| state.records.len().saturating_sub(limit));
        Ok(state.records[skip..].to_vec())
    }
}
