//! Trait abstraction for ledger persistence.
//!
//! Enables an in-memory implementation for tests and a sqlite one for
//! deployments behind the same seam.

use crate::ledger::{Proposal, Record};
use crate::registry::OwnerRegistry;
use crate::serialization::SerializationError;
use crate::Principal;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `initialize` called on a store that already holds a registry.
    #[error("store already holds a registry")]
    AlreadyInitialized,

    /// Persisted state violates a ledger invariant.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// Database driver failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record encoding failure.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Injected or backend-specific failure.
    #[error("{0}")]
    Other(String),
}

/// One committed state change.
///
/// Balances are absolute: the durable balance after the change, which
/// already excludes value reserved by an in-flight execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Submitted(Proposal),
    Confirmed { index: u64, owner: Principal },
    Revoked { index: u64, owner: Principal },
    /// Execution began: the proposal is marked executed and its value debited.
    ExecutionStarted { index: u64, balance: u128 },
    /// Dispatch succeeded. State is already durable; only the record is new.
    ExecutionCompleted { index: u64 },
    /// Dispatch failed: the flag is cleared and the value credited back.
    ExecutionReverted { index: u64, balance: u128 },
    Deposited { balance: u128 },
}

/// Everything needed to rebuild a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub registry: OwnerRegistry,
    pub proposals: Vec<Proposal>,
    pub balance: u128,
    /// Sequence number of the next record.
    pub next_seq: u64,
}

impl Snapshot {
    /// Empty ledger state for a freshly initialized registry.
    pub fn new(registry: OwnerRegistry) -> Self {
        Self {
            registry,
            proposals: Vec::new(),
            balance: 0,
            next_seq: 0,
        }
    }

    /// Apply a change as a store would.
    pub fn apply(&mut self, change: &Change) -> StoreResult<()> {
        match change {
            Change::Submitted(proposal) => {
                if proposal.index() != self.proposals.len() as u64 {
                    return Err(StoreError::Corrupt(format!(
                        "proposal index {} is not next ({})",
                        proposal.index(),
                        self.proposals.len()
                    )));
                }
                self.proposals.push(proposal.clone());
            }
            Change::Confirmed { index, owner } => {
                self.proposal_mut(*index)?.confirmed_by.insert(*owner);
            }
            Change::Revoked { index, owner } => {
                self.proposal_mut(*index)?.confirmed_by.remove(owner);
            }
            Change::ExecutionStarted { index, balance } => {
                self.proposal_mut(*index)?.executed = true;
                self.balance = *balance;
            }
            Change::ExecutionCompleted { index } => {
                self.proposal_mut(*index)?;
            }
            Change::ExecutionReverted { index, balance } => {
                self.proposal_mut(*index)?.executed = false;
                self.balance = *balance;
            }
            Change::Deposited { balance } => {
                self.balance = *balance;
            }
        }
        Ok(())
    }

    /// Check the per-proposal invariants of loaded state.
    pub fn validate(&self) -> StoreResult<()> {
        for (position, proposal) in self.proposals.iter().enumerate() {
            if proposal.index() != position as u64 {
                return Err(StoreError::Corrupt(format!(
                    "proposal at position {} has index {}",
                    position,
                    proposal.index()
                )));
            }
            if let Some(stranger) = proposal
                .confirmed_by
                .iter()
                .find(|owner| !self.registry.is_owner(owner))
            {
                return Err(StoreError::Corrupt(format!(
                    "proposal {} confirmed by non-owner {}",
                    proposal.index(),
                    stranger
                )));
            }
        }
        Ok(())
    }

    fn proposal_mut(&mut self, index: u64) -> StoreResult<&mut Proposal> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.proposals.get_mut(i))
            .ok_or_else(|| StoreError::Corrupt(format!("no proposal {}", index)))
    }
}

/// Persistence seam consulted by the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Write the registry into an empty store.
    async fn initialize(&self, registry: &OwnerRegistry) -> StoreResult<()>;

    /// Load the full state, or `None` for an uninitialized store.
    async fn load(&self) -> StoreResult<Option<Snapshot>>;

    /// Apply `change` and append `record` (if any) atomically.
    async fn commit(&self, change: &Change, record: Option<&Record>) -> StoreResult<()>;

    /// Record log, oldest first; with `limit`, only the most recent entries.
    async fn records(&self, limit: Option<usize>) -> StoreResult<Vec<Record>>;
}
