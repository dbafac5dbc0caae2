//! Error taxonomy for the custody engine.
//!
//! Every failure is local and synchronous: an operation either commits fully
//! or returns one of these without any partial effect.

use crate::dispatch::DispatchError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type for ledger and registry operations.
pub type CustodyResult<T> = Result<T, CustodyError>;

/// Custody engine errors.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Registry construction rejected (empty owners, bad threshold, duplicate).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Caller is not an owner.
    #[error("caller {0} is not an owner")]
    Unauthorized(crate::Principal),

    /// Index does not address a submitted proposal.
    #[error("proposal {0} not found")]
    NotFound(u64),

    /// Caller already holds an active confirmation.
    #[error("proposal {index} already confirmed by {owner}")]
    AlreadyConfirmed { index: u64, owner: crate::Principal },

    /// Caller holds no active confirmation to revoke.
    #[error("proposal {index} not confirmed by {owner}")]
    NotConfirmed { index: u64, owner: crate::Principal },

    /// Fewer confirmations than the threshold at the moment of execution.
    #[error("proposal {index} has {confirmations} of {required} required confirmations")]
    QuorumNotMet {
        index: u64,
        confirmations: usize,
        required: usize,
    },

    /// Proposal has already been executed (or its execution is in flight).
    #[error("proposal {0} already executed")]
    AlreadyExecuted(u64),

    /// Requested value exceeds the available pool balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u128, available: u128 },

    /// The dispatched call failed; all state changes were rolled back.
    #[error("execution of proposal {index} failed: {source}")]
    ExecutionFailed {
        index: u64,
        #[source]
        source: DispatchError,
    },

    /// Deposit would overflow the pool balance.
    #[error("deposit of {0} would overflow the pool balance")]
    BalanceOverflow(u128),

    /// Store already holds a registry.
    #[error("store is already initialized")]
    AlreadyInitialized,

    /// Store holds no registry to open.
    #[error("store is not initialized")]
    NotInitialized,

    /// Durable store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CustodyError {
    /// Whether a caller may reasonably retry the same operation later.
    ///
    /// Quorum and funds can change, dispatch failures are rolled back, and
    /// storage faults are transient. Everything else is a caller error or a
    /// permanent state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QuorumNotMet { .. }
                | Self::InsufficientFunds { .. }
                | Self::ExecutionFailed { .. }
                | Self::Storage(_)
        )
    }
}
