//! Proposals and their confirmation state.

use crate::dispatch::Call;
use crate::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A recorded intent to dispatch value and payload to a target.
///
/// The confirmation count is the size of `confirmed_by`, so the two can never
/// disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub(crate) index: u64,
    pub(crate) target: Principal,
    pub(crate) value: u128,
    pub(crate) payload: Vec<u8>,
    pub(crate) executed: bool,
    pub(crate) confirmed_by: BTreeSet<Principal>,
}

/// Derived lifecycle position of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    /// Fewer confirmations than the threshold.
    Pending,
    /// Threshold reached, not yet executed.
    Executable,
    /// Terminal.
    Executed,
}

impl Proposal {
    /// Fresh, unconfirmed proposal.
    pub fn new(index: u64, target: Principal, value: u128, payload: Vec<u8>) -> Self {
        Self {
            index,
            target,
            value,
            payload,
            executed: false,
            confirmed_by: BTreeSet::new(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn target(&self) -> Principal {
        self.target
    }

    pub fn value(&self) -> u128 {
        self.value
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Number of active confirmations.
    pub fn confirmations(&self) -> usize {
        self.confirmed_by.len()
    }

    /// Whether `owner` holds an active confirmation.
    pub fn is_confirmed_by(&self, owner: &Principal) -> bool {
        self.confirmed_by.contains(owner)
    }

    /// Lifecycle position given the registry threshold.
    pub fn status(&self, threshold: usize) -> ProposalStatus {
        if self.executed {
            ProposalStatus::Executed
        } else if self.confirmations() >= threshold {
            ProposalStatus::Executable
        } else {
            ProposalStatus::Pending
        }
    }

    /// The external call this proposal dispatches.
    pub fn call(&self) -> Call {
        Call {
            target: self.target,
            value: self.value,
            payload: self.payload.clone(),
        }
    }

    /// Read-only view for callers.
    pub fn view(&self) -> ProposalView {
        ProposalView {
            index: self.index,
            target: self.target,
            value: self.value,
            payload: self.payload.clone(),
            executed: self.executed,
            confirmations: self.confirmations(),
            confirmed_by: self.confirmed_by.iter().copied().collect(),
        }
    }
}

/// Snapshot of a proposal returned by `get_proposal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    pub index: u64,
    pub target: Principal,
    pub value: u128,
    pub payload: Vec<u8>,
    pub executed: bool,
    pub confirmations: usize,
    /// Confirming owners, sorted.
    pub confirmed_by: Vec<Principal>,
}
