//! Property-based tests for the ledger
//!
//! Random operation sequences are applied to a ledger and to a plain model;
//! every outcome and the final state must agree.

use super::*;
use crate::dispatch::MockDispatcher;
use crate::store::MemoryStore;
use proptest::prelude::*;
use std::collections::BTreeSet;

const OWNERS: u8 = 3;
const THRESHOLD: usize = 2;

#[derive(Debug, Clone)]
enum Op {
    Submit { caller: u8, value: u128 },
    Confirm { caller: u8, index: u64 },
    Revoke { caller: u8, index: u64 },
    Execute { caller: u8, index: u64 },
    Deposit { amount: u128 },
    FailNextDispatch,
}

/// Callers `0..OWNERS` are owners; anything above is an outsider.
fn principal(caller: u8) -> Principal {
    Principal::repeat(caller + 1)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let caller = 0..=OWNERS;
    let index = 0u64..6;
    prop_oneof![
        (caller.clone(), 0u128..50).prop_map(|(caller, value)| Op::Submit { caller, value }),
        (caller.clone(), index.clone()).prop_map(|(caller, index)| Op::Confirm { caller, index }),
        (caller.clone(), index.clone()).prop_map(|(caller, index)| Op::Revoke { caller, index }),
        (caller, index).prop_map(|(caller, index)| Op::Execute { caller, index }),
        (0u128..40).prop_map(|amount| Op::Deposit { amount }),
        Just(Op::FailNextDispatch),
    ]
}

#[derive(Debug, Clone, Default)]
struct ModelProposal {
    value: u128,
    executed: bool,
    confirmed_by: BTreeSet<u8>,
}

#[derive(Debug, Default)]
struct Model {
    proposals: Vec<ModelProposal>,
    balance: u128,
    records: usize,
    pending_failures: usize,
}

impl Model {
    /// Expected outcome of `op`: `Ok` or the error label.
    fn apply(&mut self, op: &Op) -> Result<(), &'static str> {
        match *op {
            Op::Submit { caller, value } => {
                if caller >= OWNERS {
                    return Err("unauthorized");
                }
                self.proposals.push(ModelProposal {
                    value,
                    ..Default::default()
                });
            }
            Op::Confirm { caller, index } => {
                if caller >= OWNERS {
                    return Err("unauthorized");
                }
                let p = self.proposals.get_mut(index as usize).ok_or("not_found")?;
                if p.executed {
                    return Err("already_executed");
                }
                if !p.confirmed_by.insert(caller) {
                    return Err("already_confirmed");
                }
            }
            Op::Revoke { caller, index } => {
                if caller >= OWNERS {
                    return Err("unauthorized");
                }
                let p = self.proposals.get_mut(index as usize).ok_or("not_found")?;
                if p.executed {
                    return Err("already_executed");
                }
                if !p.confirmed_by.remove(&caller) {
                    return Err("not_confirmed");
                }
            }
            Op::Execute { caller, index } => {
                if caller >= OWNERS {
                    return Err("unauthorized");
                }
                let balance = self.balance;
                let p = self.proposals.get_mut(index as usize).ok_or("not_found")?;
                if p.executed {
                    return Err("already_executed");
                }
                if p.confirmed_by.len() < THRESHOLD {
                    return Err("quorum_not_met");
                }
                if p.value > balance {
                    return Err("insufficient_funds");
                }
                if self.pending_failures > 0 {
                    self.pending_failures -= 1;
                    return Err("execution_failed");
                }
                p.executed = true;
                self.balance -= p.value;
            }
            Op::Deposit { amount } => {
                self.balance += amount;
            }
            Op::FailNextDispatch => {
                self.pending_failures += 1;
                return Ok(());
            }
        }
        self.records += 1;
        Ok(())
    }
}

fn label(error: &CustodyError) -> &'static str {
    match error {
        CustodyError::Unauthorized(_) => "unauthorized",
        CustodyError::NotFound(_) => "not_found",
        CustodyError::AlreadyConfirmed { .. } => "already_confirmed",
        CustodyError::NotConfirmed { .. } => "not_confirmed",
        CustodyError::QuorumNotMet { .. } => "quorum_not_met",
        CustodyError::AlreadyExecuted(_) => "already_executed",
        CustodyError::InsufficientFunds { .. } => "insufficient_funds",
        CustodyError::ExecutionFailed { .. } => "execution_failed",
        _ => "other",
    }
}

async fn run(
    ledger: &Ledger<MemoryStore, MockDispatcher>,
    dispatcher: &MockDispatcher,
    op: &Op,
) -> Result<(), &'static str> {
    let result = match *op {
        Op::Submit { caller, value } => ledger
            .submit(principal(caller), Principal::repeat(0x77), value, vec![])
            .await
            .map(|_| ()),
        Op::Confirm { caller, index } => ledger.confirm(principal(caller), index).await,
        Op::Revoke { caller, index } => ledger.revoke(principal(caller), index).await,
        Op::Execute { caller, index } => ledger.execute(principal(caller), index).await,
        Op::Deposit { amount } => ledger
            .deposit(Principal::repeat(0xdd), amount)
            .await
            .map(|_| ()),
        Op::FailNextDispatch => {
            dispatcher.fail_next(DispatchError::Rejected("scripted".to_string()));
            Ok(())
        }
    };
    result.map_err(|e| label(&e))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn fresh(store: MemoryStore) -> (Ledger<MemoryStore, MockDispatcher>, MockDispatcher) {
    let owners = (0..OWNERS).map(principal).collect();
    let registry = OwnerRegistry::new(owners, THRESHOLD).unwrap();
    let dispatcher = MockDispatcher::new();
    let ledger = Ledger::create(registry, store, dispatcher.clone(), LedgerOptions::default())
        .await
        .unwrap();
    (ledger, dispatcher)
}

proptest! {
    /// Property: Ledger outcomes match the model for any operation sequence
    #[test]
    fn ledger_matches_model(ops in prop::collection::vec(op_strategy(), 1..60)) {
        block_on(async {
            let (ledger, dispatcher) = fresh(MemoryStore::new()).await;
            let mut model = Model::default();

            for op in &ops {
                let expected = model.apply(op);
                let actual = run(&ledger, &dispatcher, op).await;
                prop_assert_eq!(actual, expected, "diverged on {:?}", op);
            }

            prop_assert_eq!(ledger.balance().await, model.balance);
            prop_assert_eq!(ledger.proposal_count().await, model.proposals.len() as u64);
            for (index, expected) in model.proposals.iter().enumerate() {
                let view = ledger.get_proposal(index as u64).await.unwrap();
                prop_assert_eq!(view.executed, expected.executed);
                prop_assert_eq!(view.confirmations, expected.confirmed_by.len());
                prop_assert_eq!(view.confirmations, view.confirmed_by.len());
                prop_assert!(view.confirmations <= OWNERS as usize);
            }
            Ok(())
        })?;
    }

    /// Property: Records are gap-free and one per committed operation
    #[test]
    fn records_are_gap_free(ops in prop::collection::vec(op_strategy(), 1..40)) {
        block_on(async {
            let (ledger, dispatcher) = fresh(MemoryStore::new()).await;
            let mut model = Model::default();
            for op in &ops {
                model.apply(op).ok();
                run(&ledger, &dispatcher, op).await.ok();
            }

            let records = ledger.records(None).await.unwrap();
            prop_assert_eq!(records.len(), model.records);
            for (position, record) in records.iter().enumerate() {
                prop_assert_eq!(record.seq, position as u64);
            }
            Ok(())
        })?;
    }

    /// Property: Reopening the store reproduces the ledger state
    #[test]
    fn reopen_preserves_state(ops in prop::collection::vec(op_strategy(), 1..40)) {
        block_on(async {
            let store = MemoryStore::new();
            let (ledger, dispatcher) = fresh(store.clone()).await;
            for op in &ops {
                run(&ledger, &dispatcher, op).await.ok();
            }

            let reopened = Ledger::open(store, MockDispatcher::new(), LedgerOptions::default())
                .await
                .unwrap();
            prop_assert_eq!(reopened.balance().await, ledger.balance().await);
            let count = ledger.proposal_count().await;
            prop_assert_eq!(reopened.proposal_count().await, count);
            for index in 0..count {
                prop_assert_eq!(
                    reopened.get_proposal(index).await.unwrap(),
                    ledger.get_proposal(index).await.unwrap()
                );
            }

            // The next record continues the sequence.
            let before = ledger.records(None).await.unwrap().len() as u64;
            reopened.deposit(Principal::repeat(0xdd), 1).await.unwrap();
            let last = reopened.records(Some(1)).await.unwrap();
            prop_assert_eq!(last[0].seq, before);
            Ok(())
        })?;
    }
}
