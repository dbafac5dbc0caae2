//! Proposal ledger.
//!
//! Append-only, index-addressed proposals gated by the owner registry:
//! - submit / confirm / revoke / execute require an owner caller
//! - deposit and the queries are open to anyone
//! - every committed operation is persisted before it becomes visible
//!
//! One lock serializes all mutations. `execute` releases it for the duration
//! of the dispatch, after marking the proposal executed and reserving its
//! value, so a reentrant call observes `AlreadyExecuted` instead of
//! deadlocking or replaying.
//!
//! An `execute` future dropped mid-dispatch settles its reservation on the
//! next lock as executed and debited, which is what the store holds.

pub mod proposal;
pub mod records;

#[cfg(test)]
mod proptests;

pub use proposal::{Proposal, ProposalStatus, ProposalView};
pub use records::{Record, RecordKind, RecordStream};

use crate::dispatch::{Call, DispatchError, Dispatcher};
use crate::error::{CustodyError, CustodyResult};
use crate::registry::OwnerRegistry;
use crate::store::{Change, LedgerStore, Snapshot, StoreError};
use crate::Principal;
use std::sync::{Mutex as SyncMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Default bound on a single dispatch.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the live record channel.
pub const DEFAULT_RECORD_BUFFER: usize = 256;

/// Runtime knobs for a ledger.
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// A dispatch still running after this long fails with `ExecutionFailed`.
    pub dispatch_timeout: Duration,
    /// Records buffered per live subscriber before it starts lagging.
    pub record_buffer: usize,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            record_buffer: DEFAULT_RECORD_BUFFER,
        }
    }
}

struct LedgerState {
    proposals: Vec<Proposal>,
    /// Committed pool balance.
    balance: u128,
    /// Value held back by executions whose dispatch is in flight.
    reserved: u128,
    next_seq: u64,
}

impl LedgerState {
    fn proposal(&self, index: u64) -> CustodyResult<&Proposal> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.proposals.get(i))
            .ok_or(CustodyError::NotFound(index))
    }

    fn proposal_mut(&mut self, index: u64) -> CustodyResult<&mut Proposal> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.proposals.get_mut(i))
            .ok_or(CustodyError::NotFound(index))
    }

    fn available(&self) -> u128 {
        self.balance - self.reserved
    }
}

/// An execution whose caller went away before recording the outcome.
struct Abandoned {
    index: u64,
    value: u128,
}

/// Reservation held by one in-flight execution.
///
/// Dropped while armed, it queues the execution for settlement.
struct InFlight<'a> {
    abandoned: &'a SyncMutex<Vec<Abandoned>>,
    index: u64,
    value: u128,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(abandoned: &'a SyncMutex<Vec<Abandoned>>, index: u64, value: u128) -> Self {
        Self {
            abandoned,
            index,
            value,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Abandoned {
                    index: self.index,
                    value: self.value,
                });
        }
    }
}

/// Quorum-gated custody ledger.
pub struct Ledger<S, D> {
    registry: OwnerRegistry,
    state: Mutex<LedgerState>,
    abandoned: SyncMutex<Vec<Abandoned>>,
    store: S,
    dispatcher: D,
    options: LedgerOptions,
    records: broadcast::Sender<Record>,
}

impl<S: LedgerStore, D: Dispatcher> Ledger<S, D> {
    /// Initialize `store` with `registry` and return an empty ledger.
    ///
    /// Fails with `AlreadyInitialized` if the store already holds a registry;
    /// the owner set and threshold never change after this call.
    pub async fn create(
        registry: OwnerRegistry,
        store: S,
        dispatcher: D,
        options: LedgerOptions,
    ) -> CustodyResult<Self> {
        store.initialize(&registry).await.map_err(|e| match e {
            StoreError::AlreadyInitialized => CustodyError::AlreadyInitialized,
            other => CustodyError::Storage(other),
        })?;

        info!(
            owners = registry.owner_count(),
            threshold = registry.required_confirmations(),
            "ledger initialized"
        );
        Ok(Self::from_snapshot(
            Snapshot::new(registry),
            store,
            dispatcher,
            options,
        ))
    }

    /// Rebuild a ledger from the committed state in `store`.
    pub async fn open(store: S, dispatcher: D, options: LedgerOptions) -> CustodyResult<Self> {
        let snapshot = store.load().await?.ok_or(CustodyError::NotInitialized)?;
        snapshot.validate()?;

        info!(
            owners = snapshot.registry.owner_count(),
            proposals = snapshot.proposals.len(),
            balance = %snapshot.balance,
            "ledger recovered"
        );
        Ok(Self::from_snapshot(snapshot, store, dispatcher, options))
    }

    fn from_snapshot(snapshot: Snapshot, store: S, dispatcher: D, options: LedgerOptions) -> Self {
        let (records, _) = broadcast::channel(options.record_buffer.max(1));
        Self {
            registry: snapshot.registry,
            state: Mutex::new(LedgerState {
                proposals: snapshot.proposals,
                balance: snapshot.balance,
                reserved: 0,
                next_seq: snapshot.next_seq,
            }),
            abandoned: SyncMutex::new(Vec::new()),
            store,
            dispatcher,
            options,
            records,
        }
    }

    /// Append a proposal with no confirmations. Returns its index.
    pub async fn submit(
        &self,
        caller: Principal,
        target: Principal,
        value: u128,
        payload: Vec<u8>,
    ) -> CustodyResult<u64> {
        self.registry.authorize(&caller)?;
        let mut state = self.lock_state().await;

        let index = state.proposals.len() as u64;
        let proposal = Proposal::new(index, target, value, payload);
        let kind = RecordKind::Submitted {
            owner: caller,
            index,
            target,
            value,
            payload: proposal.payload.clone(),
        };

        let record = self
            .persist(&mut state, &Change::Submitted(proposal.clone()), kind)
            .await?;
        state.proposals.push(proposal);
        self.publish(record);

        info!(owner = %caller, index, target_principal = %target, value = %value, "proposal submitted");
        Ok(index)
    }

    /// Add the caller's confirmation to a proposal.
    pub async fn confirm(&self, caller: Principal, index: u64) -> CustodyResult<()> {
        self.registry.authorize(&caller)?;
        let mut state = self.lock_state().await;

        {
            let proposal = state.proposal(index)?;
            if proposal.executed {
                return Err(CustodyError::AlreadyExecuted(index));
            }
            if proposal.is_confirmed_by(&caller) {
                return Err(CustodyError::AlreadyConfirmed {
                    index,
                    owner: caller,
                });
            }
        }

        let record = self
            .persist(
                &mut state,
                &Change::Confirmed {
                    index,
                    owner: caller,
                },
                RecordKind::Confirmed {
                    owner: caller,
                    index,
                },
            )
            .await?;
        let proposal = state.proposal_mut(index)?;
        proposal.confirmed_by.insert(caller);
        let confirmations = proposal.confirmations();
        self.publish(record);

        info!(owner = %caller, index, confirmations, "proposal confirmed");
        Ok(())
    }

    /// Withdraw the caller's confirmation. Allowed until execution.
    pub async fn revoke(&self, caller: Principal, index: u64) -> CustodyResult<()> {
        self.registry.authorize(&caller)?;
        let mut state = self.lock_state().await;

        {
            let proposal = state.proposal(index)?;
            if proposal.executed {
                return Err(CustodyError::AlreadyExecuted(index));
            }
            if !proposal.is_confirmed_by(&caller) {
                return Err(CustodyError::NotConfirmed {
                    index,
                    owner: caller,
                });
            }
        }

        let record = self
            .persist(
                &mut state,
                &Change::Revoked {
                    index,
                    owner: caller,
                },
                RecordKind::Revoked {
                    owner: caller,
                    index,
                },
            )
            .await?;
        let proposal = state.proposal_mut(index)?;
        proposal.confirmed_by.remove(&caller);
        let confirmations = proposal.confirmations();
        self.publish(record);

        info!(owner = %caller, index, confirmations, "confirmation revoked");
        Ok(())
    }

    /// Dispatch an approved proposal. Any owner may execute.
    ///
    /// The threshold is checked at the moment of the call. The proposal is
    /// marked executed before dispatch; if the dispatch fails or times out,
    /// the flag and the reserved value are restored and the call fails with
    /// `ExecutionFailed`, leaving the proposal retryable.
    pub async fn execute(&self, caller: Principal, index: u64) -> CustodyResult<()> {
        self.registry.authorize(&caller)?;
        let (call, in_flight) = self.begin_execution(index).await?;

        let timeout = self.options.dispatch_timeout;
        let outcome = match tokio::time::timeout(timeout, self.dispatcher.invoke(&call)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::TimedOut(timeout)),
        };

        match outcome {
            Ok(()) => self.complete_execution(caller, in_flight).await,
            Err(source) => {
                warn!(index, error = %source, "dispatch failed");
                self.revert_execution(in_flight).await?;
                Err(CustodyError::ExecutionFailed { index, source })
            }
        }
    }

    async fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.state.lock().await;
        let abandoned = std::mem::take(
            &mut *self
                .abandoned
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for Abandoned { index, value } in abandoned {
            state.reserved -= value;
            state.balance -= value;
            warn!(index, value = %value, "execution abandoned mid-dispatch; settled as executed");
        }
        state
    }

    async fn begin_execution(&self, index: u64) -> CustodyResult<(Call, InFlight<'_>)> {
        let mut state = self.lock_state().await;
        let required = self.registry.required_confirmations();
        let available = state.available();

        let proposal = state.proposal(index)?;
        if proposal.executed {
            return Err(CustodyError::AlreadyExecuted(index));
        }
        let confirmations = proposal.confirmations();
        if confirmations < required {
            return Err(CustodyError::QuorumNotMet {
                index,
                confirmations,
                required,
            });
        }
        if proposal.value > available {
            return Err(CustodyError::InsufficientFunds {
                requested: proposal.value,
                available,
            });
        }
        let call = proposal.call();

        state.proposal_mut(index)?.executed = true;
        state.reserved += call.value;
        let mut in_flight = InFlight::new(&self.abandoned, index, call.value);

        // Durable before dispatch: a crash mid-call leaves the proposal
        // executed, never replayable.
        let started = self
            .store
            .commit(
                &Change::ExecutionStarted {
                    index,
                    balance: available - call.value,
                },
                None,
            )
            .await;
        if let Err(e) = started {
            in_flight.disarm();
            state.reserved -= call.value;
            state.proposal_mut(index)?.executed = false;
            return Err(e.into());
        }

        debug!(index, value = %call.value, "execution started");
        Ok((call, in_flight))
    }

    async fn complete_execution(
        &self,
        caller: Principal,
        mut in_flight: InFlight<'_>,
    ) -> CustodyResult<()> {
        let mut state = self.lock_state().await;
        in_flight.disarm();
        let (index, value) = (in_flight.index, in_flight.value);
        state.reserved -= value;
        state.balance -= value;

        let record = self
            .persist(
                &mut state,
                &Change::ExecutionCompleted { index },
                RecordKind::Executed {
                    owner: caller,
                    index,
                },
            )
            .await
            .inspect_err(|e| {
                error!(index, error = %e, "proposal executed but its record was not persisted");
            })?;
        self.publish(record);

        info!(owner = %caller, index, value = %value, balance = %state.balance, "proposal executed");
        Ok(())
    }

    async fn revert_execution(&self, mut in_flight: InFlight<'_>) -> CustodyResult<()> {
        let mut state = self.lock_state().await;
        let (index, value) = (in_flight.index, in_flight.value);
        let reserved = state.reserved - value;
        let restored = state.balance - reserved;

        match self
            .store
            .commit(
                &Change::ExecutionReverted {
                    index,
                    balance: restored,
                },
                None,
            )
            .await
        {
            Ok(()) => {
                in_flight.disarm();
                state.reserved = reserved;
                state.proposal_mut(index)?.executed = false;
                warn!(index, "execution rolled back");
                Ok(())
            }
            Err(e) => {
                // The store still holds the proposal as executed with its
                // value debited. Memory follows the store.
                in_flight.disarm();
                state.reserved = reserved;
                state.balance -= value;
                error!(index, error = %e, "rollback not persisted; proposal stays executed");
                Err(e.into())
            }
        }
    }

    /// Add `amount` to the pool. Open to any sender. Returns the new balance.
    pub async fn deposit(&self, sender: Principal, amount: u128) -> CustodyResult<u128> {
        let mut state = self.lock_state().await;
        let balance = state
            .balance
            .checked_add(amount)
            .ok_or(CustodyError::BalanceOverflow(amount))?;
        let durable = balance - state.reserved;

        let record = self
            .persist(
                &mut state,
                &Change::Deposited { balance: durable },
                RecordKind::Deposited {
                    sender,
                    amount,
                    balance,
                },
            )
            .await?;
        state.balance = balance;
        self.publish(record);

        info!(sender = %sender, amount = %amount, balance = %balance, "deposit received");
        Ok(balance)
    }

    async fn persist(
        &self,
        state: &mut LedgerState,
        change: &Change,
        kind: RecordKind,
    ) -> CustodyResult<Record> {
        let record = Record::new(state.next_seq, kind);
        self.store.commit(change, Some(&record)).await?;
        state.next_seq += 1;
        Ok(record)
    }

    fn publish(&self, record: Record) {
        // No subscribers is not an error.
        let _ = self.records.send(record);
    }

    /// The owner registry.
    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    /// Owners in registration order.
    pub fn owners(&self) -> &[Principal] {
        self.registry.owners()
    }

    /// Confirmations required to execute.
    pub fn threshold(&self) -> usize {
        self.registry.required_confirmations()
    }

    /// Current view of a proposal.
    pub async fn get_proposal(&self, index: u64) -> CustodyResult<ProposalView> {
        let state = self.lock_state().await;
        Ok(state.proposal(index)?.view())
    }

    /// Derived lifecycle status of a proposal.
    pub async fn proposal_status(&self, index: u64) -> CustodyResult<ProposalStatus> {
        let state = self.lock_state().await;
        Ok(state.proposal(index)?.status(self.threshold()))
    }

    /// Number of proposals ever submitted.
    pub async fn proposal_count(&self) -> u64 {
        self.lock_state().await.proposals.len() as u64
    }

    /// Whether `owner` holds an active confirmation on `index`.
    pub async fn is_confirmed(&self, index: u64, owner: &Principal) -> CustodyResult<bool> {
        let state = self.lock_state().await;
        Ok(state.proposal(index)?.is_confirmed_by(owner))
    }

    /// Committed pool balance.
    pub async fn balance(&self) -> u128 {
        self.lock_state().await.balance
    }

    /// Durable record history, oldest first.
    pub async fn records(&self, limit: Option<usize>) -> CustodyResult<Vec<Record>> {
        Ok(self.store.records(limit).await?)
    }

    /// Live stream of records committed from now on.
    pub fn subscribe(&self) -> RecordStream {
        RecordStream::new(self.records.subscribe())
    }
}
