//! Dispatch of approved proposals to external targets.
//!
//! The ledger stays agnostic to what a target or payload means: it hands a
//! [`Call`] to a [`Dispatcher`] and observes success or failure.
//! - `traits`: the `Dispatcher` seam and the no-op implementation
//! - `hook`: operator-configured executable
//! - `mock`: scriptable dispatcher for tests

pub mod hook;
pub mod mock;
pub mod traits;

pub use hook::HookDispatcher;
pub use mock::MockDispatcher;
pub use traits::{Call, DispatchError, DispatchResult, Dispatcher, NoopDispatcher};
