//! Trait abstraction for external dispatch.
//!
//! Enables mock implementations for unit testing.

use crate::Principal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A single external invocation: transfer `value` to `target` with `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Principal,
    pub value: u128,
    pub payload: Vec<u8>,
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The target ran and reported failure.
    #[error("call rejected: {0}")]
    Rejected(String),

    /// The dispatch mechanism could not run the call.
    #[error("dispatcher unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the allotted time.
    #[error("call timed out after {0:?}")]
    TimedOut(Duration),
}

/// Strategy for performing an approved call.
///
/// `invoke` must be all-or-nothing from the caller's point of view: an `Err`
/// means the target observed no effect.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn invoke(&self, call: &Call) -> DispatchResult<()>;
}

/// Accepts every call. Value transfers need no target-side handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {
    async fn invoke(&self, call: &Call) -> DispatchResult<()> {
        tracing::info!(
            target_principal = %call.target,
            value = %call.value,
            payload_len = call.payload.len(),
            "dispatched call"
        );
        Ok(())
    }
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for std::sync::Arc<D> {
    async fn invoke(&self, call: &Call) -> DispatchResult<()> {
        (**self).invoke(call).await
    }
}
