//! Mock dispatcher for testing.
//!
//! Records every attempted call and can be scripted to fail or stall.

use super::traits::*;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Scriptable in-memory dispatcher.
#[derive(Clone, Default)]
pub struct MockDispatcher {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    attempts: Vec<Call>,
    delivered: Vec<Call>,
    queued_failures: VecDeque<DispatchError>,
    persistent_failure: Option<DispatchError>,
    delay: Option<Duration>,
}

impl MockDispatcher {
    /// Create a dispatcher that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call with `error`. Queued failures are consumed in order.
    pub fn fail_next(&self, error: DispatchError) {
        self.lock().queued_failures.push_back(error);
    }

    /// Fail every call with `error` until [`MockDispatcher::recover`].
    pub fn fail_always(&self, error: DispatchError) {
        self.lock().persistent_failure = Some(error);
    }

    /// Stop failing.
    pub fn recover(&self) {
        let mut state = self.lock();
        state.persistent_failure = None;
        state.queued_failures.clear();
    }

    /// Sleep for `delay` before answering each call.
    pub fn stall(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Every call attempted, including failed ones.
    pub fn attempts(&self) -> Vec<Call> {
        self.lock().attempts.clone()
    }

    /// Calls that succeeded.
    pub fn delivered(&self) -> Vec<Call> {
        self.lock().delivered.clone()
    }
}

#[async_trait]
impl Dispatcher for MockDispatcher {
    async fn invoke(&self, call: &Call) -> DispatchResult<()> {
        let delay = {
            let mut state = self.lock();
            state.attempts.push(call.clone());
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.queued_failures.pop_front() {
            return Err(error);
        }
        if let Some(error) = &state.persistent_failure {
            return Err(error.clone());
        }
        state.delivered.push(call.clone());
        Ok(())
    }
}
