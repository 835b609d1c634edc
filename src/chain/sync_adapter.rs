use std::sync::{Condvar, Mutex};

use async_trait::async_trait;

use crate::chain::callback::{CallbackHandler, ErrorInfo};
use crate::core::errors::Result;

struct AdapterState<T> {
    results: Vec<T>,
    error: Option<ErrorInfo>,
}

/// Blocks a caller thread on an otherwise-asynchronous call.
///
/// The waits have no internal timeout on purpose: timeout policy belongs to
/// a higher layer. Results are kept in arrival order and the *most recent*
/// one wins, even if an error was also recorded along the way; later
/// results silently supersede earlier ones.
pub struct SyncCallbackAdapter<T> {
    state: Mutex<AdapterState<T>>,
    signal: Condvar,
}

impl<T: Clone + Send + 'static> SyncCallbackAdapter<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AdapterState {
                results: Vec::new(),
                error: None,
            }),
            signal: Condvar::new(),
        }
    }

    /// Block until at least one result or one error has been delivered.
    ///
    /// Returns the most recently received result if any result arrived;
    /// otherwise fails with the recorded error (not-all-loaded remapped to
    /// the distinguished missing-action failure).
    pub fn wait_for_result(&self) -> Result<T> {
        let mut state = self.state.lock().expect("adapter state poisoned");
        while state.results.is_empty() && state.error.is_none() {
            state = self.signal.wait(state).expect("adapter state poisoned");
        }
        if let Some(last) = state.results.last() {
            return Ok(last.clone());
        }
        let error = state.error.clone().expect("checked above");
        Err(error.into_error())
    }

    /// Block until `n` results have arrived or any error arrives.
    ///
    /// An error with fewer than `n` results collected fails immediately.
    pub fn wait_for_results(&self, n: usize) -> Result<Vec<T>> {
        let mut state = self.state.lock().expect("adapter state poisoned");
        while state.results.len() < n && state.error.is_none() {
            state = self.signal.wait(state).expect("adapter state poisoned");
        }
        if state.results.len() >= n {
            return Ok(state.results[..n].to_vec());
        }
        let error = state.error.clone().expect("checked above");
        Err(error.into_error())
    }

    /// Results collected so far, without blocking
    pub fn result_count(&self) -> usize {
        self.state
            .lock()
            .expect("adapter state poisoned")
            .results
            .len()
    }
}

impl<T: Clone + Send + 'static> Default for SyncCallbackAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> CallbackHandler<T> for SyncCallbackAdapter<T> {
    async fn result(&self, value: T) {
        let mut state = self.state.lock().expect("adapter state poisoned");
        state.results.push(value);
        self.signal.notify_all();
    }

    async fn error(&self, error: ErrorInfo) {
        let mut state = self.state.lock().expect("adapter state poisoned");
        // first error wins; results may still supersede it
        if state.error.is_none() {
            state.error = Some(error);
        }
        self.signal.notify_all();
    }
}
