use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::chain::callback::{Cancelable, CallbackHandler, ErrorInfo};

/// Result sink that chains one asynchronous stage onto another.
///
/// Errors pass through unchanged; results are transformed into the
/// downstream type. Registered upstream cancelers are aggregated so a
/// single `cancel()` stops the whole chain. `activity_count` exposes total
/// completions, used to assert that exactly N sub-operations finished.
pub struct AsyncChain<T, U> {
    downstream: Arc<dyn CallbackHandler<U>>,
    transform: Box<dyn Fn(T) -> U + Send + Sync>,
    results: AtomicUsize,
    errors: AtomicUsize,
    cancelers: RwLock<Vec<Arc<dyn Cancelable>>>,
}

impl<T, U> AsyncChain<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    pub fn new<F>(downstream: Arc<dyn CallbackHandler<U>>, transform: F) -> Self
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Self {
            downstream,
            transform: Box::new(transform),
            results: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            cancelers: RwLock::new(Vec::new()),
        }
    }

    /// Chain with the natural conversion as its transform
    pub fn forwarding(downstream: Arc<dyn CallbackHandler<U>>) -> Self
    where
        U: From<T>,
    {
        Self::new(downstream, U::from)
    }

    /// Register an upstream canceler aggregated by this chain's `cancel`
    pub fn add_canceler(&self, canceler: Arc<dyn Cancelable>) {
        self.cancelers
            .write()
            .expect("canceler set poisoned")
            .push(canceler);
    }

    pub fn result_count(&self) -> usize {
        self.results.load(Ordering::SeqCst)
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// Total completions seen so far: results plus errors
    pub fn activity_count(&self) -> usize {
        self.result_count() + self.error_count()
    }
}

impl<T, U> Cancelable for AsyncChain<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn cancel(&self) {
        let snapshot = self
            .cancelers
            .read()
            .expect("canceler set poisoned")
            .clone();
        for canceler in snapshot {
            canceler.cancel();
        }
    }
}

#[async_trait]
impl<T, U> CallbackHandler<T> for AsyncChain<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    async fn result(&self, value: T) {
        self.results.fetch_add(1, Ordering::SeqCst);
        let converted = (self.transform)(value);
        self.downstream.result(converted).await;
    }

    async fn error(&self, error: ErrorInfo) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.downstream.error(error).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::callback::ErrorCode;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    struct Recorder {
        values: Mutex<Vec<String>>,
        errors: Mutex<Vec<ErrorInfo>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                values: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CallbackHandler<String> for Recorder {
        async fn result(&self, value: String) {
            self.values.lock().unwrap().push(value);
        }

        async fn error(&self, error: ErrorInfo) {
            self.errors.lock().unwrap().push(error);
        }
    }

    struct FlagCanceler(AtomicBool);

    impl Cancelable for FlagCanceler {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_transform_and_counts() {
        let recorder = Recorder::new();
        let chain: AsyncChain<i64, String> =
            AsyncChain::new(recorder.clone(), |n| format!("n={}", n));

        chain.result(4).await;
        chain
            .error(ErrorInfo::new(ErrorCode::ExecutionFailed, "boom"))
            .await;
        chain.result(5).await;

        assert_eq!(chain.result_count(), 2);
        assert_eq!(chain.error_count(), 1);
        assert_eq!(chain.activity_count(), 3);
        assert_eq!(
            *recorder.values.lock().unwrap(),
            vec!["n=4".to_string(), "n=5".to_string()]
        );
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_fans_out_to_upstreams() {
        let recorder = Recorder::new();
        let chain: AsyncChain<String, String> = AsyncChain::new(recorder, |s| s);
        let first = Arc::new(FlagCanceler(AtomicBool::new(false)));
        let second = Arc::new(FlagCanceler(AtomicBool::new(false)));
        chain.add_canceler(first.clone());
        chain.add_canceler(second.clone());

        chain.cancel();
        assert!(first.0.load(Ordering::SeqCst));
        assert!(second.0.load(Ordering::SeqCst));
    }
}
