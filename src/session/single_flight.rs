use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;

type SharedOp<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Coordinates concurrent callers of one logical operation so that only a
/// single instance runs at a time.
///
/// The first caller installs the shared operation before any work starts;
/// every caller that arrives while it is in flight attaches to the same
/// handle; when the operation settles the slot clears itself and all
/// attached callers observe the same outcome.
pub struct SingleFlight<T, E> {
    slot: Arc<Mutex<Option<SharedOp<T, E>>>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the in-flight operation, starting it via `start` if none
    /// exists. `start` is only invoked when this caller is first.
    pub fn join<F, Fut>(&self, start: F) -> SharedOp<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap();
        if let Some(op) = slot.as_ref() {
            return op.clone();
        }

        let cleanup = Arc::clone(&self.slot);
        let fut = start();
        let op = async move {
            let result = fut.await;
            *cleanup.lock().unwrap() = None;
            result
        }
        .boxed()
        .shared();

        *slot = Some(op.clone());
        op
    }

    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_joins_run_the_operation_once() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let runs = Arc::clone(&runs);
            handles.push(flight.join(move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(7)
            }));
        }

        for handle in handles {
            assert_eq!(handle.await, Ok(7));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_clears_after_settle() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();

        let op = flight.join(|| async { Ok(1) });
        assert!(flight.is_in_flight());
        op.await.unwrap();
        assert!(!flight.is_in_flight());

        // A fresh join starts a new operation
        let op = flight.join(|| async { Ok(2) });
        assert_eq!(op.await, Ok(2));
    }

    #[tokio::test]
    async fn failures_are_shared_too() {
        let flight: SingleFlight<u32, String> = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let runs_in_op = Arc::clone(&runs);
        let first = flight.join(move || async move {
            runs_in_op.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err("boom".to_string())
        });
        let second = flight.join(|| async { Ok(99) });

        assert_eq!(first.await, Err("boom".to_string()));
        assert_eq!(second.await, Err("boom".to_string()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
