use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Re-armable hard-expiry timer.
///
/// At most one deadline is armed at a time: arming cancels the previous
/// task, and firing is unconditional: the safety margin only moves when a
/// proactive refresh is attempted, never the cutoff itself.
#[derive(Default)]
pub struct ExpiryTimer {
    armed: Mutex<Option<CancellationToken>>,
}

impl ExpiryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer for `deadline`, replacing any previous one. `on_fire`
    /// runs once if the deadline passes before the next re-arm or cancel.
    pub fn arm<F, Fut>(&self, deadline: DateTime<Utc>, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.armed.lock().unwrap().replace(token.clone()) {
            previous.cancel();
        }

        let delay = (deadline - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        debug!(deadline = %deadline, delay_ms = delay.as_millis() as u64, "Expiry timer armed");

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    debug!("Expiry deadline reached");
                    on_fire().await;
                }
            }
        });
    }

    /// Cancel the armed deadline, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.armed.lock().unwrap().take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.lock().unwrap().is_some()
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fires_at_the_deadline() {
        let timer = ExpiryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timer.arm(Utc::now() + chrono::Duration::milliseconds(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let timer = ExpiryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timer.arm(Utc::now() + chrono::Duration::milliseconds(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rearm_replaces_the_previous_deadline() {
        let timer = ExpiryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timer.arm(Utc::now() + chrono::Duration::milliseconds(30), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&fired);
        timer.arm(Utc::now() + chrono::Duration::milliseconds(60), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Only the second deadline fires
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn past_deadline_fires_immediately() {
        let timer = ExpiryTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        timer.arm(Utc::now() - chrono::Duration::seconds(5), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
