//! The claim decision timer.
//!
//! Only the scheduler waits on the timer, but any peer session may stop it
//! or re-arm it while handling a backoff. The deadline is published through
//! a `watch` channel so the scheduler notices every change.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Shared handle to the decision timer.
#[derive(Debug, Clone)]
pub struct ClaimTimer {
    deadline: Arc<watch::Sender<Option<Instant>>>,
}

impl ClaimTimer {
    /// Create a stopped timer.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            deadline: Arc::new(tx),
        }
    }

    /// (Re)start the timer so it fires `after` from now.
    pub fn arm(&self, after: Duration) {
        self.deadline.send_replace(Some(Instant::now() + after));
    }

    /// Stop the timer without firing.
    pub fn stop(&self) {
        self.deadline.send_replace(None);
    }

    /// Stop the timer only if it is still set to `deadline`.
    ///
    /// Returns false when someone re-armed or stopped it in the meantime.
    pub fn disarm_if(&self, deadline: Instant) -> bool {
        self.deadline.send_if_modified(|current| {
            if *current == Some(deadline) {
                *current = None;
                true
            } else {
                false
            }
        })
    }

    /// The current deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.borrow()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline().is_some()
    }

    /// Watch the deadline for changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Instant>> {
        self.deadline.subscribe()
    }
}

impl Default for ClaimTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleep until `deadline`, or forever when the timer is stopped.
pub(crate) async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_arm_and_stop() {
        let timer = ClaimTimer::new();
        assert!(!timer.is_armed());

        timer.arm(Duration::from_secs(5));
        let deadline = timer.deadline().unwrap();
        assert_eq!(deadline - Instant::now(), Duration::from_secs(5));

        timer.stop();
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_restarts_rather_than_accumulates() {
        let timer = ClaimTimer::new();
        timer.arm(Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(3)).await;
        timer.arm(Duration::from_secs(5));

        let remaining = timer.deadline().unwrap() - Instant::now();
        assert_eq!(remaining, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_if_only_matching_deadline() {
        let timer = ClaimTimer::new();
        timer.arm(Duration::from_secs(1));
        let first = timer.deadline().unwrap();

        tokio::time::advance(Duration::from_millis(10)).await;
        timer.arm(Duration::from_secs(1));

        assert!(!timer.disarm_if(first));
        assert!(timer.is_armed());

        let second = timer.deadline().unwrap();
        assert!(timer.disarm_if(second));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_changes() {
        let timer = ClaimTimer::new();
        let mut rx = timer.subscribe();

        let other = timer.clone();
        other.arm(Duration::from_secs(1));

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_waits_for_deadline() {
        let start = Instant::now();
        expired(Some(start + Duration::from_secs(2))).await;
        assert!(Instant::now() - start >= Duration::from_secs(2));

        let never = tokio::time::timeout(Duration::from_secs(60), expired(None)).await;
        assert!(never.is_err());
    }
}
