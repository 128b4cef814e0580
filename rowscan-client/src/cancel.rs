/// Cooperative cancellation shared between a read and its owner
use crate::error::CancelReason;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    notify: Notify,
}

/// Cloneable handle that cancels one read.
///
/// The first reason recorded wins; later calls are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel on behalf of the application.
    pub fn cancel(&self) {
        self.cancel_with(CancelReason::UserCancelled);
    }

    pub fn cancel_with(&self, reason: CancelReason) {
        {
            let mut slot = self.shared.reason.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(reason);
        }
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<CancelReason> {
        if !self.is_cancelled() {
            return None;
        }
        self.shared.reason.lock().clone()
    }

    /// Resolves once the read is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());
        assert_eq!(handle.reason(), None);

        handle.cancel_with(CancelReason::ConsumerDeclined);
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.reason(), Some(CancelReason::ConsumerDeclined));
    }

    #[test]
    fn test_clones_share_state() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        other.cancel();
        assert_eq!(handle.reason(), Some(CancelReason::UserCancelled));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let handle = CancelHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_cancelled_is_pending_until_cancel() {
        let handle = CancelHandle::new();
        let mut waiting = tokio_test::task::spawn(handle.cancelled());
        tokio_test::assert_pending!(waiting.poll());

        handle.cancel();
        assert!(waiting.is_woken());
        tokio_test::assert_ready!(waiting.poll());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let handle = CancelHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(100), handle.cancelled())
            .await
            .unwrap();
    }
}
