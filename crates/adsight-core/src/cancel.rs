//! Cooperative cancellation for a single chat turn.
//!
//! A [`CancelToken`] fires either when its [`CancelHandle`] is triggered
//! (e.g. the client disconnected) or when its wall-clock deadline passes.
//! Long-running steps race their backend futures against
//! [`CancelToken::cancelled`] so that abandoned turns stop promptly.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The handle was triggered explicitly.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

/// Triggering side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Fire every token created from this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observing side of a cancellation pair. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a handle/token pair without a deadline.
    pub fn channel() -> (CancelHandle, CancelToken) {
        Self::pair(None)
    }

    /// Create a handle/token pair that also fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> (CancelHandle, CancelToken) {
        Self::pair(Some(deadline))
    }

    /// A token that never fires.
    pub fn never() -> CancelToken {
        Self::pair(None).1
    }

    fn pair(deadline: Option<Instant>) -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            CancelToken { rx, deadline },
        )
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check.
    pub fn reason(&self) -> Option<CancelReason> {
        if *self.rx.borrow() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the token fires. Never resolves for a token whose
    /// handle was dropped without firing and which has no deadline.
    pub async fn cancelled(&self) -> CancelReason {
        let mut rx = self.rx.clone();
        let explicit = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Handle dropped without firing.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = explicit => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                explicit.await;
                CancelReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_token_is_not_cancelled() {
        let (_handle, token) = CancelToken::channel();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[tokio::test]
    async fn test_cancel_fires_all_clones() {
        let (handle, token) = CancelToken::channel();
        let clone = token.clone();
        handle.cancel();
        assert_eq!(token.reason(), Some(CancelReason::Cancelled));
        assert_eq!(clone.cancelled().await, CancelReason::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiting_task() {
        let (handle, token) = CancelToken::channel();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::task::yield_now().await;
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), CancelReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let (_handle, token) =
            CancelToken::with_deadline(Instant::now() + Duration::from_secs(180));
        assert!(!token.is_cancelled());
        assert_eq!(token.cancelled().await, CancelReason::DeadlineExceeded);
        assert_eq!(token.reason(), Some(CancelReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_does_not_fire() {
        let (handle, token) = CancelToken::channel();
        drop(handle);
        let result =
            tokio::time::timeout(Duration::from_secs(5), token.cancelled()).await;
        assert!(result.is_err(), "token without deadline must stay pending");
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_with_timeout() {
        let token = CancelToken::never();
        assert!(token.deadline().is_none());
        let result = tokio::time::timeout(Duration::from_secs(1), token.cancelled()).await;
        assert!(result.is_err());
    }
}
