//! Cooperative cancellation
//!
//! Every turn runs under its own [`CancellationToken`]. A stop request
//! cancels the current token and wakes whatever the turn is awaiting. A
//! request nobody acknowledges is replaced by a fresh token after a short
//! reset window, so it cannot leak into a send issued long after the user
//! pressed stop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Default delay before a cancellation request clears itself
pub const DEFAULT_RESET_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug)]
struct CancelInner {
    token: Mutex<CancellationToken>,
    /// Bumped on every request so an older reset timer never clears a newer request
    epoch: AtomicU64,
    reset_window: Duration,
}

impl CancelInner {
    /// Install a fresh token if the current one was cancelled
    fn renew(&self) {
        let mut token = self.token.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }
}

/// Shared stop control for the in-flight turn
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_WINDOW)
    }
}

impl CancelHandle {
    pub fn new(reset_window: Duration) -> Self {
        Self {
            inner: Arc::new(CancelInner {
                token: Mutex::new(CancellationToken::new()),
                epoch: AtomicU64::new(0),
                reset_window,
            }),
        }
    }

    /// Request cancellation of the in-flight turn
    ///
    /// Outside a tokio runtime the request stays set until [`clear`](Self::clear).
    pub fn cancel(&self) {
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.token.lock().cancel();
        tracing::debug!(epoch, "Cancellation requested");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(inner.reset_window).await;
            if inner.epoch.load(Ordering::SeqCst) == epoch {
                inner.renew();
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.lock().is_cancelled()
    }

    /// Token of the current turn, cancelled by the next [`cancel`](Self::cancel)
    pub fn token(&self) -> CancellationToken {
        self.inner.token.lock().clone()
    }

    /// Drop any pending request and hand out the token for a new turn
    pub fn begin_turn(&self) -> CancellationToken {
        self.clear();
        self.token()
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        let token = self.token();
        token.cancelled().await
    }

    /// Acknowledge a request once it has stopped a turn
    pub fn clear(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.renew();
    }

    pub fn reset_window(&self) -> Duration {
        self.inner.reset_window
    }
}
