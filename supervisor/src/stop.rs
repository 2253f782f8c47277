use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Cooperative cancellation signal handed to a supervised worker.
#[derive(Debug, Clone)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopToken {
    pub(crate) fn new(flag: Arc<AtomicBool>, notify: Arc<Notify>) -> Self {
        Self { flag, notify }
    }

    /// Returns whether [`crate::Handle::request_stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Waits until stop has been requested. A worker that can only check
    /// between blocking steps should use [`StopToken::is_stopped`] instead.
    pub async fn cancelled(&self) {
        if self.is_stopped() {
            return;
        }
        self.notify.notified().await;
    }

    /// Returns the underlying flag, for workers that hand cancellation off
    /// to a non-cooperative API expecting its own `Arc<AtomicBool>` (e.g.
    /// `quarry_llama::Llama::respond_cancellable`) rather than polling
    /// [`StopToken::is_stopped`] itself.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_returns_immediately_once_flag_is_set() {
        let flag = Arc::new(AtomicBool::new(true));
        let notify = Arc::new(Notify::new());
        let token = StopToken::new(flag, notify);

        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("cancelled() should resolve immediately when already stopped");
    }
}
