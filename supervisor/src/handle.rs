use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

use crate::SupervisorError;

/// Handle to a running supervised worker.
///
/// Dropping the handle does not stop the worker; call
/// [`Handle::request_stop`] explicitly, or [`Handle::join`] to wait for
/// natural completion.
pub struct Handle {
    stop_flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
    supervisor_task: JoinHandle<()>,
    worker_abort: AbortHandle,
    timed_out: Arc<AtomicBool>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("stopped", &self.stop_flag.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Handle {
    pub(crate) fn new(
        stop_flag: Arc<AtomicBool>,
        notify: Arc<Notify>,
        supervisor_task: JoinHandle<()>,
        worker_abort: AbortHandle,
        timed_out: Arc<AtomicBool>,
    ) -> Self {
        Self { stop_flag, notify, supervisor_task, worker_abort, timed_out }
    }

    /// Requests that the worker stop. Idempotent and safe to call from any
    /// thread. The worker gets a grace period to react to
    /// [`crate::StopToken::is_stopped`]/[`crate::StopToken::cancelled`]
    /// before it is forcibly aborted.
    pub fn request_stop(&self) {
        if self.stop_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
    }

    /// Returns whether `request_stop` has already been called on this
    /// handle.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Returns whether the worker has already finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.worker_abort.is_finished()
    }

    /// Returns whether the worker was stopped because it exceeded its
    /// wall-clock ceiling, as opposed to an explicit [`Handle::request_stop`].
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Waits for `on_complete` to have run and the consumer loop to exit.
    ///
    /// # Panics
    /// Panics if the internal consumer task itself panicked.
    pub async fn join(self) {
        let _ = self.supervisor_task.await;
    }

    /// Summarizes why the worker stopped, distinguishing a timeout from an
    /// explicit [`Handle::request_stop`].
    ///
    /// Returns `Ok(())` if neither happened (the worker ran to completion on
    /// its own). Only meaningful after the worker has actually finished;
    /// calling this while it's still running reflects the state so far.
    pub fn result(&self) -> Result<(), SupervisorError> {
        if self.timed_out() {
            Err(SupervisorError::Timeout)
        } else if self.is_stop_requested() {
            Err(SupervisorError::Cancelled)
        } else {
            Ok(())
        }
    }
}
