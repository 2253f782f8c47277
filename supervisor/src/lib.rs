//! Process Supervisor: starts an in-process worker task, streams its output
//! line by line, and reports completion exactly once.
//!
//! Workers are plain async functions rather than spawned subprocesses (see
//! [`Supervisor::start`]); the literal subprocess case is left to whichever
//! backend shells out to an external program.

mod handle;
mod stop;

pub use handle::Handle;
pub use stop::StopToken;

use std::future::Future;
use std::time::Duration;

use async_channel::Sender;
use thiserror::Error;
use tokio::sync::Notify;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Word that, when it matches user input, triggers an emergency stop of the
/// active handle.
pub const EMERGENCY_STOP_WORD: &str = "STOP";

/// Grace period given to a worker to react to [`Handle::request_stop`] before
/// it is forcibly aborted.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Default wall-clock ceiling applied to a single supervised worker.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Returns whether `input` is the case-sensitive emergency stop word.
#[must_use]
pub fn is_emergency_stop(input: &str) -> bool {
    input == EMERGENCY_STOP_WORD
}

/// Classifies why a supervised worker stopped short of its own completion.
///
/// Both variants surface as completion status `-1`; this type lets a caller
/// tell them apart via [`Handle::timed_out`] without adding a third status
/// code to the worker contract.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// `request_stop()` was called (directly, or via the emergency stop
    /// word) before the worker finished on its own.
    #[error("response halted by user")]
    Cancelled,
    /// The worker exceeded its wall-clock ceiling.
    #[error("operation timed out")]
    Timeout,
}

/// Sink a worker uses to emit lines of output.
///
/// Cloning shares the underlying channel; the supervisor's consumer loop ends
/// once every clone is dropped.
#[derive(Debug, Clone)]
pub struct LineSink {
    tx: Sender<String>,
}

impl LineSink {
    /// Sends a line to the supervisor's consumer.
    ///
    /// Returns `false` if the consumer side has already been dropped, in
    /// which case the worker should wind down.
    pub async fn send(&self, line: impl Into<String>) -> bool {
        self.tx.send(line.into()).await.is_ok()
    }
}

/// Builds and starts a supervised worker task.
///
/// `W` receives a [`LineSink`] to emit output and a [`StopToken`] to observe
/// cancellation, and resolves to a status code once it completes.
pub struct Supervisor<W> {
    worker: W,
    on_line: Option<Box<dyn FnMut(String) + Send + 'static>>,
    on_complete: Option<Box<dyn FnOnce(i32) + Send + 'static>>,
    timeout: Duration,
}

impl<W, Fut> Supervisor<W>
where
    W: FnOnce(LineSink, StopToken) -> Fut + Send + 'static,
    Fut: Future<Output = i32> + Send + 'static,
{
    /// Creates a new supervisor around `worker`. The worker does not run
    /// until [`Supervisor::start`] is called.
    pub fn new(worker: W) -> Self {
        Self { worker, on_line: None, on_complete: None, timeout: DEFAULT_TIMEOUT }
    }

    /// Overrides the default 300s wall-clock ceiling applied to the worker.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registers a callback invoked for each line the worker emits, in
    /// order, on a single consumer task.
    #[must_use]
    pub fn on_line(mut self, callback: impl FnMut(String) + Send + 'static) -> Self {
        self.on_line = Some(Box::new(callback));
        self
    }

    /// Registers a callback invoked exactly once when the worker finishes,
    /// with its status code (or `-1` if it was cancelled).
    #[must_use]
    pub fn on_complete(mut self, callback: impl FnOnce(i32) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Spawns the worker and its consumer loop, returning a [`Handle`] that
    /// can request cancellation.
    pub fn start(self) -> Handle {
        let (tx, rx) = async_channel::unbounded::<String>();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let worker_token = StopToken::new(stop_flag.clone(), notify.clone());
        let sink = LineSink { tx };
        let worker = self.worker;

        let worker_task = tokio::spawn(async move { worker(sink, worker_token).await });
        let abort_handle = worker_task.abort_handle();
        let timed_out = Arc::new(AtomicBool::new(false));

        let mut on_line = self.on_line;
        let on_complete = self.on_complete;

        let supervisor_task = tokio::spawn(async move {
            while let Ok(line) = rx.recv().await {
                if let Some(callback) = on_line.as_mut() {
                    callback(line);
                }
            }

            let status = match worker_task.await {
                Ok(status) => status,
                Err(join_error) => {
                    if join_error.is_cancelled() {
                        -1
                    } else {
                        tracing::warn!("supervised worker panicked: {join_error}");
                        -1
                    }
                }
            };

            if let Some(callback) = on_complete {
                callback(status);
            }
        });

        let grace_notify = notify.clone();
        let grace_abort = abort_handle.clone();
        tokio::spawn(async move {
            grace_notify.notified().await;
            tokio::time::sleep(STOP_GRACE_PERIOD).await;
            if !grace_abort.is_finished() {
                grace_abort.abort();
            }
        });

        let ceiling_abort = abort_handle.clone();
        let ceiling_flag = stop_flag.clone();
        let ceiling_notify = notify.clone();
        let ceiling_timed_out = timed_out.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if ceiling_abort.is_finished() {
                return;
            }
            ceiling_timed_out.store(true, std::sync::atomic::Ordering::SeqCst);
            if !ceiling_flag.swap(true, std::sync::atomic::Ordering::SeqCst) {
                ceiling_notify.notify_waiters();
            }
        });

        Handle::new(stop_flag, notify, supervisor_task, abort_handle, timed_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn lines_and_completion_are_delivered_in_order() {
        let (lines_tx, lines_rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handle = Supervisor::new(|sink, _stop| async move {
            sink.send("first").await;
            sink.send("second").await;
            0
        })
        .on_line(move |line| lines_tx.send(line).unwrap())
        .on_complete(move |status| done_tx.send(status).unwrap())
        .start();

        let status = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(status) = done_rx.try_recv() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, 0);
        let received: Vec<String> = lines_rx.try_iter().collect();
        assert_eq!(received, vec!["first".to_string(), "second".to_string()]);
        drop(handle);
    }

    #[tokio::test]
    async fn request_stop_is_idempotent_and_cancels_completion() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handle = Supervisor::new(|_sink, stop| async move {
            loop {
                if stop.is_stopped() {
                    return 0;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .on_complete(move |status| done_tx.send(status).unwrap())
        .start();

        handle.request_stop();
        handle.request_stop();

        let status = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(status) = done_rx.try_recv() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, 0);
    }

    #[tokio::test]
    async fn non_cooperative_worker_is_aborted_after_grace_period() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handle = Supervisor::new(|_sink, _stop| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            0
        })
        .on_complete(move |status| done_tx.send(status).unwrap())
        .start();

        handle.request_stop();

        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(status) = done_rx.try_recv() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, -1);
    }

    #[tokio::test]
    async fn worker_exceeding_timeout_is_marked_timed_out() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let handle = Supervisor::new(|_sink, stop| async move {
            loop {
                if stop.is_stopped() {
                    return 0;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .timeout(Duration::from_millis(50))
        .on_complete(move |status| done_tx.send(status).unwrap())
        .start();

        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(status) = done_rx.try_recv() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(status, 0);
        assert!(handle.timed_out());
    }

    #[test]
    fn emergency_stop_word_is_case_sensitive() {
        assert!(is_emergency_stop("STOP"));
        assert!(!is_emergency_stop("stop"));
        assert!(!is_emergency_stop("Stop now"));
    }

    #[test]
    fn stop_flag_ordering_is_sequential() {
        let flag = AtomicBool::new(false);
        assert!(!flag.swap(true, Ordering::SeqCst));
        assert!(flag.swap(true, Ordering::SeqCst));
    }
}
