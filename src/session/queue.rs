//! Per-observer serial task queue.
//!
//! Every observer owns one queue that runs platform callbacks one at a time
//! on a dedicated tokio task. Listener delivery happens on a separate
//! channel, so a slow consumer never stalls the callback side.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{CallbackSink, ObserverError};

enum Job<T> {
    Item(T),
    Barrier(oneshot::Sender<()>),
}

/// Serial executor with deterministic drain-and-join shutdown.
pub struct TaskQueue<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job<T>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Spawn the queue task. Must be called from within a tokio runtime.
    pub fn spawn<F>(name: &'static str, handler: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self::spawn_with(name, |_| handler)
    }

    /// Spawn the queue task with a handler that needs a sink back into its
    /// own queue (for registrations made from inside a callback).
    pub fn spawn_with<B, F>(name: &'static str, build: B) -> Self
    where
        B: FnOnce(CallbackSink<T>) -> F,
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<T>>();
        let self_tx = tx.clone();
        let mut handler = build(CallbackSink::new(move |item| {
            self_tx.send(Job::Item(item)).is_ok()
        }));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    job = rx.recv() => match job {
                        Some(job) => run_job(job, &mut handler),
                        None => break,
                    },
                    () = token.cancelled() => break,
                }
            }

            // Drain whatever was queued before shutdown.
            rx.close();
            while let Some(job) = rx.recv().await {
                run_job(job, &mut handler);
            }
            tracing::trace!(queue = name, "Task queue drained");
        });

        Self {
            name,
            tx,
            cancel,
            handle: Some(handle),
        }
    }

    /// Queue name, used in log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue one item. Returns `false` if the queue has shut down.
    pub fn push(&self, item: T) -> bool {
        self.tx.send(Job::Item(item)).is_ok()
    }

    /// A sink that enqueues into this queue, for platform registrations.
    #[must_use]
    pub fn sink(&self) -> CallbackSink<T> {
        let tx = self.tx.clone();
        CallbackSink::new(move |item| tx.send(Job::Item(item)).is_ok())
    }

    /// Wait until every item queued before this call has been handled.
    ///
    /// # Errors
    ///
    /// Returns `ObserverError::ChannelClosed` if the queue task is gone.
    pub async fn flush(&self) -> Result<(), ObserverError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Job::Barrier(ack_tx))
            .map_err(|_| ObserverError::ChannelClosed)?;
        ack_rx.await.map_err(|_| ObserverError::ChannelClosed)
    }

    /// Stop accepting work, drain what is queued, and join the task.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(queue = self.name, error = %e, "Task queue ended abnormally");
            }
        }
    }
}

impl<T> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn run_job<T>(job: Job<T>, handler: &mut impl FnMut(T)) {
    match job {
        Job::Item(item) => handler(item),
        Job::Barrier(ack) => {
            let _ = ack.send(());
        }
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

/// Wait for the next event with an upper bound.
///
/// # Errors
///
/// Returns `ObserverError::Timeout` when nothing arrives in time and
/// `ObserverError::ChannelClosed` when the observer has gone away.
pub async fn recv_within<E>(
    rx: &mut mpsc::UnboundedReceiver<E>,
    timeout: Duration,
) -> Result<E, ObserverError> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(ObserverError::ChannelClosed),
        Err(_) => Err(ObserverError::Timeout(timeout)),
    }
}
