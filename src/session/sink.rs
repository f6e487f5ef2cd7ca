//! Callback sinks handed to platform collaborators.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

/// A cloneable delivery handle for raw platform callbacks.
///
/// Observers create sinks from their callback queue and pass them to the
/// platform at registration time. The platform calls [`CallbackSink::deliver`]
/// from whatever thread it likes; delivery never blocks.
pub struct CallbackSink<T> {
    deliver: Arc<dyn Fn(T) -> bool + Send + Sync>,
}

impl<T> Clone for CallbackSink<T> {
    fn clone(&self) -> Self {
        Self {
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<T> fmt::Debug for CallbackSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> CallbackSink<T> {
    /// Wrap a delivery function. It returns `false` once the receiving side
    /// is gone.
    pub fn new(deliver: impl Fn(T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Sink that forwards into an unbounded channel.
    #[must_use]
    pub fn from_sender(tx: mpsc::UnboundedSender<T>) -> Self {
        Self::new(move |item| tx.send(item).is_ok())
    }

    /// Deliver one callback. Returns `false` if the observer has shut down.
    pub fn deliver(&self, item: T) -> bool {
        (self.deliver)(item)
    }

    /// Build a sink for another callback type that converts into this one.
    ///
    /// Used to tag callbacks with their owner before they reach the queue.
    #[must_use]
    pub fn map<U, F>(&self, convert: F) -> CallbackSink<U>
    where
        U: Send + 'static,
        F: Fn(U) -> T + Send + Sync + 'static,
    {
        let inner = self.clone();
        CallbackSink::new(move |item| inner.deliver(convert(item)))
    }
}
