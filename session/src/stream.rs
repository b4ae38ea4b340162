//! Latest-value output stream with producer-side cancellation.

use std::sync::Mutex;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::WatchStream;

/// Publishes successive values to any number of observers. Observers that
/// subscribe late see the most recent value first.
///
/// Closing the stream drops the sender, so subscribers observe the end of
/// the stream, and aborts every task attached to it. Closing is idempotent.
pub struct OutputStream<T> {
    tx: Mutex<Option<watch::Sender<T>>>,
    attached: Mutex<Vec<AbortHandle>>,
}

impl<T: Clone + Send + Sync + 'static> OutputStream<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: Mutex::new(Some(tx)),
            attached: Mutex::new(Vec::new()),
        }
    }

    /// Replace the current value. Returns `false` once the stream is closed.
    pub fn publish(&self, value: T) -> bool {
        match lock(&self.tx).as_ref() {
            Some(tx) => {
                tx.send_replace(value);
                true
            }
            None => false,
        }
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<T>> {
        lock(&self.tx).as_ref().map(|tx| tx.subscribe())
    }

    /// Subscribe as a `Stream` that yields the current value immediately.
    pub fn stream(&self) -> Option<WatchStream<T>> {
        self.subscribe().map(WatchStream::new)
    }

    pub fn latest(&self) -> Option<T> {
        lock(&self.tx).as_ref().map(|tx| tx.borrow().clone())
    }

    /// Tie a background task to this stream's lifetime.
    pub fn attach(&self, handle: AbortHandle) {
        if self.is_closed() {
            handle.abort();
            return;
        }
        let mut attached = lock(&self.attached);
        attached.retain(|h| !h.is_finished());
        attached.push(handle);
    }

    /// Returns `true` on the first call only.
    pub fn close(&self) -> bool {
        let Some(tx) = lock(&self.tx).take() else {
            return false;
        };
        drop(tx);
        for handle in lock(&self.attached).drain(..) {
            handle.abort();
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.tx).is_none()
    }
}

impl<T> Drop for OutputStream<T> {
    fn drop(&mut self) {
        if let Ok(attached) = self.attached.get_mut() {
            for handle in attached.drain(..) {
                handle.abort();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
