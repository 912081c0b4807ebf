// ── Reactive values ──
//
// `Observable<T>` is the publishing side of every field the core exposes
// (connection state aside): a `watch` channel that only notifies when the
// new value differs from the old one. `ValueStream<T>` is the handle
// consumers hold.

use tokio::sync::watch;

/// A published value with distinct-until-changed notification.
///
/// Setting a value equal to the current one is a no-op: no subscriber
/// wakes up. This is what keeps duplicate demand from restarting streams.
#[derive(Debug)]
pub struct Observable<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Current value (cloned).
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Replace the value. Returns `true` if it changed and subscribers
    /// were notified.
    pub fn set(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Subscribe to future changes.
    pub fn subscribe(&self) -> ValueStream<T> {
        ValueStream::new(self.sender.subscribe())
    }

    /// Raw `watch` receiver for `tokio::select!` loops.
    pub fn receiver(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A subscription to an [`Observable`].
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via the `changed()` method.
pub struct ValueStream<T: Clone + Send + Sync + 'static> {
    current: T,
    receiver: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> ValueStream<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<T>) -> Self {
        let current = receiver.borrow_and_update().clone();
        Self { current, receiver }
    }

    /// Get the value captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Get the latest value (may have changed since creation).
    pub fn latest(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Whether a newer value has been published since the last
    /// `changed()`. `false` once the publisher is gone.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change, returning the new value.
    /// Returns `None` if the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        let value = self.receiver.borrow_and_update().clone();
        self.current = value.clone();
        Some(value)
    }

    /// Stop listening. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}
