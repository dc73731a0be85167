use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

/// Locks a mutex, recovering the guard if a panicking pipeline function poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turns an unbounded receiver into a boxed stream that ends when every sender is gone.
pub(crate) fn receiver_stream<T: Send + 'static>(
    receiver: mpsc::UnboundedReceiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|value| (value, receiver))
    })
    .boxed()
}

/// Per-subscriber unbounded queues. Slow subscribers never lose values and never
/// block the publisher.
struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
    closed: bool,
}

impl<T: Clone> Subscribers<T> {
    fn new() -> Self {
        Subscribers {
            senders: Vec::new(),
            closed: false,
        }
    }

    fn publish(&mut self, value: &T) {
        self.senders.retain(|sender| sender.send(value.clone()).is_ok());
    }

    fn attach(&mut self) -> Option<(mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<T>)> {
        if self.closed {
            return None;
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.push(sender.clone());
        Some((sender, receiver))
    }

    fn close(&mut self) {
        self.closed = true;
        self.senders.clear();
    }
}

struct StateInner<S> {
    current: S,
    subscribers: Subscribers<S>,
}

/// Latest-value channel: a new subscriber first receives the committed state,
/// then every later commit in order.
pub(crate) struct StateChannel<S> {
    inner: Mutex<StateInner<S>>,
}

impl<S: Clone + Send + 'static> StateChannel<S> {
    pub(crate) fn new(initial_state: S) -> Self {
        StateChannel {
            inner: Mutex::new(StateInner {
                current: initial_state,
                subscribers: Subscribers::new(),
            }),
        }
    }

    pub(crate) fn current(&self) -> S {
        lock(&self.inner).current.clone()
    }

    /// Commits and broadcasts a new state. Returns false once the channel is closed,
    /// in which case the committed value stays pinned.
    pub(crate) fn commit(&self, state: S) -> bool {
        let mut inner = lock(&self.inner);
        if inner.subscribers.closed {
            return false;
        }
        inner.subscribers.publish(&state);
        inner.current = state;
        true
    }

    pub(crate) fn subscribe(&self) -> BoxStream<'static, S> {
        let mut inner = lock(&self.inner);
        let current = inner.current.clone();
        match inner.subscribers.attach() {
            Some((sender, receiver)) => {
                // Sent under the lock so no commit can slip in ahead of it.
                let _ = sender.send(current);
                receiver_stream(receiver)
            }
            None => stream::empty().boxed(),
        }
    }

    pub(crate) fn close(&self) {
        lock(&self.inner).subscribers.close();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.senders.len()
    }
}

/// Fire-and-forget channel: values published while nobody listens are dropped.
pub(crate) struct NewsChannel<N> {
    subscribers: Mutex<Subscribers<N>>,
}

impl<N: Clone + Send + 'static> NewsChannel<N> {
    pub(crate) fn new() -> Self {
        NewsChannel {
            subscribers: Mutex::new(Subscribers::new()),
        }
    }

    pub(crate) fn publish(&self, news: N) {
        let mut subscribers = lock(&self.subscribers);
        if !subscribers.closed {
            subscribers.publish(&news);
        }
    }

    pub(crate) fn subscribe(&self) -> BoxStream<'static, N> {
        match lock(&self.subscribers).attach() {
            Some((_, receiver)) => receiver_stream(receiver),
            None => stream::empty().boxed(),
        }
    }

    pub(crate) fn close(&self) {
        lock(&self.subscribers).close();
    }
}
