//! Thread-safe FIFO used as the hand-off point between stack components.
//!
//! Producers (transports, timers, the transaction user) may live on any
//! thread; each FIFO is expected to have a single consumer so that
//! per-transaction ordering is preserved.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// An unbounded, mutex and condition-variable guarded queue.
///
/// Cloning a `Fifo` yields another handle to the same queue.
pub struct Fifo<T> {
    inner: Arc<FifoInner<T>>,
}

struct FifoInner<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
    description: String,
}

impl<T> Fifo<T> {
    /// Create an empty FIFO. `description` is used in log output only.
    pub fn new(description: impl Into<String>) -> Self {
        Fifo {
            inner: Arc::new(FifoInner {
                queue: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                description: description.into(),
            }),
        }
    }

    /// Append an item and wake one waiting consumer.
    pub fn add(&self, item: T) {
        let mut queue = self.inner.queue.lock();
        queue.push_back(item);
        self.inner.available.notify_one();
    }

    /// Append several items atomically with respect to other producers.
    pub fn add_multiple(&self, items: impl IntoIterator<Item = T>) {
        let mut queue = self.inner.queue.lock();
        let before = queue.len();
        queue.extend(items);
        if queue.len() > before {
            self.inner.available.notify_all();
        }
    }

    /// Pop the oldest item without blocking.
    pub fn try_get(&self) -> Option<T> {
        self.inner.queue.lock().pop_front()
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive.
    pub fn get_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.queue.lock();
        while queue.is_empty() {
            if self
                .inner
                .available
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                break;
            }
        }
        queue.pop_front()
    }

    /// Pop the oldest item, blocking until one is available.
    pub fn get(&self) -> T {
        let mut queue = self.inner.queue.lock();
        loop {
            if let Some(item) = queue.pop_front() {
                return item;
            }
            self.inner.available.wait(&mut queue);
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }
}

impl<T> Clone for Fifo<T> {
    fn clone(&self) -> Self {
        Fifo {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Fifo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fifo({}, size={})", self.inner.description, self.len())
    }
}
