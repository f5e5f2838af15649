use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::clock::Clock;
use super::types::TimerType;

/// A fired timer, delivered to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerMessage {
    pub transaction_id: String,
    pub timer_type: TimerType,
    /// Interval the timer was armed with, for back-off re-arms
    pub duration: Duration,
    /// Which transaction map owns `transaction_id`
    pub is_client: bool,
}

#[derive(Debug)]
struct Entry {
    when: Instant,
    seq: u64,
    message: TimerMessage,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.when, self.seq).cmp(&(other.when, other.seq))
    }
}

#[derive(Debug, Default)]
struct Inner {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

/// Pending transaction timers ordered by fire time, then insertion order.
///
/// Entries are never cancelled; a transaction ignores timers that no longer
/// apply to its state. Re-arming inserts a fresh entry.
pub struct TimerQueue {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl TimerQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        TimerQueue {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Arm `timer_type` for `transaction_id` to fire `duration` from now.
    pub fn add(
        &self,
        timer_type: TimerType,
        transaction_id: &str,
        duration: Duration,
        is_client: bool,
    ) {
        let when = self.clock.now() + duration;
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        trace!(tid = %transaction_id, timer = %timer_type, ms = duration.as_millis() as u64, "Timer armed");
        inner.heap.push(Reverse(Entry {
            when,
            seq,
            message: TimerMessage {
                transaction_id: transaction_id.to_string(),
                timer_type,
                duration,
                is_client,
            },
        }));
    }

    /// Remove and return every timer due at the current clock time.
    pub fn process(&self) -> Vec<TimerMessage> {
        self.process_until(self.clock.now())
    }

    /// Remove and return every timer due at or before `now`, soonest first.
    pub fn process_until(&self, now: Instant) -> Vec<TimerMessage> {
        let mut inner = self.inner.lock();
        let mut fired = Vec::new();
        while inner.heap.peek().is_some_and(|Reverse(e)| e.when <= now) {
            if let Some(Reverse(entry)) = inner.heap.pop() {
                fired.push(entry.message);
            }
        }
        fired
    }

    /// Milliseconds until the soonest timer, rounded down; `None` when empty.
    pub fn ms_till_next_timer(&self) -> Option<u64> {
        let now = self.clock.now();
        self.inner
            .lock()
            .heap
            .peek()
            .map(|Reverse(e)| e.when.saturating_duration_since(now).as_millis() as u64)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerQueue").field("pending", &self.len()).finish()
    }
}
