//! Bounded FIFO shared between producer and consumer threads.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

use crate::capture::ConfigError;

/// How an insertion behaves when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Non-blocking: reject the item and hand it back.
    Tap,
    /// Blocking: wait until a consumer makes room.
    #[default]
    Push,
    /// Non-blocking: grow the capacity and accept the item.
    Shove,
}

impl FromStr for AdmissionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tap" => Ok(Self::Tap),
            "push" => Ok(Self::Push),
            "shove" => Ok(Self::Shove),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> State<T> {
    #[inline]
    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }
}

/// Thread-safe FIFO with three admission policies.
///
/// The policy is chosen per call, not per queue: [`tap`](Self::tap)
/// drops when full, [`push`](Self::push) blocks when full and
/// [`shove`](Self::shove) grows when full. [`pop`](Self::pop) blocks while
/// empty. Items leave in the order they were accepted.
///
/// There is no close or timeout: a consumer blocked in `pop` with no
/// producer left stays blocked. Callers that need to stop a consumer send
/// an in-band marker item.
pub struct FrameQueue<T> {
    state: Mutex<State<T>>,
    /// Signalled when an item is removed.
    not_full: Condvar,
    /// Signalled when an item is added.
    not_empty: Condvar,
}

impl<T> FrameQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueues without blocking if there is room.
    ///
    /// When full the queue is left untouched and the item is returned to
    /// the caller in `Err`.
    pub fn tap(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.is_full() {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Enqueues, waiting for room if the queue is full.
    pub fn push(&self, item: T) {
        let mut state = self.state.lock();
        while state.is_full() {
            self.not_full.wait(&mut state);
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
    }

    /// Enqueues without blocking, growing the capacity if the queue is full.
    pub fn shove(&self, item: T) {
        let mut state = self.state.lock();
        if state.is_full() {
            state.capacity = state.items.len() + 1;
            tracing::debug!(capacity = state.capacity, "Queue grown by shove");
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
    }

    /// Enqueues using the given policy.
    ///
    /// Only [`AdmissionPolicy::Tap`] can return the item back.
    pub fn admit(&self, policy: AdmissionPolicy, item: T) -> Result<(), T> {
        match policy {
            AdmissionPolicy::Tap => self.tap(item),
            AdmissionPolicy::Push => {
                self.push(item);
                Ok(())
            }
            AdmissionPolicy::Shove => {
                self.shove(item);
                Ok(())
            }
        }
    }

    /// Removes the oldest item, waiting while the queue is empty.
    pub fn pop(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Point-in-time check; may be stale by the time the caller acts on it.
    pub fn is_full(&self) -> bool {
        self.state.lock().is_full()
    }

    /// Point-in-time check; may be stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Current capacity. Only [`shove`](Self::shove) changes it.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }
}

impl<T> std::fmt::Debug for FrameQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameQueue")
            .field("len", &state.items.len())
            .field("capacity", &state.capacity)
            .finish()
    }
}
