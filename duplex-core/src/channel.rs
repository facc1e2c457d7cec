//! Synchronized channel: a `BoundedQueue` behind a mutex, with a condvar for blocking pops.
//!
//! The queue and the closed flag are only touched with the mutex held. `close` sets the flag
//! under the lock before broadcasting, so a waiter cannot miss it between its check and its wait.

use parking_lot::{Condvar, Mutex};

use crate::pool::PoolExhausted;
use crate::queue::BoundedQueue;

struct State<T> {
    queue: BoundedQueue<T>,
    closed: bool,
}

pub struct SyncChannel<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> SyncChannel<T> {
    /// Channel over a fresh queue of `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, PoolExhausted> {
        Ok(Self::from_queue(BoundedQueue::new(capacity)?))
    }

    pub fn from_queue(queue: BoundedQueue<T>) -> Self {
        Self {
            state: Mutex::new(State {
                queue,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append and wake one waiter. Only blocks for the critical section.
    pub fn push(&self, item: T) -> Result<(), PoolExhausted> {
        self.state.lock().queue.append(item)?;
        self.ready.notify_one();
        Ok(())
    }

    /// Block until an item is available. Returns `None` once the channel is closed and drained.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.queue.remove_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().queue.remove_front()
    }

    /// Mark closed and wake every waiter. Idempotent.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_queue(self) -> BoundedQueue<T> {
        self.state.into_inner().queue
    }
}

impl<T> std::fmt::Debug for SyncChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SyncChannel")
            .field("queue", &state.queue)
            .field("closed", &state.closed)
            .finish()
    }
}
