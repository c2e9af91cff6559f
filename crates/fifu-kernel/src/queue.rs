//! Blocking FIFO used for every hand-off between threads.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

/// Returned by [`BlockingQueue::pop`] once the queue has been stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue closed")]
pub struct Closed;

struct State<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// An unbounded multi-producer multi-consumer queue with cooperative
/// shutdown.
///
/// `push` never blocks. `pop` blocks until an item arrives or [`stop`] is
/// called; after `stop`, `pop` fails immediately even if items remain, while
/// [`try_pop`] can still drain them.
///
/// [`stop`]: BlockingQueue::stop
/// [`try_pop`]: BlockingQueue::try_pop
pub struct BlockingQueue<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake one waiting consumer.
    pub fn push(&self, item: T) {
        let mut state = self.state.lock();
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> Result<T, Closed> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return Err(Closed);
            }
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }
            self.available.wait(&mut state);
        }
    }

    /// Remove the oldest item without blocking, regardless of stop state.
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Wake every blocked consumer and make further `pop` calls fail.
    /// Calling it again has no effect.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        drop(state);
        self.available.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
