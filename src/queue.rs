//! Multi-producer/multi-consumer FIFO with blocking push/pop, drain and shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct Inner<T> {
    q: VecDeque<T>,
}

/// A bounded (or, with `capacity == 0`, unbounded) blocking queue.
///
/// Mirrors a `std::mutex` + two `std::condition_variable`s pair: one condvar
/// wakes blocked pushers when room frees up, the other wakes blocked poppers
/// when an item arrives or the queue shuts down.
pub struct SafeQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    cv_push: Condvar,
    cv_pop: Condvar,
    shutdown_flag: AtomicBool,
    draining_flag: AtomicBool,
}

impl<T> SafeQueue<T> {
    /// `capacity == 0` means unbounded: `push` never blocks on room.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner { q: VecDeque::new() }),
            cv_push: Condvar::new(),
            cv_pop: Condvar::new(),
            shutdown_flag: AtomicBool::new(false),
            draining_flag: AtomicBool::new(false),
        }
    }

    /// Blocks until there is room (if bounded), or the queue is shutting down
    /// or draining, in which case the value is dropped without enqueueing.
    pub fn push(&self, value: T) {
        let mut guard = self.inner.lock().unwrap();
        if self.capacity > 0 {
            guard = self
                .cv_push
                .wait_while(guard, |inner| {
                    inner.q.len() >= self.capacity
                        && !self.shutdown_flag.load(Ordering::SeqCst)
                        && !self.draining_flag.load(Ordering::SeqCst)
                })
                .unwrap();
            if self.shutdown_flag.load(Ordering::SeqCst) || self.draining_flag.load(Ordering::SeqCst) {
                return;
            }
        }
        guard.q.push_back(value);
        self.cv_pop.notify_one();
    }

    /// Blocks until an item is available or the queue is shut down. Returns
    /// `None` only once shut down and drained.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        guard = self
            .cv_pop
            .wait_while(guard, |inner| {
                inner.q.is_empty() && !self.shutdown_flag.load(Ordering::SeqCst)
            })
            .unwrap();

        if guard.q.is_empty() && self.shutdown_flag.load(Ordering::SeqCst) {
            return None;
        }
        let value = guard.q.pop_front();
        if self.capacity > 0 {
            self.cv_push.notify_one();
        }
        value
    }

    /// Non-blocking pop: `None` if currently empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        let value = guard.q.pop_front();
        if value.is_some() && self.capacity > 0 {
            self.cv_push.notify_one();
        }
        value
    }

    /// Non-blocking: discards the head element, if any, without returning it.
    pub fn pop_front_discard(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.q.pop_front().is_some() && self.capacity > 0 {
            self.cv_push.notify_one();
        }
    }

    /// Blocks waiting for an item using a bounded sleep quantum instead of the
    /// indefinite wait `pop` uses; used by pacer stages that must also observe
    /// state changes (pause/seek) while a frame is in flight.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let guard = self.inner.lock().unwrap();
        let (mut guard, _timeout_result) = self
            .cv_pop
            .wait_timeout_while(guard, timeout, |inner| {
                inner.q.is_empty() && !self.shutdown_flag.load(Ordering::SeqCst)
            })
            .unwrap();

        if guard.q.is_empty() {
            return None;
        }
        let value = guard.q.pop_front();
        if value.is_some() && self.capacity > 0 {
            self.cv_push.notify_one();
        }
        value
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the queue and wakes every blocked pusher once so they observe
    /// the drain and return without enqueueing, then clears the drain flag.
    pub fn drain(&self) {
        {
            let mut guard = self.inner.lock().unwrap();
            self.draining_flag.store(true, Ordering::SeqCst);
            guard.q.clear();
        }
        self.cv_push.notify_all();
        self.draining_flag.store(false, Ordering::SeqCst);
    }

    /// Sets the shutdown flag and wakes every waiter. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        self.cv_push.notify_all();
        self.cv_pop.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }
}

impl<T> Drop for SafeQueue<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_ordering() {
        let q = SafeQueue::new(0);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn shutdown_unblocks_pop() {
        let q: Arc<SafeQueue<i32>> = Arc::new(SafeQueue::new(0));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        q.shutdown();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn bounded_push_blocks_until_room() {
        let q: Arc<SafeQueue<i32>> = Arc::new(SafeQueue::new(1));
        q.push(1);
        let q2 = q.clone();
        let handle = thread::spawn(move || {
            q2.push(2);
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some(1));
        handle.join().unwrap();
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn drain_empties_and_unblocks_pushers() {
        let q: Arc<SafeQueue<i32>> = Arc::new(SafeQueue::new(1));
        q.push(1);
        let q2 = q.clone();
        let handle = thread::spawn(move || {
            q2.push(2);
        });
        thread::sleep(Duration::from_millis(20));
        q.drain();
        handle.join().unwrap();
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn try_pop_does_not_block() {
        let q: SafeQueue<i32> = SafeQueue::new(0);
        assert_eq!(q.try_pop(), None);
        q.push(5);
        assert_eq!(q.try_pop(), Some(5));
    }

    #[test]
    fn pop_front_discard_removes_head_only() {
        let q: SafeQueue<i32> = SafeQueue::new(0);
        q.push(1);
        q.push(2);
        q.pop_front_discard();
        assert_eq!(q.pop(), Some(2));
    }
}
