//! Elastic object pool for decoded messages.
//!
//! Decoding into a recycled [`Request`](crate::message::Request) keeps the
//! hot path free of per-push allocations once string buffers have grown to
//! their working size.
//!
//! The pool never blocks and never refuses: `acquire` pops an idle object
//! or creates a new one. Objects go back on guard drop, so release happens
//! on every exit path (early return, unwinding panic, cancelled future).
//! At most `capacity` idle objects are retained; surplus ones are freed.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A value that can be cleared in place and reused.
pub trait Reusable: Default {
    /// Restore the zero state without giving up allocated buffers.
    fn reset(&mut self);
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects sitting in the free list
    pub idle: usize,
    /// Objects currently held by guards
    pub in_use: usize,
    /// Objects allocated over the pool's lifetime
    pub created: usize,
}

/// Concurrent free-list of boxed, reusable objects.
pub struct Pool<T: Reusable> {
    idle: Mutex<Vec<Box<T>>>,
    capacity: usize,
    in_use: AtomicUsize,
    created: AtomicUsize,
}

impl<T: Reusable> Pool<T> {
    /// Create a pool retaining up to `capacity` idle objects, all
    /// allocated up front.
    pub fn new(capacity: usize) -> Self {
        let idle: Vec<Box<T>> = (0..capacity).map(|_| Box::default()).collect();
        Self {
            idle: Mutex::new(idle),
            capacity,
            in_use: AtomicUsize::new(0),
            created: AtomicUsize::new(capacity),
        }
    }

    /// Take an object out of the pool, allocating one if none is idle.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let slot = self.idle.lock().pop();
        let slot = match slot {
            Some(slot) => slot,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Box::default()
            }
        };
        self.in_use.fetch_add(1, Ordering::AcqRel);

        Pooled {
            pool: self,
            slot: Some(slot),
        }
    }

    fn release(&self, mut slot: Box<T>) {
        slot.reset();
        {
            let mut idle = self.idle.lock();
            if idle.len() < self.capacity {
                idle.push(slot);
            }
        }
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }

    /// Maximum number of idle objects retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.lock().len(),
            in_use: self.in_use.load(Ordering::Acquire),
            created: self.created.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive handle on a pooled object. Returns it to the pool on drop.
pub struct Pooled<'a, T: Reusable> {
    pool: &'a Pool<T>,
    // Only `None` while dropping.
    slot: Option<Box<T>>,
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.slot.as_deref().expect("pooled object already released")
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.slot
            .as_deref_mut()
            .expect("pooled object already released")
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.release(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{decode_into, Request};

    #[derive(Debug, Default)]
    struct Buffer {
        data: String,
    }

    impl Reusable for Buffer {
        fn reset(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn test_new_preallocates() {
        let pool: Pool<Buffer> = Pool::new(4);
        assert_eq!(
            pool.stats(),
            PoolStats {
                idle: 4,
                in_use: 0,
                created: 4
            }
        );
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_acquire_from_empty_pool_creates() {
        let pool: Pool<Buffer> = Pool::new(0);
        let first = pool.acquire();
        let second = pool.acquire();

        let stats = pool.stats();
        assert_eq!(stats.in_use, 2);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.idle, 0);

        drop(first);
        drop(second);
        // Nothing retained with zero capacity
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    fn test_release_resets_object() {
        let pool: Pool<Buffer> = Pool::new(1);
        {
            let mut buffer = pool.acquire();
            buffer.data.push_str("secret");
        }
        let buffer = pool.acquire();
        assert!(buffer.data.is_empty());
        assert!(buffer.data.capacity() >= "secret".len());
    }

    #[test]
    fn test_surplus_objects_are_freed() {
        let pool: Pool<Buffer> = Pool::new(2);
        let guards: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        assert_eq!(pool.stats().created, 5);
        assert_eq!(pool.stats().in_use, 5);

        drop(guards);
        assert_eq!(pool.stats().idle, 2);
        assert_eq!(pool.stats().in_use, 0);
    }

    #[test]
    fn test_release_on_panic() {
        let pool: Pool<Buffer> = Pool::new(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = pool.acquire();
            panic!("handler failed");
        }));

        assert!(result.is_err());
        assert_eq!(pool.stats().in_use, 0);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_concurrent_acquire_release_returns_to_baseline() {
        let pool: Pool<Buffer> = Pool::new(8);
        let baseline = pool.stats();

        std::thread::scope(|scope| {
            for worker in 0..16 {
                let pool = &pool;
                scope.spawn(move || {
                    for i in 0..200 {
                        let mut buffer = pool.acquire();
                        assert!(buffer.data.is_empty());
                        buffer.data.push_str(&format!("{}-{}", worker, i));
                    }
                });
            }
        });

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.idle, baseline.idle);
        assert!(stats.created >= baseline.created);
    }

    #[test]
    fn test_reused_slot_has_no_residue() {
        let pool: Pool<Request> = Pool::new(1);

        let first_addr = {
            let mut request = pool.acquire();
            decode_into(
                b"<xml><MsgType>voice</MsgType><MediaId>m1</MediaId><Format>amr</Format>\
                  <Recognition>hello</Recognition><MsgId>77</MsgId></xml>",
                &mut request,
            )
            .unwrap();
            assert_eq!(request.recognition, "hello");
            &*request as *const Request as usize
        };

        let mut request = pool.acquire();
        let second_addr = &*request as *const Request as usize;
        assert_eq!(first_addr, second_addr, "same slot should be reused");

        decode_into(
            b"<xml><MsgType>text</MsgType><Content>plain</Content></xml>",
            &mut request,
        )
        .unwrap();

        assert_eq!(request.msg_type, "text");
        assert_eq!(request.content, "plain");
        assert!(request.recognition.is_empty());
        assert!(request.media_id.is_empty());
        assert!(request.format.is_empty());
        assert_eq!(request.msg_id, 0);
    }
}
