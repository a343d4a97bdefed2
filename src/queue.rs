//! Unbounded multi-producer, single-consumer lock-free FIFO.
//!
//! A singly-linked chain of heap nodes with a permanent sentinel at the
//! head. Producers swap the tail pointer and then publish the forward
//! link from the old tail; the single consumer advances the head and
//! frees the node it leaves behind.
//!
//! ```text
//!   head (consumer only)                    tail (any producer)
//!     |                                       |
//!  [sentinel] -> [a] -> [b] -> ... -> [z] ----+
//! ```
//!
//! # Single consumer
//!
//! Dequeue reclaims the old head immediately, without hazard pointers or
//! epochs. Two concurrent dequeues would race on freeing the same node,
//! so the API only hands out dequeue through `&mut`: either on an owned
//! [`Queue`], or on the one non-`Clone` [`Consumer`] returned by [`channel`].
//!
//! # Staleness window
//!
//! Between a producer's tail swap and its link store, the consumer sees
//! no successor and reports empty even though an enqueue is in flight.
//! The next dequeue picks it up. Callers retry; nothing blocks.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

struct Node<T> {
    /// `None` only for the current sentinel
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn boxed(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Lock-free MPSC queue.
///
/// `enqueue` takes `&self` and may run on any number of threads.
/// `dequeue` takes `&mut self`; share the queue across threads with
/// [`channel`] instead.
pub struct Queue<T> {
    /// Current sentinel. Only the consumer stores to it, so advancing
    /// needs no compare-and-swap.
    head: AtomicPtr<Node<T>>,
    /// Last node in the chain.
    tail: AtomicPtr<Node<T>>,
}

// Values move between threads by value; shared access never hands out `&T`.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Queue<T> {
    /// Create an empty queue holding only the sentinel.
    pub fn new() -> Self {
        let sentinel = Node::boxed(None);
        Self {
            head: AtomicPtr::new(sentinel),
            tail: AtomicPtr::new(sentinel),
        }
    }

    /// Append an item. Never blocks, never fails.
    #[inline]
    pub fn enqueue(&self, item: T) {
        let node = Node::boxed(Some(item));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        // SAFETY: `prev` was the tail, so the consumer cannot have freed it
        // yet: a node is only freed once its successor link is visible, and
        // this store is what publishes that link.
        unsafe { (*prev).next.store(node, Ordering::Release) };
    }

    /// Pop the oldest item, or `None` if nothing is ready.
    #[inline]
    pub fn dequeue(&mut self) -> Option<T> {
        // SAFETY: `&mut self` guarantees a single consumer.
        unsafe { self.dequeue_single() }
    }

    /// Best-effort emptiness check. May report empty while an enqueue is
    /// halfway through publishing.
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
    }

    /// # Safety
    /// At most one thread may be inside this function at a time.
    unsafe fn dequeue_single(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let next = (*head).next.load(Ordering::Acquire);
        if next.is_null() {
            return None;
        }
        // `next` becomes the new sentinel; its value moves out.
        let value = (*next).value.take();
        self.head.store(next, Ordering::Release);
        drop(Box::from_raw(head));
        debug_assert!(value.is_some(), "non-sentinel node without a value");
        value
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            // SAFETY: `&mut self` means no producer or consumer is active;
            // every node in the chain is still owned by the queue.
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next.load(Ordering::Relaxed);
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}

/// Create a queue split into a cloneable producer side and the one
/// consumer side.
pub fn channel<T>() -> (Producer<T>, Consumer<T>) {
    let queue = Arc::new(Queue::new());
    (
        Producer {
            queue: Arc::clone(&queue),
        },
        Consumer { queue },
    )
}

/// Enqueue handle. Clone it freely across threads.
pub struct Producer<T> {
    queue: Arc<Queue<T>>,
}

impl<T> Producer<T> {
    /// Append an item. Never blocks, never fails.
    #[inline]
    pub fn enqueue(&self, item: T) {
        self.queue.enqueue(item);
    }

    /// Best-effort emptiness check
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

/// The single dequeue handle. Deliberately not `Clone`.
pub struct Consumer<T> {
    queue: Arc<Queue<T>>,
}

impl<T> Consumer<T> {
    /// Pop the oldest item, or `None` if nothing is ready.
    #[inline]
    pub fn dequeue(&mut self) -> Option<T> {
        // SAFETY: `Consumer` is unique per queue and `&mut self` excludes
        // concurrent calls through it.
        unsafe { self.queue.dequeue_single() }
    }

    /// Best-effort emptiness check
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop everything currently reachable, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.dequeue())
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").finish_non_exhaustive()
    }
}
