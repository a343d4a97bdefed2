//! Object Pool - fixed-capacity slot allocator safe under concurrent callers.
//!
//! All slots are created up front, so taking one on the hot path never
//! touches the global allocator. Liveness lives in a bitmap of atomic
//! words (bit set = free). Allocation scans round-robin from an atomic
//! cursor and claims a slot with a single `fetch_and`; release is a
//! `fetch_or` on the slot's own bit.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const WORD_BITS: usize = 64;

/// One storage cell, padded to a cache line so neighbouring slots handed
/// to different threads do not share a line.
#[repr(C)]
#[repr(align(64))]
struct Slot<T> {
    value: UnsafeCell<T>,
}

/// Pre-allocated pool of `T` values.
pub struct ObjectPool<T> {
    /// Contiguous backing storage
    slots: Box<[Slot<T>]>,
    /// One bit per slot; set = free
    free: Box<[AtomicU64]>,
    /// Where the next scan starts
    cursor: AtomicUsize,
    capacity: usize,
}

// A claimed slot is reachable only through its `Pooled` guard, so shared
// access to the pool never aliases a `T`.
unsafe impl<T: Send> Sync for ObjectPool<T> {}

impl<T: Default> ObjectPool<T> {
    /// Create a pool with `capacity` default-initialised slots.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be non-zero");

        let slots = (0..capacity)
            .map(|_| Slot {
                value: UnsafeCell::new(T::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        // Mark every real slot free; bits past `capacity` stay clear so
        // they can never be claimed.
        let words = capacity.div_ceil(WORD_BITS);
        let free = (0..words)
            .map(|w| {
                let remaining = capacity - w * WORD_BITS;
                let bits = if remaining >= WORD_BITS {
                    u64::MAX
                } else {
                    (1u64 << remaining) - 1
                };
                AtomicU64::new(bits)
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            free,
            cursor: AtomicUsize::new(0),
            capacity,
        }
    }
}

impl<T> ObjectPool<T> {
    /// Claim a free slot, or `None` once all `capacity` slots have been
    /// examined without finding one.
    ///
    /// The slot keeps whatever value its previous holder left in it.
    pub fn allocate(&self) -> Option<Pooled<'_, T>> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % self.capacity;

        for step in 0..self.capacity {
            let index = (start + step) % self.capacity;
            let (word, mask) = Self::locate(index);

            // Cheap read first; only contend on words that look free.
            if self.free[word].load(Ordering::Relaxed) & mask == 0 {
                continue;
            }
            if self.free[word].fetch_and(!mask, Ordering::Acquire) & mask != 0 {
                return Some(Pooled {
                    pool: self,
                    index,
                    _marker: PhantomData,
                });
            }
        }

        None
    }

    /// Claim a slot and overwrite its contents with `value`.
    ///
    /// Returns the value back if the pool is exhausted, so the caller can
    /// pick another allocation path.
    pub fn allocate_with(&self, value: T) -> Result<Pooled<'_, T>, T> {
        match self.allocate() {
            Some(mut slot) => {
                *slot = value;
                Ok(slot)
            }
            None => Err(value),
        }
    }

    /// Return a slot to the pool.
    ///
    /// # Panics
    /// Panics if the slot's address lies outside this pool's storage,
    /// i.e. it was handed out by a different pool.
    pub fn deallocate(&self, slot: Pooled<'_, T>) {
        let range = self.slots.as_ptr_range();
        let addr = slot.slot_ptr();
        assert!(
            range.contains(&addr),
            "slot {:p} does not belong to this pool",
            addr
        );
        // Dropping the guard flips the free bit.
        drop(slot);
    }

    /// Total number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently free. A snapshot under concurrency.
    pub fn available(&self) -> usize {
        self.free
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Number of slots currently claimed. A snapshot under concurrency.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    #[inline]
    fn locate(index: usize) -> (usize, u64) {
        (index / WORD_BITS, 1u64 << (index % WORD_BITS))
    }

    fn release(&self, index: usize) {
        let (word, mask) = Self::locate(index);
        let prev = self.free[word].fetch_or(mask, Ordering::Release);
        debug_assert!(prev & mask == 0, "double free of slot {index}");
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive handle to a claimed slot. Frees the slot when dropped.
pub struct Pooled<'a, T> {
    pool: &'a ObjectPool<T>,
    index: usize,
    /// Behaves like `&mut T` for auto traits
    _marker: PhantomData<&'a mut T>,
}

impl<T> Pooled<'_, T> {
    /// Index of the slot within its pool
    #[inline]
    pub fn slot_index(&self) -> usize {
        self.index
    }

    fn slot_ptr(&self) -> *const Slot<T> {
        &self.pool.slots[self.index] as *const Slot<T>
    }
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the free bit for `index` is clear while this guard lives,
        // so no other guard for the same slot exists.
        unsafe { &*self.pool.slots[self.index].value.get() }
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`, and `&mut self` makes the borrow unique.
        unsafe { &mut *self.pool.slots[self.index].value.get() }
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(self.index);
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("index", &self.index)
            .field("value", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Order, OrderType, Side};
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_slot_alignment() {
        assert_eq!(std::mem::align_of::<Slot<u8>>(), 64);
        assert_eq!(std::mem::size_of::<Slot<u8>>(), 64);
    }

    #[test]
    fn test_pool_creation() {
        let pool: ObjectPool<u64> = ObjectPool::new(100);
        assert_eq!(pool.capacity(), 100);
        assert_eq!(pool.available(), 100);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_capacity_panics() {
        let _pool: ObjectPool<u64> = ObjectPool::new(0);
    }

    #[test]
    fn test_pool_alloc_free() {
        let pool: ObjectPool<u64> = ObjectPool::new(3);

        let a = pool.allocate().expect("Should allocate");
        let b = pool.allocate().expect("Should allocate");
        let c = pool.allocate().expect("Should allocate");

        assert_eq!(pool.in_use(), 3);
        assert!(pool.allocate().is_none(), "Should be exhausted");

        let freed = b.slot_index();
        pool.deallocate(b);
        assert_eq!(pool.available(), 1);

        // Only one slot is free, so it must be the one we just released
        let d = pool.allocate().expect("Should allocate");
        assert_eq!(d.slot_index(), freed);

        pool.deallocate(a);
        pool.deallocate(c);
        pool.deallocate(d);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_drop_releases_slot() {
        let pool: ObjectPool<u64> = ObjectPool::new(1);
        {
            let _slot = pool.allocate().expect("Should allocate");
            assert!(pool.allocate().is_none());
        }
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn test_partial_word_capacity() {
        // 70 slots span two bitmap words; bits 70..128 must never be claimed
        let pool: ObjectPool<u8> = ObjectPool::new(70);
        let slots: Vec<_> = (0..70).map(|_| pool.allocate().unwrap()).collect();
        assert!(pool.allocate().is_none());

        let unique: HashSet<_> = slots.iter().map(|s| s.slot_index()).collect();
        assert_eq!(unique.len(), 70);
        assert!(unique.iter().all(|&i| i < 70));
    }

    #[test]
    fn test_allocate_with_value() {
        let pool: ObjectPool<Order> = ObjectPool::new(2);
        let order = Order::new("MSFT", 101.0, 5, Side::Sell, OrderType::Limit);

        let slot = pool.allocate_with(order).expect("Should allocate");
        assert_eq!(slot.symbol.as_str(), "MSFT");
        assert_eq!(slot.qty, 5);

        let _other = pool.allocate().unwrap();
        let rejected = pool.allocate_with(order);
        assert!(rejected.is_err(), "Exhausted pool hands the value back");
    }

    #[test]
    #[should_panic(expected = "does not belong")]
    fn test_foreign_slot_rejected() {
        let a: ObjectPool<u32> = ObjectPool::new(4);
        let b: ObjectPool<u32> = ObjectPool::new(4);
        let slot = a.allocate().unwrap();
        b.deallocate(slot);
    }

    #[test]
    fn test_concurrent_allocation_is_exclusive() {
        let pool: ObjectPool<u64> = ObjectPool::new(256);

        thread::scope(|s| {
            let handles: Vec<_> = (0..4u64)
                .map(|t| {
                    let pool = &pool;
                    s.spawn(move || {
                        let mut mine = Vec::new();
                        while mine.len() < 64 {
                            match pool.allocate() {
                                Some(mut slot) => {
                                    *slot = t;
                                    mine.push(slot);
                                }
                                None => break,
                            }
                        }
                        // Each slot still holds the value this thread wrote
                        assert!(mine.iter().all(|slot| **slot == t));
                        mine
                    })
                })
                .collect();

            // Every guard is still alive here, so indices must be distinct
            let held: Vec<_> = handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect();
            let unique: HashSet<_> = held.iter().map(|slot| slot.slot_index()).collect();
            assert_eq!(unique.len(), held.len(), "No slot handed out twice");
            assert_eq!(pool.in_use(), held.len());
        });

        assert_eq!(pool.available(), 256);
    }
}
