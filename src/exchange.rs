//! Block-visible staging area used to move items between units.
//!
//! Every slot has exactly one writer per phase: the unit whose item was
//! ranked to that slot. Readers may only look at a slot after the block
//! barrier that follows the scatter. The per-slot locks are never contended
//! when that protocol is followed; they only keep the emulation free of
//! data races.

use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use bytemuck::Pod;

pub struct ExchangeBuffer<T: Pod> {
    slots: Box<[Mutex<T>]>,
}

impl<T: Pod> ExchangeBuffer<T> {
    /// A zeroed buffer with room for `len` items.
    pub fn new(len: usize) -> Self {
        let slots = (0..len).map(|_| Mutex::new(T::zeroed())).collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn scatter(&self, slot: usize, item: T) {
        *self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = item;
    }

    #[inline]
    pub fn gather(&self, slot: usize) -> T {
        *self.slots[slot]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes `items[i]` to `ranks[i]`.
    pub fn scatter_ranked(&self, items: &[T], ranks: &[usize]) {
        debug_assert_eq!(items.len(), ranks.len());
        for (&item, &rank) in items.iter().zip(ranks) {
            self.scatter(rank, item);
        }
    }

    /// Fills `items` from the slots `unit` owns in the blocked arrangement.
    pub fn gather_blocked(&self, unit: usize, items: &mut [T]) {
        let range = Self::blocked_range(unit, items.len());
        for (item, slot) in items.iter_mut().zip(range) {
            *item = self.gather(slot);
        }
    }

    /// Slots owned by `unit` when each unit holds `items_per_thread`
    /// consecutive items.
    pub fn blocked_range(unit: usize, items_per_thread: usize) -> Range<usize> {
        unit * items_per_thread..(unit + 1) * items_per_thread
    }
}
