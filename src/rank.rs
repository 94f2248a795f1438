//! Per-pass digit histogram and stable rank computation.
//!
//! The block shares a `radix × block_size` table of digit counts stored
//! digit-major: entry `digit * block_size + unit` is the number of items of
//! `unit` whose digit is `digit`. An exclusive prefix sum over the flattened
//! table turns every entry into the first rank of that unit's items with that
//! digit. Because units own consecutive items, digit-major then unit order is
//! exactly "by digit, then by arrival", which keeps each pass stable.
//!
//! The prefix sum is cooperative. With `radix` entries per unit the table
//! splits evenly, so:
//!
//! 1. every unit reduces its own segment into `partials[unit]`,
//! 2. unit 0 scans `partials`,
//! 3. every unit rescans its segment seeded with its partial.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Barrier;

/// Shared histogram storage for one block.
pub struct BlockRank {
    counts: Box<[AtomicU32]>,
    partials: Box<[AtomicU32]>,
    block_size: usize,
    radix: usize,
}

impl BlockRank {
    pub fn new(block_size: usize, radix_bits: u32) -> Self {
        let radix = 1usize << radix_bits;
        Self {
            counts: zeroed_counters(radix * block_size),
            partials: zeroed_counters(block_size),
            block_size,
            radix,
        }
    }

    pub fn radix(&self) -> usize {
        self.radix
    }

    /// Computes the destination rank of each of `unit`'s items.
    ///
    /// Must be called by every unit of the block with its digits in arrival
    /// order; it waits on `barrier` four times. Digits must be below
    /// `radix()`.
    pub fn rank(&self, unit: usize, digits: &[u32], ranks: &mut [usize], barrier: &Barrier) {
        debug_assert_eq!(digits.len(), ranks.len());

        // Local tally, published as this unit's column.
        let mut local = vec![0u32; self.radix];
        for &digit in digits {
            local[digit as usize] += 1;
        }
        for (digit, &count) in local.iter().enumerate() {
            self.counts[digit * self.block_size + unit].store(count, Ordering::Relaxed);
        }
        barrier.wait();

        let segment = &self.counts[unit * self.radix..(unit + 1) * self.radix];
        let reduced = segment
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum::<u32>();
        self.partials[unit].store(reduced, Ordering::Relaxed);
        barrier.wait();

        if unit == 0 {
            let mut sums: Vec<u32> = self
                .partials
                .iter()
                .map(|p| p.load(Ordering::Relaxed))
                .collect();
            exclusive_scan_in_place(&mut sums);
            for (partial, sum) in self.partials.iter().zip(sums) {
                partial.store(sum, Ordering::Relaxed);
            }
        }
        barrier.wait();

        let mut running = self.partials[unit].load(Ordering::Relaxed);
        for count in segment {
            let c = count.load(Ordering::Relaxed);
            count.store(running, Ordering::Relaxed);
            running += c;
        }
        barrier.wait();

        // Base offsets for this unit, bumped as its items are placed.
        for (digit, offset) in local.iter_mut().enumerate() {
            *offset = self.counts[digit * self.block_size + unit].load(Ordering::Relaxed);
        }
        for (&digit, rank) in digits.iter().zip(ranks.iter_mut()) {
            let offset = &mut local[digit as usize];
            *rank = *offset as usize;
            *offset += 1;
        }
    }
}

fn zeroed_counters(len: usize) -> Box<[AtomicU32]> {
    (0..len).map(|_| AtomicU32::new(0)).collect()
}

/// Exclusive prefix sum in place; returns the total.
///
/// `[1, 2, 3, 4]` becomes `[0, 1, 3, 6]` and `10` is returned.
pub fn exclusive_scan_in_place(values: &mut [u32]) -> u32 {
    let mut sum = 0u32;
    for value in values.iter_mut() {
        let v = *value;
        *value = sum;
        sum += v;
    }
    sum
}

/// Exclusive prefix sum into a new vector.
pub fn exclusive_scan(input: &[u32]) -> Vec<u32> {
    let mut output = input.to_vec();
    exclusive_scan_in_place(&mut output);
    output
}

/// True if `ranks` is a bijection onto `[0, ranks.len())`.
pub fn is_permutation(ranks: &[usize]) -> bool {
    let mut seen = vec![false; ranks.len()];
    for &rank in ranks {
        match seen.get_mut(rank) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
