//! Block radix sort.
//!
//! Every unit of a block holds `items_per_thread` keys (and optionally as
//! many values) in its own storage. One pass per digit of the bit window:
//!
//! 1. **Extract**: each unit computes the digit of each of its keys,
//! 2. **Rank**: a block-wide histogram and prefix sum give every item its
//!    destination (`BlockRank`),
//! 3. **Exchange**: items are scattered to their rank in shared memory,
//!    the block waits on its barrier, and each unit gathers the items of the
//!    positions it owns next.
//!
//! Each pass is stable, so the passes compose into a stable sort of the
//! whole window. Descending order is the same algorithm on complemented
//! digits. Values never take part in ranking; they follow their key's rank.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;

use bytemuck::Pod;
use log::{debug, error, trace};

use crate::config::SortConfig;
use crate::device::{Device, LaunchReport, UnitContext};
use crate::error::{Error, Result};
use crate::exchange::ExchangeBuffer;
use crate::radix::{BitWindow, RadixKey, SortOrder, MAX_RADIX_BITS};
use crate::rank::BlockRank;

/// Shared memory of one block running a radix sort.
pub struct BlockRadixSortStorage<K: RadixKey, V: Pod = ()> {
    keys: ExchangeBuffer<K>,
    values: Option<ExchangeBuffer<V>>,
    rank: BlockRank,
    barrier: Barrier,
    /// Set by any unit whose call breaks a precondition.
    violated: AtomicBool,
    block_size: usize,
    items_per_thread: usize,
    radix_bits: u32,
}

impl<K: RadixKey, V: Pod> BlockRadixSortStorage<K, V> {
    fn new(block_size: u32, items_per_thread: u32, radix_bits: u32, with_values: bool) -> Self {
        assert!(block_size > 0 && items_per_thread > 0);
        assert!(
            (1..=MAX_RADIX_BITS).contains(&radix_bits),
            "radix bits {} out of range",
            radix_bits
        );
        let block_size = block_size as usize;
        let items_per_thread = items_per_thread as usize;
        let batch = block_size * items_per_thread;
        Self {
            keys: ExchangeBuffer::new(batch),
            values: if with_values {
                Some(ExchangeBuffer::new(batch))
            } else {
                None
            },
            rank: BlockRank::new(block_size, radix_bits),
            barrier: Barrier::new(block_size),
            violated: AtomicBool::new(false),
            block_size,
            items_per_thread,
            radix_bits,
        }
    }

    /// Storage for sorting keys with values.
    pub fn with_values(block_size: u32, items_per_thread: u32, radix_bits: u32) -> Self {
        Self::new(block_size, items_per_thread, radix_bits, true)
    }

    pub fn batch_size(&self) -> usize {
        self.block_size * self.items_per_thread
    }
}

impl<K: RadixKey> BlockRadixSortStorage<K> {
    /// Storage for sorting keys alone.
    pub fn keys_only(block_size: u32, items_per_thread: u32, radix_bits: u32) -> Self {
        Self::new(block_size, items_per_thread, radix_bits, false)
    }
}

/// A unit's view of a block radix sort.
///
/// Every unit of the block must make the same call with the same window and
/// order; the sort waits on the block barrier several times per pass.
pub struct BlockRadixSort<'s, K: RadixKey, V: Pod = ()> {
    storage: &'s BlockRadixSortStorage<K, V>,
}

impl<'s, K: RadixKey, V: Pod> BlockRadixSort<'s, K, V> {
    pub fn new(storage: &'s BlockRadixSortStorage<K, V>) -> Self {
        Self { storage }
    }

    /// Ascending over the full key width.
    pub fn sort(&self, unit: &UnitContext, keys: &mut [K]) {
        self.sort_with(unit, keys, None, BitWindow::full::<K>(), SortOrder::Ascending);
    }

    /// Descending over the full key width.
    pub fn sort_desc(&self, unit: &UnitContext, keys: &mut [K]) {
        self.sort_with(unit, keys, None, BitWindow::full::<K>(), SortOrder::Descending);
    }

    pub fn sort_bits(&self, unit: &UnitContext, keys: &mut [K], start_bit: u32, end_bit: u32) {
        let window = BitWindow::new(start_bit, end_bit);
        self.sort_with(unit, keys, None, window, SortOrder::Ascending);
    }

    pub fn sort_desc_bits(&self, unit: &UnitContext, keys: &mut [K], start_bit: u32, end_bit: u32) {
        let window = BitWindow::new(start_bit, end_bit);
        self.sort_with(unit, keys, None, window, SortOrder::Descending);
    }

    pub fn sort_pairs(&self, unit: &UnitContext, keys: &mut [K], values: &mut [V]) {
        let window = BitWindow::full::<K>();
        self.sort_with(unit, keys, Some(values), window, SortOrder::Ascending);
    }

    pub fn sort_pairs_desc(&self, unit: &UnitContext, keys: &mut [K], values: &mut [V]) {
        let window = BitWindow::full::<K>();
        self.sort_with(unit, keys, Some(values), window, SortOrder::Descending);
    }

    pub fn sort_pairs_bits(
        &self,
        unit: &UnitContext,
        keys: &mut [K],
        values: &mut [V],
        start_bit: u32,
        end_bit: u32,
    ) {
        let window = BitWindow::new(start_bit, end_bit);
        self.sort_with(unit, keys, Some(values), window, SortOrder::Ascending);
    }

    pub fn sort_pairs_desc_bits(
        &self,
        unit: &UnitContext,
        keys: &mut [K],
        values: &mut [V],
        start_bit: u32,
        end_bit: u32,
    ) {
        let window = BitWindow::new(start_bit, end_bit);
        self.sort_with(unit, keys, Some(values), window, SortOrder::Descending);
    }

    /// The one sort all entry points share.
    ///
    /// Panics in every unit of the block if any unit's call is malformed:
    /// the window does not fit `K`, the unit does not hold exactly
    /// `items_per_thread` items, or values do not match the keys. Units agree
    /// on the outcome at a barrier before any panics.
    pub fn sort_with(
        &self,
        unit: &UnitContext,
        keys: &mut [K],
        mut values: Option<&mut [V]>,
        window: BitWindow,
        order: SortOrder,
    ) {
        let storage = self.storage;
        let unit_id = unit.unit();
        assert!(unit_id < storage.block_size);

        let malformed = if !window.fits(K::BITS) {
            Some(format!(
                "bit window [{}, {}) exceeds {}-bit key",
                window.start_bit(),
                window.end_bit(),
                K::BITS
            ))
        } else if keys.len() != storage.items_per_thread {
            Some(format!(
                "unit {} holds {} keys, expected {}",
                unit_id,
                keys.len(),
                storage.items_per_thread
            ))
        } else {
            match values.as_deref() {
                Some(_) if storage.values.is_none() => {
                    Some("storage was created without a value exchange".to_string())
                }
                Some(values) if values.len() != keys.len() => Some(format!(
                    "unit {} holds {} values for {} keys",
                    unit_id,
                    values.len(),
                    keys.len()
                )),
                _ => None,
            }
        };
        if let Some(reason) = &malformed {
            error!("block {}: {}", unit.block_id, reason);
            storage.violated.store(true, Ordering::Relaxed);
        }
        storage.barrier.wait();
        if storage.violated.load(Ordering::Relaxed) {
            panic!(
                "block radix sort aborted: {}",
                malformed.as_deref().unwrap_or("another unit broke a precondition")
            );
        }

        let mut digits = vec![0u32; keys.len()];
        let mut ranks = vec![0usize; keys.len()];

        for (pass_index, pass) in window.passes(storage.radix_bits).enumerate() {
            if unit_id == 0 && unit.block_id == 0 {
                trace!(
                    "pass {}: bits [{}, {})",
                    pass_index,
                    pass.shift,
                    pass.shift + pass.width
                );
            }

            for (digit, key) in digits.iter_mut().zip(keys.iter()) {
                *digit = pass.extract(key.to_radix_bits(), order);
            }

            storage.rank.rank(unit_id, &digits, &mut ranks, &storage.barrier);

            storage.keys.scatter_ranked(keys, &ranks);
            if let (Some(values), Some(exchange)) = (values.as_deref(), &storage.values) {
                exchange.scatter_ranked(values, &ranks);
            }
            // Scatter must be complete block-wide before anyone gathers.
            storage.barrier.wait();

            storage.keys.gather_blocked(unit_id, keys);
            if let (Some(values), Some(exchange)) = (values.as_deref_mut(), &storage.values) {
                exchange.gather_blocked(unit_id, values);
            }
            // The first barrier of the next pass fences these gathers
            // against the next scatter.
        }
    }
}

/// Sorts every `batch_size` slice of `keys` independently.
///
/// `keys.len()` must be a whole number of batches.
pub fn sort_keys<K: RadixKey>(
    device: &Device,
    config: &SortConfig,
    keys: &mut [K],
) -> Result<LaunchReport> {
    let window = config.validate::<K>()?;
    check_layout(config, keys.len())?;
    debug!(
        "sort_keys: {} keys, window [{}, {}), {:?}",
        keys.len(),
        window.start_bit(),
        window.end_bit(),
        config.order
    );

    let order = config.order;
    device.launch(
        config.dims(),
        keys,
        |_| {
            BlockRadixSortStorage::<K>::keys_only(
                config.block_size,
                config.items_per_thread,
                config.radix_bits,
            )
        },
        |unit, keys: &mut [K], storage| {
            BlockRadixSort::new(storage).sort_with(unit, keys, None, window, order);
        },
    )
}

/// Sorts every `batch_size` slice of `keys`, applying the same permutation
/// to the matching slice of `values`.
pub fn sort_pairs<K: RadixKey, V: Pod + Send + Sync>(
    device: &Device,
    config: &SortConfig,
    keys: &mut [K],
    values: &mut [V],
) -> Result<LaunchReport> {
    let window = config.validate::<K>()?;
    if keys.len() != values.len() {
        return Err(Error::LengthMismatch {
            keys: keys.len(),
            values: values.len(),
        });
    }
    check_layout(config, keys.len())?;
    debug!(
        "sort_pairs: {} pairs, window [{}, {}), {:?}",
        keys.len(),
        window.start_bit(),
        window.end_bit(),
        config.order
    );

    let order = config.order;
    device.launch(
        config.dims(),
        (keys, values),
        |_| {
            BlockRadixSortStorage::<K, V>::with_values(
                config.block_size,
                config.items_per_thread,
                config.radix_bits,
            )
        },
        |unit, (keys, values): (&mut [K], &mut [V]), storage| {
            BlockRadixSort::new(storage).sort_with(unit, keys, Some(values), window, order);
        },
    )
}

fn check_layout(config: &SortConfig, len: usize) -> Result<()> {
    let batch_size = config.batch_size();
    if batch_size == 0 || len % batch_size != 0 {
        return Err(Error::BatchLayout { len, batch_size });
    }
    Ok(())
}
