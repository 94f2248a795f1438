//! Launch configuration for sorts and transforms.

use crate::device::LaunchDims;
use crate::error::{Error, Result};
use crate::radix::{BitWindow, RadixKey, SortOrder, MAX_RADIX_BITS, RADIX_BITS};

pub const DEFAULT_BLOCK_SIZE: u32 = 256;
pub const DEFAULT_ITEMS_PER_THREAD: u32 = 4;

/// How a block radix sort is launched.
///
/// `batch_size = block_size * items_per_thread` items are sorted per block.
/// Without a bit window the full key width is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortConfig {
    pub block_size: u32,
    pub items_per_thread: u32,
    pub radix_bits: u32,
    pub order: SortOrder,
    pub bit_window: Option<BitWindow>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            items_per_thread: DEFAULT_ITEMS_PER_THREAD,
            radix_bits: RADIX_BITS,
            order: SortOrder::Ascending,
            bit_window: None,
        }
    }
}

impl SortConfig {
    pub fn new(block_size: u32, items_per_thread: u32) -> Self {
        Self {
            block_size,
            items_per_thread,
            ..Self::default()
        }
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Orders by bits `[start_bit, end_bit)` only. Checked against the key
    /// type in `validate`.
    pub fn with_bit_window(mut self, start_bit: u32, end_bit: u32) -> Self {
        self.bit_window = Some(BitWindow::unchecked(start_bit, end_bit));
        self
    }

    pub fn with_radix_bits(mut self, radix_bits: u32) -> Self {
        self.radix_bits = radix_bits;
        self
    }

    pub fn dims(&self) -> LaunchDims {
        LaunchDims::new(self.block_size, self.items_per_thread)
    }

    pub fn batch_size(&self) -> usize {
        self.dims().batch_size()
    }

    /// Resolves the bit window for `K`, rejecting anything the device side
    /// would treat as a broken precondition.
    pub fn validate<K: RadixKey>(&self) -> Result<BitWindow> {
        if !(1..=MAX_RADIX_BITS).contains(&self.radix_bits) {
            return Err(Error::InvalidRadixBits(self.radix_bits));
        }
        match self.bit_window {
            Some(window) => BitWindow::try_new(window.start_bit(), window.end_bit(), K::BITS),
            None => Ok(BitWindow::full::<K>()),
        }
    }
}

/// How an elementwise transform is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformConfig {
    pub block_size: u32,
    pub items_per_thread: u32,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            items_per_thread: DEFAULT_ITEMS_PER_THREAD,
        }
    }
}

impl TransformConfig {
    pub fn dims(&self) -> LaunchDims {
        LaunchDims::new(self.block_size, self.items_per_thread)
    }
}
