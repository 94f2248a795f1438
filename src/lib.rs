//! Block-scoped radix sort on an emulated block-parallel device.
//!
//! A launch splits device memory into batches of
//! `block_size * items_per_thread` items. Each batch belongs to one block: a
//! fixed group of cooperating units that sort it together through a shared
//! exchange buffer and a barrier. Blocks are independent of each other, so
//! ordering is only guaranteed inside a batch.
//!
//! ```no_run
//! use blocksort::{sort_keys, Device, SortConfig};
//!
//! let device = Device::new().unwrap();
//! let mut keys: Vec<u32> = vec![5, 3, 5, 1];
//! sort_keys(&device, &SortConfig::new(4, 1), &mut keys).unwrap();
//! assert_eq!(keys, vec![1, 3, 5, 5]);
//! ```

pub mod buffer;
pub mod cached;
pub mod config;
pub mod device;
pub mod error;
pub mod exchange;
pub mod queue;
pub mod radix;
pub mod radix_sort;
pub mod rank;
pub mod reference;
pub mod transform;

pub use buffer::Buffer;
pub use cached::CachedReadIterator;
pub use config::{SortConfig, TransformConfig};
pub use device::{Device, DeviceLimits, LaunchDims, LaunchReport, Tile, UnitContext};
pub use error::{Error, Result};
pub use queue::{Queue, Submission};
pub use radix::{BitWindow, DigitPass, RadixKey, SortOrder};
pub use radix_sort::{sort_keys, sort_pairs, BlockRadixSort, BlockRadixSortStorage};
pub use transform::{transform, ReadSource};
