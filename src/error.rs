//! Errors reported by the host side of a launch.
//!
//! Everything here is detected before any block runs. Once a launch starts it
//! either completes every block or does not return (a unit that hits a
//! violated precondition panics, and the panic is propagated to the caller).

use thiserror::Error;

/// Result alias used by all host entry points.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested block is larger than the device can run cooperatively.
    #[error("block size {requested} exceeds the device maximum of {max}")]
    UnsupportedBlockSize { requested: u32, max: u32 },

    /// Zero block size or zero items per thread.
    #[error("invalid launch dimensions: {0}")]
    InvalidLaunch(String),

    /// The buffer is not a whole number of batches.
    #[error("{len} items is not a whole number of {batch_size}-item batches")]
    BatchLayout { len: usize, batch_size: usize },

    /// Key and value buffers differ in length.
    #[error("value buffer holds {values} items but key buffer holds {keys}")]
    LengthMismatch { keys: usize, values: usize },

    #[error("bit window [{start_bit}, {end_bit}) is invalid for {key_bits}-bit keys")]
    InvalidBitWindow {
        start_bit: u32,
        end_bit: u32,
        key_bits: u32,
    },

    #[error("radix bits must be in 1..=8, got {0}")]
    InvalidRadixBits(u32),

    /// An element count reaches past the end of a buffer.
    #[error("element count {count} exceeds {what} length {len}")]
    OutOfBounds {
        count: usize,
        len: usize,
        what: &'static str,
    },

    /// The same buffer was passed as both source and destination.
    #[error("source and destination refer to the same buffer")]
    AliasedBuffers,

    #[error("failed to build the block scheduler: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to start the queue worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The queue worker is gone; the submission never ran to completion.
    #[error("device queue is closed")]
    QueueClosed,
}
