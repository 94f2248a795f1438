//! Host emulation of a block-parallel compute device.
//!
//! A launch splits device memory into per-block tiles and each block tile
//! into per-unit tiles (blocked arrangement: unit `u` of a block owns items
//! `[u * items_per_thread, (u + 1) * items_per_thread)` of that block).
//!
//! Units of one block are dedicated OS threads that run together, so they
//! can wait on a shared barrier. Blocks never talk to each other and are
//! scheduled on a rayon pool whose width is the number of resident blocks.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error};
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Upper bound on cooperative units per block.
pub const DEFAULT_MAX_BLOCK_SIZE: u32 = 1024;

/// Upper bound on blocks running at the same time.
pub const DEFAULT_RESIDENT_BLOCKS: u32 = 4;

/// Device capabilities, queried at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_block_size: u32,
    pub resident_blocks: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self {
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            resident_blocks: cores.clamp(1, DEFAULT_RESIDENT_BLOCKS),
        }
    }
}

impl DeviceLimits {
    /// Defaults, overridden by `BLOCKSORT_MAX_BLOCK_SIZE` and
    /// `BLOCKSORT_RESIDENT_BLOCKS` when they parse as positive integers.
    pub fn from_env() -> Self {
        let mut limits = Self::default();
        if let Some(n) = env_u32("BLOCKSORT_MAX_BLOCK_SIZE") {
            limits.max_block_size = n;
        }
        if let Some(n) = env_u32("BLOCKSORT_RESIDENT_BLOCKS") {
            limits.resident_blocks = n;
        }
        limits
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
}

/// Shape of one launch. The grid size follows from the data length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchDims {
    pub block_size: u32,
    pub items_per_thread: u32,
}

impl LaunchDims {
    pub fn new(block_size: u32, items_per_thread: u32) -> Self {
        Self {
            block_size,
            items_per_thread,
        }
    }

    /// Items owned by one block.
    pub fn batch_size(&self) -> usize {
        self.block_size as usize * self.items_per_thread as usize
    }

    /// Blocks needed to cover `len` items.
    pub fn grid_for(&self, len: usize) -> usize {
        let batch = self.batch_size();
        (len + batch - 1) / batch
    }
}

/// Identity of a unit inside a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitContext {
    pub block_id: u32,
    pub unit_id: u32,
    pub block_size: u32,
    pub items_per_thread: u32,
    pub grid_blocks: u32,
    /// Index of this unit's first item in the launch's data.
    pub global_offset: usize,
}

impl UnitContext {
    pub fn unit(&self) -> usize {
        self.unit_id as usize
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchReport {
    pub blocks: u32,
    pub block_size: u32,
    pub items_per_thread: u32,
    pub elapsed: Duration,
}

/// Device memory that can be handed out to blocks and units.
///
/// Splitting a tile gives each part exclusive access to its items, which is
/// how a unit comes to own its registers' worth of data.
pub trait Tile: Send + Sized {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn split_at(self, mid: usize) -> (Self, Self);
}

impl<'a, T: Send> Tile for &'a mut [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        self.split_at_mut(mid)
    }
}

/// Keys and values moved together; the first tile decides the length.
impl<A: Tile, B: Tile> Tile for (A, B) {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let (a0, a1) = self.0.split_at(mid);
        let (b0, b1) = self.1.split_at(mid);
        ((a0, b0), (a1, b1))
    }
}

/// Cuts `tile` into consecutive pieces of `chunk` items; the last may be
/// shorter, and exactly `count` pieces are produced (trailing ones empty).
fn split_tiles<T: Tile>(mut tile: T, chunk: usize, count: usize) -> Vec<T> {
    let mut parts = Vec::with_capacity(count);
    for _ in 1..count {
        let mid = chunk.min(tile.len());
        let (head, rest) = tile.split_at(mid);
        parts.push(head);
        tile = rest;
    }
    if count > 0 {
        parts.push(tile);
    }
    parts
}

/// The emulated device. Cheap to clone.
#[derive(Clone)]
pub struct Device {
    limits: DeviceLimits,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("limits", &self.limits).finish()
    }
}

impl Device {
    /// A device with limits from the environment.
    pub fn new() -> Result<Self> {
        Self::with_limits(DeviceLimits::from_env())
    }

    pub fn with_limits(limits: DeviceLimits) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limits.resident_blocks.max(1) as usize)
            .thread_name(|i| format!("blocksort-sm-{}", i))
            .build()?;
        debug!("created device with {:?}", limits);
        Ok(Self {
            limits,
            pool: Arc::new(pool),
        })
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn max_block_size(&self) -> u32 {
        self.limits.max_block_size
    }

    pub fn supports_block_size(&self, block_size: u32) -> bool {
        block_size > 0 && block_size <= self.limits.max_block_size
    }

    /// Checks launch dimensions against the device.
    pub fn check_dims(&self, dims: LaunchDims) -> Result<()> {
        if dims.block_size == 0 || dims.items_per_thread == 0 {
            return Err(Error::InvalidLaunch(format!(
                "block_size = {}, items_per_thread = {}",
                dims.block_size, dims.items_per_thread
            )));
        }
        if dims.block_size > self.limits.max_block_size {
            error!(
                "rejected launch: block size {} exceeds device maximum {}",
                dims.block_size, self.limits.max_block_size
            );
            return Err(Error::UnsupportedBlockSize {
                requested: dims.block_size,
                max: self.limits.max_block_size,
            });
        }
        Ok(())
    }

    /// Runs `kernel` once per unit over `tiles`.
    ///
    /// Each block gets a fresh `make_shared(block_id)` that all of its units
    /// borrow. The grid is `ceil(len / batch_size)` blocks; the last block's
    /// tail units receive short or empty tiles when `len` is ragged.
    pub fn launch<T, S, M, F>(
        &self,
        dims: LaunchDims,
        tiles: T,
        make_shared: M,
        kernel: F,
    ) -> Result<LaunchReport>
    where
        T: Tile,
        S: Sync,
        M: Fn(u32) -> S + Sync,
        F: Fn(&UnitContext, T, &S) + Sync,
    {
        self.check_dims(dims)?;

        let started = Instant::now();
        let batch = dims.batch_size();
        let grid = dims.grid_for(tiles.len());
        debug!(
            "launch: {} blocks x {} units x {} items",
            grid, dims.block_size, dims.items_per_thread
        );

        let blocks = split_tiles(tiles, batch, grid);
        let run = |(block_id, block_tile): (usize, T)| {
            let shared = make_shared(block_id as u32);
            let units = split_tiles(
                block_tile,
                dims.items_per_thread as usize,
                dims.block_size as usize,
            );
            let shared = &shared;
            let kernel = &kernel;
            thread::scope(|s| {
                for (unit_id, unit_tile) in units.into_iter().enumerate() {
                    let ctx = UnitContext {
                        block_id: block_id as u32,
                        unit_id: unit_id as u32,
                        block_size: dims.block_size,
                        items_per_thread: dims.items_per_thread,
                        grid_blocks: grid as u32,
                        global_offset: block_id * batch
                            + unit_id * dims.items_per_thread as usize,
                    };
                    s.spawn(move || kernel(&ctx, unit_tile, shared));
                }
            });
        };
        self.pool
            .install(|| blocks.into_par_iter().enumerate().for_each(run));

        let report = LaunchReport {
            blocks: grid as u32,
            block_size: dims.block_size,
            items_per_thread: dims.items_per_thread,
            elapsed: started.elapsed(),
        };
        debug!("launch finished in {:?}", report.elapsed);
        Ok(report)
    }
}
