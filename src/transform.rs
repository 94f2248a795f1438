//! Elementwise transform dispatcher.
//!
//! Reads `size` elements from a `ReadSource`, applies a function to each and
//! writes the results. The launch covers the input with as many blocks as
//! needed; the last block may be partly empty. Nothing here touches sort
//! state.

use bytemuck::Pod;
use log::debug;

use crate::cached::CachedReadIterator;
use crate::config::TransformConfig;
use crate::device::{Device, LaunchReport};
use crate::error::{Error, Result};

/// Indexed, read-only element access.
pub trait ReadSource<T>: Sync {
    fn read(&self, index: usize) -> T;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy + Sync> ReadSource<T> for [T] {
    #[inline]
    fn read(&self, index: usize) -> T {
        self[index]
    }

    fn len(&self) -> usize {
        <[T]>::len(self)
    }
}

impl<T: Copy + Sync> ReadSource<T> for Vec<T> {
    #[inline]
    fn read(&self, index: usize) -> T {
        self[index]
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<'a, T: Pod + Sync> ReadSource<T> for CachedReadIterator<'a, T> {
    #[inline]
    fn read(&self, index: usize) -> T {
        self.get(index)
    }

    fn len(&self) -> usize {
        CachedReadIterator::len(self)
    }
}

/// `output[i] = op(input[i])` for `i < size`.
pub fn transform<T, U, S, F>(
    device: &Device,
    config: &TransformConfig,
    input: &S,
    output: &mut [U],
    size: usize,
    op: F,
) -> Result<LaunchReport>
where
    S: ReadSource<T> + ?Sized,
    U: Send,
    F: Fn(T) -> U + Sync,
{
    if size > input.len() {
        return Err(Error::OutOfBounds {
            count: size,
            len: input.len(),
            what: "input",
        });
    }
    if size > output.len() {
        return Err(Error::OutOfBounds {
            count: size,
            len: output.len(),
            what: "output",
        });
    }
    debug!("transform: {} elements", size);

    device.launch(
        config.dims(),
        &mut output[..size],
        |_| (),
        |unit, tile: &mut [U], _| {
            for (i, out) in tile.iter_mut().enumerate() {
                *out = op(input.read(unit.global_offset + i));
            }
        },
    )
}
