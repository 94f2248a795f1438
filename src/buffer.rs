//! Device-resident buffers.

use std::mem;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytemuck::Pod;

use crate::error::Error;
use crate::queue::{Queue, Submission};

/// A handle on device memory. Clones share the same storage; host access goes
/// through a `Queue` so it is ordered with respect to launches.
pub struct Buffer<T: Pod> {
    data: Arc<RwLock<Vec<T>>>,
    pub capacity: usize,
    pub label: Option<String>,
}

impl<T: Pod> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            capacity: self.capacity,
            label: self.label.clone(),
        }
    }
}

impl<T: Pod> std::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity)
            .field("label", &self.label)
            .finish()
    }
}

impl<T: Pod + Send + Sync> Buffer<T> {
    pub fn create_buffer_from_data(t: &[T], label: Option<String>) -> Self {
        let capacity = mem::size_of::<T>() * t.len();
        Self {
            data: Arc::new(RwLock::new(t.to_vec())),
            capacity,
            label,
        }
    }

    /// A zero-filled buffer of `len` elements.
    pub fn create_buffer(len: usize, label: Option<String>) -> Self {
        Self {
            data: Arc::new(RwLock::new(vec![T::zeroed(); len])),
            capacity: mem::size_of::<T>() * len,
            label,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.capacity / mem::size_of::<T>().max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both handles refer to the same storage.
    pub fn same_storage<U: Pod>(&self, other: &Buffer<U>) -> bool {
        Arc::as_ptr(&self.data) as *const u8 == Arc::as_ptr(&other.data) as *const u8
    }

    /// Copies the buffer back to the host once every earlier submission on
    /// `queue` has finished.
    pub fn to_vec(&self, queue: &Queue) -> Submission<Vec<T>> {
        let buffer = self.clone();
        queue.submit(move |_| Ok(buffer.map_read().to_vec()))
    }

    /// Overwrites the start of the buffer with `data`, in queue order.
    pub fn write(&self, queue: &Queue, data: &[T]) -> Submission<()> {
        let buffer = self.clone();
        let data = data.to_vec();
        queue.submit(move |_| {
            let mut dst = buffer.map_write();
            if data.len() > dst.len() {
                return Err(Error::OutOfBounds {
                    count: data.len(),
                    len: dst.len(),
                    what: "buffer",
                });
            }
            dst[..data.len()].copy_from_slice(&data);
            Ok(())
        })
    }

    /// Raw bytes of the buffer contents.
    pub fn to_bytes(&self) -> Vec<u8> {
        let data = self.map_read();
        bytemuck::cast_slice::<T, u8>(data.as_slice()).to_vec()
    }

    pub(crate) fn map_read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn map_write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
