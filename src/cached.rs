//! Read-only cached access to device memory.
//!
//! A `CachedReadIterator` is bound to a region of device memory by pointer
//! and byte size, read through a fetch path that does not care about the
//! alignment of the bound bytes, and unbound after its last use. It is the
//! read side of the elementwise transform pipeline.

use std::marker::PhantomData;
use std::mem;

use bytemuck::Pod;

#[derive(Debug, Clone, Copy)]
pub struct CachedReadIterator<'a, T: Pod> {
    bound: Option<&'a [u8]>,
    /// Element offset of this iterator into the bound region.
    offset: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Pod> Default for CachedReadIterator<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: Pod> CachedReadIterator<'a, T> {
    /// An unbound iterator.
    pub fn new() -> Self {
        Self {
            bound: None,
            offset: 0,
            _marker: PhantomData,
        }
    }

    /// Associates the iterator with the first `size_in_bytes` bytes of `data`.
    ///
    /// Panics if `size_in_bytes` reaches past the end of `data`.
    pub fn bind(&mut self, data: &'a [T], size_in_bytes: usize) {
        let bytes: &'a [u8] = bytemuck::cast_slice(data);
        assert!(
            size_in_bytes <= bytes.len(),
            "binding {} bytes of a {}-byte region",
            size_in_bytes,
            bytes.len()
        );
        self.bound = Some(&bytes[..size_in_bytes]);
        self.offset = 0;
    }

    pub fn unbind(&mut self) {
        self.bound = None;
        self.offset = 0;
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Elements readable from this iterator's position; 0 when unbound.
    pub fn len(&self) -> usize {
        match self.bound {
            Some(bytes) => (bytes.len() / element_size::<T>()).saturating_sub(self.offset),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element `index` positions past this iterator.
    ///
    /// Panics when unbound or out of range.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        let bytes = match self.bound {
            Some(bytes) => bytes,
            None => panic!("read through an unbound CachedReadIterator"),
        };
        let size = element_size::<T>();
        let start = (self.offset + index) * size;
        bytemuck::pod_read_unaligned(&bytes[start..start + size])
    }

    /// An iterator `n` elements further along the same binding.
    pub fn offset(&self, n: usize) -> Self {
        Self {
            offset: self.offset + n,
            ..*self
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }
}

fn element_size<T>() -> usize {
    mem::size_of::<T>().max(1)
}
