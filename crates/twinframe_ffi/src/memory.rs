//! # Linear Memory and View Cache
//!
//! The module's memory is one resizable block. Growing it moves the block,
//! so any view built before the growth points at nothing. Views here are
//! tokens tagged with the byte length ("generation") they were built for and
//! refuse to resolve once the memory has a different length.
//!
//! Memory is backed by `u32` words so that byte, `i32` and `u32` views are
//! all zero-copy `bytemuck` casts.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::{FfiError, FfiResult};

/// Default page size in bytes.
pub const PAGE_SIZE: usize = 65_536;

/// Element type of a view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// `u8` elements.
    Bytes,
    /// `i32` elements.
    I32,
    /// `u32` elements.
    U32,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bytes => "u8",
            Self::I32 => "i32",
            Self::U32 => "u32",
        })
    }
}

/// Element types a [`MemoryView`] can be built over.
pub trait ViewElement: Pod {
    /// Kind reported in errors.
    const KIND: ViewKind;
}

impl ViewElement for u8 {
    const KIND: ViewKind = ViewKind::Bytes;
}

impl ViewElement for i32 {
    const KIND: ViewKind = ViewKind::I32;
}

impl ViewElement for u32 {
    const KIND: ViewKind = ViewKind::U32;
}

/// A module's growable linear memory.
pub struct LinearMemory {
    words: Vec<u32>,
    page_size: usize,
    max_pages: usize,
}

impl LinearMemory {
    /// Creates zeroed memory of `initial_pages` pages.
    ///
    /// # Arguments
    ///
    /// * `initial_pages` - Pages allocated up front
    /// * `page_size` - Bytes per page, a non-zero multiple of 4
    /// * `max_pages` - Growth limit
    ///
    /// # Errors
    ///
    /// [`FfiError::InvalidPageSize`] unless `page_size` is a non-zero
    /// multiple of 4, [`FfiError::OutOfMemory`] if the initial size overflows.
    pub fn new(initial_pages: usize, page_size: usize, max_pages: usize) -> FfiResult<Self> {
        if page_size == 0 || page_size % 4 != 0 {
            return Err(FfiError::InvalidPageSize(page_size));
        }
        let bytes = initial_pages
            .checked_mul(page_size)
            .ok_or(FfiError::OutOfMemory { requested: usize::MAX })?;
        Ok(Self {
            words: vec![0; bytes / 4],
            page_size,
            max_pages: max_pages.max(initial_pages),
        })
    }

    /// Current size in bytes. This is the view generation.
    #[inline]
    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.words.len() * 4
    }

    /// Current size in pages.
    #[inline]
    #[must_use]
    pub fn pages(&self) -> usize {
        self.byte_length() / self.page_size
    }

    /// Bytes per page.
    #[inline]
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Grows by `delta` zeroed pages. Every outstanding view goes stale.
    ///
    /// Returns the previous page count, or `None` past the growth limit.
    pub fn grow(&mut self, delta: usize) -> Option<usize> {
        let previous = self.pages();
        if previous + delta > self.max_pages {
            return None;
        }
        if delta > 0 {
            self.words.resize(self.words.len() + delta * self.page_size / 4, 0);
            tracing::trace!(previous, pages = previous + delta, "linear memory grown");
        }
        Some(previous)
    }

    fn cast<T: ViewElement>(&self) -> FfiResult<&[T]> {
        bytemuck::try_cast_slice(&self.words).map_err(|_| FfiError::Misaligned {
            ptr: 0,
            align: 4,
        })
    }

    fn cast_mut<T: ViewElement>(&mut self) -> FfiResult<&mut [T]> {
        bytemuck::try_cast_slice_mut(&mut self.words).map_err(|_| FfiError::Misaligned {
            ptr: 0,
            align: 4,
        })
    }
}

impl fmt::Debug for LinearMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearMemory")
            .field("bytes", &self.byte_length())
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// A typed view token over [`LinearMemory`].
///
/// Cheap to copy; holds no borrow. Resolving it checks the generation.
pub struct MemoryView<T> {
    byte_length: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for MemoryView<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MemoryView<T> {}

impl<T: ViewElement> fmt::Debug for MemoryView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryView<{}>({} bytes)", T::KIND, self.byte_length)
    }
}

impl<T: ViewElement> MemoryView<T> {
    fn build(memory: &LinearMemory) -> Self {
        Self {
            byte_length: memory.byte_length(),
            _marker: PhantomData,
        }
    }

    /// Byte length this view was built for.
    #[inline]
    #[must_use]
    pub const fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Number of elements visible through this view.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.byte_length / std::mem::size_of::<T>()
    }

    /// Whether the view covers no memory.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.byte_length == 0
    }

    /// A zero-length view is always stale, as is one built for a
    /// different memory size.
    #[inline]
    #[must_use]
    pub fn is_stale(&self, memory: &LinearMemory) -> bool {
        self.byte_length == 0 || self.byte_length != memory.byte_length()
    }

    fn check(&self, memory: &LinearMemory) -> FfiResult<()> {
        if self.is_stale(memory) {
            return Err(FfiError::StaleView {
                kind: T::KIND,
                built: self.byte_length,
                current: memory.byte_length(),
            });
        }
        Ok(())
    }

    /// Resolves the whole view.
    ///
    /// # Errors
    ///
    /// [`FfiError::StaleView`] if memory changed size since the view was built.
    pub fn slice<'m>(&self, memory: &'m LinearMemory) -> FfiResult<&'m [T]> {
        self.check(memory)?;
        memory.cast()
    }

    /// Resolves `len` elements starting at element `start`.
    ///
    /// # Errors
    ///
    /// [`FfiError::StaleView`] or [`FfiError::OutOfBounds`].
    pub fn subarray<'m>(&self, memory: &'m LinearMemory, start: usize, len: usize) -> FfiResult<&'m [T]> {
        let all = self.slice(memory)?;
        start
            .checked_add(len)
            .and_then(|end| all.get(start..end))
            .ok_or(FfiError::OutOfBounds {
                offset: start,
                len,
                size: all.len(),
            })
    }

    /// Mutable form of [`Self::subarray`].
    ///
    /// # Errors
    ///
    /// [`FfiError::StaleView`] or [`FfiError::OutOfBounds`].
    pub fn subarray_mut<'m>(
        &self,
        memory: &'m mut LinearMemory,
        start: usize,
        len: usize,
    ) -> FfiResult<&'m mut [T]> {
        self.check(memory)?;
        let all = memory.cast_mut::<T>()?;
        let size = all.len();
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(&mut all[start..end]),
            _ => Err(FfiError::OutOfBounds {
                offset: start,
                len,
                size,
            }),
        }
    }
}

/// Lazily built, generation-checked views of each kind.
#[derive(Debug, Default)]
pub struct ViewCache {
    bytes: Option<MemoryView<u8>>,
    i32s: Option<MemoryView<i32>>,
    u32s: Option<MemoryView<u32>>,
    rebuilds: u64,
}

impl ViewCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte view, rebuilt if stale.
    pub fn bytes(&mut self, memory: &LinearMemory) -> MemoryView<u8> {
        refresh(&mut self.bytes, &mut self.rebuilds, memory)
    }

    /// Signed 32-bit view, rebuilt if stale.
    pub fn i32s(&mut self, memory: &LinearMemory) -> MemoryView<i32> {
        refresh(&mut self.i32s, &mut self.rebuilds, memory)
    }

    /// Unsigned 32-bit view, rebuilt if stale.
    pub fn u32s(&mut self, memory: &LinearMemory) -> MemoryView<u32> {
        refresh(&mut self.u32s, &mut self.rebuilds, memory)
    }

    /// Drops every cached view.
    pub fn invalidate(&mut self) {
        self.bytes = None;
        self.i32s = None;
        self.u32s = None;
    }

    /// How many views have been (re)built so far.
    #[inline]
    #[must_use]
    pub const fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

fn refresh<T: ViewElement>(
    slot: &mut Option<MemoryView<T>>,
    rebuilds: &mut u64,
    memory: &LinearMemory,
) -> MemoryView<T> {
    match slot {
        Some(view) if !view.is_stale(memory) => *view,
        _ => {
            let view = MemoryView::build(memory);
            *slot = Some(view);
            *rebuilds += 1;
            view
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_storage() {
        let mut memory = LinearMemory::new(1, 1024, 4).unwrap();
        let mut cache = ViewCache::new();

        let u32s = cache.u32s(&memory);
        u32s.subarray_mut(&mut memory, 2, 1).unwrap()[0] = 0x0403_0201;

        let bytes = cache.bytes(&memory);
        assert_eq!(bytes.subarray(&memory, 8, 4).unwrap(), &[1, 2, 3, 4]);

        let i32s = cache.i32s(&memory);
        assert_eq!(i32s.subarray(&memory, 2, 1).unwrap(), &[0x0403_0201]);
    }

    #[test]
    fn test_growth_makes_views_stale() {
        let mut memory = LinearMemory::new(1, 1024, 4).unwrap();
        let mut cache = ViewCache::new();

        let old = cache.bytes(&memory);
        assert_eq!(old.len(), 1024);

        assert_eq!(memory.grow(1), Some(1));
        assert!(old.is_stale(&memory));
        assert!(matches!(
            old.slice(&memory),
            Err(FfiError::StaleView {
                built: 1024,
                current: 2048,
                ..
            })
        ));

        let fresh = cache.bytes(&memory);
        assert_eq!(fresh.byte_length(), 2048);
        assert_eq!(fresh.slice(&memory).unwrap().len(), 2048);
    }

    #[test]
    fn test_cache_reuses_until_growth() {
        let mut memory = LinearMemory::new(1, 256, 2).unwrap();
        let mut cache = ViewCache::new();

        cache.u32s(&memory);
        cache.u32s(&memory);
        assert_eq!(cache.rebuilds(), 1);

        memory.grow(1);
        cache.u32s(&memory);
        assert_eq!(cache.rebuilds(), 2);
    }

    #[test]
    fn test_grow_respects_limit() {
        let mut memory = LinearMemory::new(1, 256, 2).unwrap();
        assert_eq!(memory.grow(1), Some(1));
        assert_eq!(memory.grow(1), None);
        assert_eq!(memory.pages(), 2);
    }

    #[test]
    fn test_out_of_bounds() {
        let memory = LinearMemory::new(1, 64, 1).unwrap();
        let mut cache = ViewCache::new();
        let view = cache.u32s(&memory);
        assert!(matches!(
            view.subarray(&memory, 15, 2),
            Err(FfiError::OutOfBounds { size: 16, .. })
        ));
    }

    #[test]
    fn test_empty_memory_view_is_stale() {
        let memory = LinearMemory::new(0, 64, 1).unwrap();
        let mut cache = ViewCache::new();
        let view = cache.bytes(&memory);
        assert!(view.is_stale(&memory));
        assert!(view.slice(&memory).is_err());
    }
}
