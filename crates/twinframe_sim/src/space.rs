//! # Module Space
//!
//! Bump allocator over the module's linear memory. Allocations only move
//! forward; the most recent allocation can be grown in place or given back.
//! Memory grows a page at a time when the bump pointer runs past the end.

use twinframe_ffi::{pass_string, read_string, FfiError, FfiResult, LinearMemory, ModuleMemory, ViewCache};

/// Address 0 is never handed out.
const HEAP_BASE: usize = 8;

/// Linear memory plus its allocator.
#[derive(Debug)]
pub struct ModuleSpace {
    memory: LinearMemory,
    views: ViewCache,
    offset: usize,
    last: Option<(u32, u32)>,
    allocations: u64,
}

impl ModuleSpace {
    /// Creates a space with `initial_pages` of memory.
    ///
    /// # Arguments
    ///
    /// * `initial_pages` - Pages allocated up front
    /// * `page_size` - Bytes per page
    /// * `max_pages` - Growth limit
    ///
    /// # Errors
    ///
    /// [`FfiError::InvalidPageSize`] or [`FfiError::OutOfMemory`] for
    /// geometry the memory cannot take.
    pub fn new(initial_pages: usize, page_size: usize, max_pages: usize) -> FfiResult<Self> {
        Ok(Self {
            memory: LinearMemory::new(initial_pages, page_size, max_pages)?,
            views: ViewCache::new(),
            offset: HEAP_BASE,
            last: None,
            allocations: 0,
        })
    }

    /// Bytes handed out so far, including alignment padding.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset - HEAP_BASE
    }

    /// Number of successful allocations.
    #[inline]
    #[must_use]
    pub const fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Copies `words` into fresh 4-byte aligned memory.
    ///
    /// # Errors
    ///
    /// Allocation or view errors.
    pub fn store_words(&mut self, words: &[u32]) -> FfiResult<u32> {
        let size = u32::try_from(words.len() * 4).map_err(|_| FfiError::OutOfMemory {
            requested: words.len() * 4,
        })?;
        let ptr = self.malloc(size, 4)?;
        let view = self.views.u32s(&self.memory);
        view.subarray_mut(&mut self.memory, (ptr / 4) as usize, words.len())?
            .copy_from_slice(words);
        Ok(ptr)
    }

    /// Copies `text` into fresh memory. Returns `(ptr, len)`.
    ///
    /// # Errors
    ///
    /// Allocation or view errors.
    pub fn store_str(&mut self, text: &str) -> FfiResult<(u32, u32)> {
        let mut views = std::mem::take(&mut self.views);
        let stored = pass_string(self, &mut views, text);
        self.views = views;
        stored
    }

    /// Decodes a string the host placed in module memory.
    ///
    /// # Errors
    ///
    /// [`FfiError::InvalidUtf8`] or view errors.
    pub fn load_str(&mut self, ptr: u32, len: u32) -> FfiResult<String> {
        read_string(&mut self.views, &self.memory, ptr, len)
    }

    fn ensure(&mut self, end: usize, requested: u32) -> FfiResult<()> {
        let length = self.memory.byte_length();
        if end <= length {
            return Ok(());
        }
        let page = self.memory.page_size();
        let pages = (end - length).div_ceil(page);
        self.memory.grow(pages).ok_or(FfiError::OutOfMemory {
            requested: requested as usize,
        })?;
        Ok(())
    }
}

impl ModuleMemory for ModuleSpace {
    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    fn malloc(&mut self, size: u32, align: u32) -> FfiResult<u32> {
        let align = align.max(1) as usize;
        let aligned = (self.offset + align - 1) & !(align - 1);
        let end = aligned + size as usize;
        self.ensure(end, size)?;

        let ptr = u32::try_from(aligned).map_err(|_| FfiError::OutOfMemory {
            requested: size as usize,
        })?;
        self.offset = end;
        self.last = Some((ptr, size));
        self.allocations += 1;
        Ok(ptr)
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> FfiResult<u32> {
        if self.last == Some((ptr, old_size)) {
            let end = ptr as usize + new_size as usize;
            self.ensure(end, new_size)?;
            self.offset = end;
            self.last = Some((ptr, new_size));
            return Ok(ptr);
        }

        let fresh = self.malloc(new_size, align)?;
        let keep = old_size.min(new_size) as usize;
        if keep > 0 {
            let view = self.views.bytes(&self.memory);
            let length = view.len();
            let bytes = view.subarray_mut(&mut self.memory, 0, length)?;
            bytes.copy_within(ptr as usize..ptr as usize + keep, fresh as usize);
        }
        Ok(fresh)
    }

    fn free(&mut self, ptr: u32, size: u32, _align: u32) {
        if self.last == Some((ptr, size)) {
            self.offset = ptr as usize;
            self.last = None;
        }
    }
}
