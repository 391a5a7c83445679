//! # String and Buffer Marshalling
//!
//! Text crosses into module memory as freshly allocated UTF-8 and comes
//! back by `(ptr, len)`. Numeric arrays are never copied on the way out:
//! callers get a slice straight into module memory.

use crate::error::{FfiError, FfiResult};
use crate::memory::{LinearMemory, ViewCache};
use crate::module::ModuleMemory;

/// Copies `value` into module memory. Returns `(ptr, len)` in bytes.
///
/// ASCII is copied byte for byte into an allocation sized by character
/// count. At the first non-ASCII byte the allocation is grown to fit the
/// worst case for the remainder, the rest is encoded, and the allocation is
/// shrunk to the bytes actually written.
///
/// # Errors
///
/// Allocator and view errors.
pub fn pass_string(space: &mut dyn ModuleMemory, views: &mut ViewCache, value: &str) -> FfiResult<(u32, u32)> {
    let bytes = value.as_bytes();

    if !space.supports_realloc() {
        let len = to_u32(bytes.len())?;
        let ptr = space.malloc(len, 1)?;
        write_bytes(space, views, ptr, bytes)?;
        return Ok((ptr, len));
    }

    let mut len = to_u32(value.chars().count())?;
    let mut ptr = space.malloc(len, 1)?;

    let ascii = bytes.iter().take_while(|b| b.is_ascii()).count();
    write_bytes(space, views, ptr, &bytes[..ascii])?;

    if ascii == bytes.len() {
        return Ok((ptr, len));
    }

    // `ascii` sits on a char boundary: every byte before it is one char.
    let rest = &value[ascii..];
    let offset = to_u32(ascii)?;
    let worst = offset + to_u32(rest.chars().count() * 4)?;
    ptr = space.realloc(ptr, len, worst, 1)?;
    len = worst;

    write_bytes(space, views, ptr + offset, rest.as_bytes())?;
    let written = to_u32(bytes.len())?;
    ptr = space.realloc(ptr, len, written, 1)?;
    Ok((ptr, written))
}

/// Decodes UTF-8 at `ptr..ptr + len`.
///
/// # Errors
///
/// [`FfiError::InvalidUtf8`] on any malformed sequence; nothing is replaced.
pub fn read_string(views: &mut ViewCache, memory: &LinearMemory, ptr: u32, len: u32) -> FfiResult<String> {
    let raw = views
        .bytes(memory)
        .subarray(memory, ptr as usize, len as usize)?;
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| FfiError::InvalidUtf8 {
            ptr,
            len,
            reason: e.to_string(),
        })
}

/// Borrows `len` `u32` words starting at byte address `ptr`.
///
/// # Errors
///
/// [`FfiError::Misaligned`] if `ptr` is not 4-byte aligned, or a view error.
pub fn array_u32<'m>(views: &mut ViewCache, memory: &'m LinearMemory, ptr: u32, len: u32) -> FfiResult<&'m [u32]> {
    if ptr % 4 != 0 {
        return Err(FfiError::Misaligned { ptr, align: 4 });
    }
    views
        .u32s(memory)
        .subarray(memory, (ptr / 4) as usize, len as usize)
}

fn write_bytes(space: &mut dyn ModuleMemory, views: &mut ViewCache, ptr: u32, bytes: &[u8]) -> FfiResult<()> {
    let view = views.bytes(space.memory());
    view.subarray_mut(space.memory_mut(), ptr as usize, bytes.len())?
        .copy_from_slice(bytes);
    Ok(())
}

fn to_u32(n: usize) -> FfiResult<u32> {
    u32::try_from(n).map_err(|_| FfiError::OutOfMemory { requested: n })
}
