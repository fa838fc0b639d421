//! Sized-free allocator facade used for script arrays and object memory.
//!
//! Every block is preceded by a header recording its layout, so callers free
//! with just the pointer the way engine containers do.

use std::alloc::{self, Layout};
use std::ptr;

pub const DEFAULT_ALIGNMENT: usize = 16;

#[repr(C)]
struct BlockHeader {
    size: usize,
    alignment: usize,
}

fn block_layout(count: usize, alignment: usize) -> Option<(Layout, usize)> {
    let alignment = alignment.max(DEFAULT_ALIGNMENT).next_power_of_two();
    let header = alignment.max(std::mem::size_of::<BlockHeader>());
    let layout = Layout::from_size_align(count.checked_add(header)?, alignment).ok()?;
    Some((layout, header))
}

unsafe fn header_of(ptr: *mut u8) -> *mut BlockHeader {
    ptr.sub(std::mem::size_of::<BlockHeader>()).cast()
}

/// Allocates `count` bytes. Returns null for a zero sized request.
pub unsafe fn malloc(count: usize, alignment: usize) -> *mut u8 {
    if count == 0 {
        return ptr::null_mut();
    }
    let Some((layout, header)) = block_layout(count, alignment) else {
        return ptr::null_mut();
    };
    let base = alloc::alloc(layout);
    if base.is_null() {
        alloc::handle_alloc_error(layout);
    }
    let ptr = base.add(header);
    header_of(ptr).write(BlockHeader {
        size: count,
        alignment: layout.align(),
    });
    ptr
}

/// Resizes a block from [`malloc`], preserving the leading bytes.
pub unsafe fn realloc(original: *mut u8, count: usize, alignment: usize) -> *mut u8 {
    if original.is_null() {
        return malloc(count, alignment);
    }
    if count == 0 {
        free(original);
        return ptr::null_mut();
    }
    let old = header_of(original).read();
    let wanted = alignment.max(DEFAULT_ALIGNMENT).next_power_of_two();
    if wanted != old.alignment {
        let new = malloc(count, alignment);
        if !new.is_null() {
            ptr::copy_nonoverlapping(original, new, old.size.min(count));
        }
        free(original);
        return new;
    }

    let Some((old_layout, header)) = block_layout(old.size, old.alignment) else {
        return ptr::null_mut();
    };
    let base = original.sub(header);
    let new_base = alloc::realloc(base, old_layout, count + header);
    if new_base.is_null() {
        alloc::handle_alloc_error(old_layout);
    }
    let ptr = new_base.add(header);
    header_of(ptr).write(BlockHeader {
        size: count,
        alignment: old.alignment,
    });
    ptr
}

pub unsafe fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    let header = header_of(ptr).read();
    if let Some((layout, offset)) = block_layout(header.size, header.alignment) {
        alloc::dealloc(ptr.sub(offset), layout);
    }
}

/// Size requested for a live block.
pub unsafe fn allocation_size(ptr: *const u8) -> usize {
    if ptr.is_null() {
        0
    } else {
        header_of(ptr.cast_mut()).read().size
    }
}
