//! C entry points onto [`WILDERNESS`]. Failures come back as null, as C
//! callers expect.

use libc::{c_void, size_t};

use crate::alloc::global::WILDERNESS;

fn into_raw(result: Result<std::ptr::NonNull<u8>, crate::AllocError>) -> *mut c_void {
    result.map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr().cast())
}

#[no_mangle]
pub extern "C" fn wl_malloc(size: size_t) -> *mut c_void {
    into_raw(WILDERNESS.allocate(size))
}

#[no_mangle]
pub extern "C" fn wl_calloc(count: size_t, size: size_t) -> *mut c_void {
    into_raw(WILDERNESS.allocate_zeroed(count, size))
}

/// # Safety
///
/// `ptr` must be null or come from one of the `wl_*` allocation functions.
#[no_mangle]
pub unsafe extern "C" fn wl_free(ptr: *mut c_void) {
    WILDERNESS.release(ptr.cast())
}

/// # Safety
///
/// `ptr` must be null or a live allocation from one of the `wl_*` allocation
/// functions. On failure it stays valid and untouched.
#[no_mangle]
pub unsafe extern "C" fn wl_realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
    into_raw(WILDERNESS.reallocate(ptr.cast(), size))
}

#[no_mangle]
pub extern "C" fn wl_free_blocks() -> size_t {
    WILDERNESS.stats().free_blocks
}

#[no_mangle]
pub extern "C" fn wl_free_bytes() -> size_t {
    WILDERNESS.stats().free_bytes
}

#[no_mangle]
pub extern "C" fn wl_allocated_blocks() -> size_t {
    WILDERNESS.stats().allocated_blocks
}

#[no_mangle]
pub extern "C" fn wl_allocated_bytes() -> size_t {
    WILDERNESS.stats().allocated_bytes
}

#[no_mangle]
pub extern "C" fn wl_metadata_bytes() -> size_t {
    WILDERNESS.stats().metadata_bytes
}

#[no_mangle]
pub extern "C" fn wl_header_size() -> size_t {
    crate::alloc::block::HEADER_SIZE
}
