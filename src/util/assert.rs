/// Test if `ptr` is aligned to a multiple of `align`
pub fn aligned_to<T>(ptr: *const T, align: usize) -> bool {
    ptr as usize % align == 0
}

/// Test if the half-open span `[start, start + len)` ends exactly at `end`
pub fn ends_at(start: *const u8, len: usize, end: *const u8) -> bool {
    (start as usize).checked_add(len) == Some(end as usize)
}
