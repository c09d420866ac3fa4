/// Round up `n` to the nearest multiple of `to`, or `None` if that overflows
pub fn round_up(n: usize, to: usize) -> Option<usize> {
    debug_assert!(to != 0);
    Some(n.checked_add(to - 1)? / to * to)
}

/// Round up `n` to the allocator's 8-byte granule
pub fn align8(n: usize) -> Option<usize> {
    round_up(n, 8)
}
