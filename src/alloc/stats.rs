use serde::{Deserialize, Serialize};

/// A copy of the heap's aggregate counters.
///
/// `allocated_*` covers every live block (free or occupied) in the break
/// region plus every mapped block; `free_*` is the free subset of the break
/// region. A header is reclaimed, and `allocated_blocks` drops, only when two
/// blocks merge or a mapped block is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub allocated_blocks: usize,
    pub allocated_bytes: usize,
    /// `allocated_blocks * header_size`
    pub metadata_bytes: usize,
    pub header_size: usize,
}
