//! A heap allocator that manages memory directly against the program break and
//! anonymous mappings: best-fit reuse with splitting and coalescing, in-place
//! growth of the topmost ("wilderness") block, standalone mappings for large
//! requests, and a reallocation path that prefers merging with free
//! neighbours over copying.

pub mod alloc;
pub mod externc;
pub mod os;
mod serialize;
pub mod util;

pub use alloc::{
    block::{BlockState, HEADER_SIZE},
    config::Config,
    error::{AllocError, HeapCorruption},
    global::{GlobalHeap, WILDERNESS},
    heap::Heap,
    stats::HeapStats,
    walk::{BlockInfo, HeapSnapshot, SnapshotError},
};
pub use os::mem::{Growth, ProgramBreak, ReservedBreak};
