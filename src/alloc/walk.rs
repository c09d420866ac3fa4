//! Walking the heap: per-block views, a consistency check, and JSON snapshots
//! of the whole arena.
//!
//! Everything here allocates through whatever the *process* allocator is, so
//! none of it may run while the heap being walked is that allocator and is
//! mid-operation.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    marker::PhantomData,
    path::Path,
    ptr::NonNull,
};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    block::{Block, BlockState, Link},
    error::HeapCorruption,
    heap::{Heap, ALIGN},
    stats::HeapStats,
};
use crate::{os::mem::Growth, serialize::serde_ptr, util::assert::ends_at};

/// What one block looks like from the outside
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Where the payload starts
    #[serde(with = "serde_ptr")]
    pub payload: *const u8,
    /// Granted payload bytes
    pub size: usize,
    pub state: BlockState,
    pub mapped: bool,
}

impl BlockInfo {
    /// # Safety
    ///
    /// `block` must be a live header.
    unsafe fn of(block: NonNull<Block>) -> Self {
        let b = block.as_ptr();
        Self {
            payload: Block::payload(block).as_ptr(),
            size: (*b).size,
            state: (*b).state,
            mapped: (*b).mapped,
        }
    }
}

/// Iterator along one of the heap's lists
pub struct Blocks<'a> {
    cursor: Link,
    step: fn(&Block) -> Link,
    _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.cursor?;
        // SAFETY: The iterator borrows the heap, so every header on the list
        //         stays live and unmodified while it runs.
        unsafe {
            self.cursor = (self.step)(&*block.as_ptr());
            Some(BlockInfo::of(block))
        }
    }
}

/// The whole arena at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub stats: HeapStats,
    /// Break-region blocks in address order
    pub blocks: Vec<BlockInfo>,
    /// Free blocks in (size, address) order
    pub free_index: Vec<BlockInfo>,
    pub mapped: Vec<BlockInfo>,
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed")]
    Io(#[from] io::Error),
    #[error("snapshot is not valid JSON")]
    SerdeJson(#[from] serde_json::Error),
}

impl HeapSnapshot {
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        debug!(
            "writing snapshot of {} blocks to {}",
            self.blocks.len() + self.mapped.len(),
            path.display()
        );
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        debug!("reading snapshot from {}", path.display());
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Break-region bytes covered by blocks, headers included
    pub fn break_footprint(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.size + self.stats.header_size)
            .sum()
    }
}

impl<G> Heap<G>
where
    G: Growth,
{
    fn walk(&self, start: Link, step: fn(&Block) -> Link) -> Blocks<'_> {
        Blocks {
            cursor: start,
            step,
            _heap: PhantomData,
        }
    }

    /// Break-region blocks, lowest address first
    pub fn blocks(&self) -> Blocks<'_> {
        self.walk(self.head, |b| b.next)
    }

    /// Free blocks, best fit first
    pub fn free_index(&self) -> Blocks<'_> {
        self.walk(self.free_head, |b| b.free_next)
    }

    /// Mapped blocks, most recent first
    pub fn mapped(&self) -> Blocks<'_> {
        self.walk(self.mapped_head, |b| b.next)
    }

    pub fn snapshot(&self) -> HeapSnapshot {
        HeapSnapshot {
            stats: self.stats(),
            blocks: self.blocks().collect(),
            free_index: self.free_index().collect(),
            mapped: self.mapped().collect(),
        }
    }

    /// Walk every list and check it against the others and the counters
    pub fn verify(&self) -> Result<(), HeapCorruption> {
        let mut free_blocks = 0;
        let mut free_bytes = 0;
        let mut allocated_blocks = 0;
        let mut allocated_bytes = 0;

        // SAFETY: Every link reachable from the arena is a live header.
        unsafe {
            let mut prev: Link = None;
            let mut cursor = self.head;
            while let Some(block) = cursor {
                let b = block.as_ptr();
                let address = b as usize;
                if (*b).size % ALIGN != 0 {
                    return Err(HeapCorruption::Misaligned {
                        address,
                        size: (*b).size,
                    });
                }
                if (*b).mapped || (*b).prev != prev {
                    return Err(HeapCorruption::AddressLinks { address });
                }
                if let Some(next) = (*b).next {
                    let payload = Block::payload(block).as_ptr();
                    if !ends_at(payload, (*b).size, next.as_ptr().cast()) {
                        return Err(HeapCorruption::Gap { address });
                    }
                    if Block::is_free(cursor) && Block::is_free(Some(next)) {
                        return Err(HeapCorruption::Uncoalesced { address });
                    }
                }
                if (*b).state == BlockState::Free {
                    free_blocks += 1;
                    free_bytes += (*b).size;
                }
                allocated_blocks += 1;
                allocated_bytes += (*b).size;
                prev = cursor;
                cursor = (*b).next;
            }
            if self.tail != prev {
                return Err(HeapCorruption::AddressLinks {
                    address: prev.map_or(0, |p| p.as_ptr() as usize),
                });
            }

            let mut indexed = 0;
            let mut indexed_bytes = 0;
            let mut last_key = None;
            let mut prev: Link = None;
            let mut cursor = self.free_head;
            while let Some(block) = cursor {
                let b = block.as_ptr();
                let address = b as usize;
                if (*b).state != BlockState::Free || (*b).mapped {
                    return Err(HeapCorruption::FreeIndexState { address });
                }
                let key = ((*b).size, address);
                if (*b).free_prev != prev || last_key.is_some_and(|last| last >= key) {
                    return Err(HeapCorruption::FreeIndexOrder { address });
                }
                indexed += 1;
                indexed_bytes += (*b).size;
                if indexed > free_blocks {
                    break;
                }
                last_key = Some(key);
                prev = cursor;
                cursor = (*b).free_next;
            }
            if indexed != free_blocks {
                return Err(HeapCorruption::FreeIndexMembership {
                    indexed,
                    free: free_blocks,
                });
            }
            if indexed_bytes != free_bytes {
                return Err(HeapCorruption::FreeIndexBytes {
                    indexed: indexed_bytes,
                    free: free_bytes,
                });
            }
            if self.free_tail != prev {
                return Err(HeapCorruption::FreeIndexOrder {
                    address: prev.map_or(0, |p| p.as_ptr() as usize),
                });
            }

            let mut prev: Link = None;
            let mut cursor = self.mapped_head;
            while let Some(block) = cursor {
                let b = block.as_ptr();
                if (*b).state != BlockState::Occupied || !(*b).mapped || (*b).prev != prev {
                    return Err(HeapCorruption::MappedState {
                        address: b as usize,
                    });
                }
                allocated_blocks += 1;
                allocated_bytes += (*b).size;
                prev = cursor;
                cursor = (*b).next;
            }
        }

        let counters = [
            ("free_blocks", self.free_blocks(), free_blocks),
            ("free_bytes", self.free_bytes(), free_bytes),
            ("allocated_blocks", self.allocated_blocks(), allocated_blocks),
            ("allocated_bytes", self.allocated_bytes(), allocated_bytes),
        ];
        for (counter, recorded, actual) in counters {
            if recorded != actual {
                return Err(HeapCorruption::Counter {
                    counter,
                    recorded,
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;
    use crate::{alloc::block::HEADER_SIZE, os::mem::ReservedBreak};

    #[test]
    fn snapshot_survives_a_trip_through_a_file() {
        let mut heap = Heap::new(ReservedBreak::new(1 << 20).unwrap());
        let a = heap.allocate(300).unwrap();
        let _b = heap.allocate(40).unwrap();
        let _c = heap.allocate(200_000).unwrap();
        unsafe { heap.release(a.as_ptr()) };

        let snapshot = heap.snapshot();
        assert_eq!(snapshot.blocks.len(), 2);
        assert_eq!(snapshot.free_index.len(), 1);
        assert_eq!(snapshot.free_index[0].payload, a.as_ptr() as *const u8);
        assert_eq!(snapshot.mapped.len(), 1);
        assert_eq!(
            snapshot.break_footprint(),
            heap.growth().brk() as usize - heap.growth().base() as usize
        );

        let path = env::temp_dir().join(format!("wilderness-snapshot-{}.json", std::process::id()));
        snapshot.write_to_file(&path).unwrap();
        let loaded = HeapSnapshot::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn verify_catches_free_index_bytes_disagreeing_with_the_heap() {
        let mut heap = Heap::new(ReservedBreak::new(1 << 20).unwrap());
        let a = heap.allocate(304).unwrap();
        let _guard = heap.allocate(16).unwrap();
        unsafe { heap.release(a.as_ptr()) };
        assert_eq!(heap.verify(), Ok(()));

        // Swap the one indexed block for a smaller stray header, so the
        // count still matches but the bytes do not.
        let mut stray = [0u64; HEADER_SIZE / 8];
        unsafe {
            let at = NonNull::new(stray.as_mut_ptr()).unwrap().cast::<u8>();
            let stray = Block::write(at, 96, BlockState::Free, false);
            heap.free_head = Some(stray);
            heap.free_tail = Some(stray);
        }
        assert_eq!(
            heap.verify(),
            Err(HeapCorruption::FreeIndexBytes {
                indexed: 96,
                free: 304,
            })
        );
    }

    #[test]
    fn verify_catches_a_skewed_counter() {
        let mut heap = Heap::new(ReservedBreak::new(1 << 20).unwrap());
        let _a = heap.allocate(64).unwrap();
        assert_eq!(heap.verify(), Ok(()));
        heap.free_bytes += 8;
        assert_eq!(
            heap.verify(),
            Err(HeapCorruption::Counter {
                counter: "free_bytes",
                recorded: 8,
                actual: 0,
            })
        );
    }
}
