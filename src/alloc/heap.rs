//! The arena and its three engines.
//!
//! Memory comes from two places. Most blocks are carved out of one
//! contiguous, append-only break region, kept in ascending address order; the
//! last of them is the *wilderness*, the only block that can grow without
//! moving. Requests that reach [`Config::mmap_threshold`] get a standalone
//! mapping of their own instead, which goes straight back to the OS when
//! released.
//!
//! Free break-region blocks are additionally threaded through a free-size
//! index, ordered by (size, address), which makes the first sufficient block
//! found from the small end the best fit.

use std::ptr::{self, NonNull};

use super::{
    block::{Block, BlockState, Link, HEADER_SIZE},
    config::Config,
    error::AllocError,
    stats::HeapStats,
};
use crate::{
    os::mem::Growth,
    putln,
    util::{
        assert::aligned_to,
        hint::cold,
        num::align8,
        print::fatal,
    },
};

/// Granule of every payload size and payload address
pub const ALIGN: usize = 8;

/// Outcome of growing the break in place
enum Extension {
    Extended,
    /// The break was no longer where the wilderness ends, so the bytes were
    /// handed straight back
    Detached,
}

/// How `reallocate()` is going to satisfy a request, decided before anything
/// is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resize {
    /// Already big enough
    InPlace,
    /// Merge into the free predecessor, then grow the break by `grow` (only
    /// ever non-zero for the wilderness)
    MergeDown { grow: usize },
    /// The block is the wilderness
    Extend { grow: usize },
    MergeUp,
    MergeBoth,
    /// The free successor is the wilderness: merge up (and down, if `down`),
    /// then grow the break by `grow`
    MergeUpExtend { down: bool, grow: usize },
    Relocate,
}

impl Resize {
    fn grow(self) -> usize {
        match self {
            Resize::MergeDown { grow }
            | Resize::Extend { grow }
            | Resize::MergeUpExtend { grow, .. } => grow,
            _ => 0,
        }
    }
}

/// A single arena: every block's memory belongs to it, and nothing outside it
/// frees a block.
///
/// This is not thread safe. See [`GlobalHeap`](super::global::GlobalHeap) for
/// a wrapper that can be installed as the process allocator.
pub struct Heap<G>
where
    G: Growth,
{
    pub(super) growth: G,
    pub(super) config: Config,
    initialized: bool,
    /// Address-order list, `tail` is the wilderness
    pub(super) head: Link,
    pub(super) tail: Link,
    /// Free-size index
    pub(super) free_head: Link,
    pub(super) free_tail: Link,
    pub(super) mapped_head: Link,
    pub(super) free_blocks: usize,
    pub(super) free_bytes: usize,
    pub(super) allocated_blocks: usize,
    pub(super) allocated_bytes: usize,
}

impl<G> Heap<G>
where
    G: Growth,
{
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    pub const fn new(growth: G) -> Self {
        Self::with_config(growth, Config::DEFAULT)
    }

    pub const fn with_config(growth: G, config: Config) -> Self {
        Self {
            growth,
            config,
            initialized: false,
            head: None,
            tail: None,
            free_head: None,
            free_tail: None,
            mapped_head: None,
            free_blocks: 0,
            free_bytes: 0,
            allocated_blocks: 0,
            allocated_bytes: 0,
        }
    }

    pub const fn growth(&self) -> &G {
        &self.growth
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Validate `size` and round it up to the granule
    fn target(&self, size: usize) -> Result<usize, AllocError> {
        if size == 0 || size > self.config.max_request {
            return cold(|| Err(AllocError::InvalidSize { size }));
        }
        align8(size).ok_or(AllocError::InvalidSize { size })
    }

    /// Align the initial break, once
    fn initialize(&mut self) -> Result<(), AllocError> {
        if self.initialized {
            return Ok(());
        }
        let brk = self.growth.sbrk(0)?;
        let misalignment = brk.as_ptr() as usize % ALIGN;
        if misalignment != 0 {
            self.growth.sbrk((ALIGN - misalignment) as isize)?;
        }
        putln!("initialized, break at ", brk.as_ptr() as usize + (ALIGN - misalignment) % ALIGN);
        self.initialized = true;
        Ok(())
    }

    /// Allocate at least `size` bytes, 8-byte aligned. The granted size is
    /// `size` rounded up to a multiple of 8, possibly more if a free block was
    /// reused whole.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let target = self.target(size)?;
        self.initialize()?;
        putln!("allocate(", size, ") -> target ", target);

        // SAFETY: Every link reachable from the arena points at a live header
        //         that the arena owns.
        unsafe {
            if let Some(block) = self.best_fit(target) {
                self.free_remove(block);
                self.mark_occupied(block);
                self.split(block, target);
                return Ok(Block::payload(block));
            }

            if size.saturating_add(HEADER_SIZE) >= self.config.mmap_threshold {
                return self.map_block(target);
            }

            if let Some(tail) = self.tail.filter(|&tail| Block::is_free(Some(tail))) {
                if let Some(payload) = self.grow_free_wilderness(tail, target)? {
                    return Ok(payload);
                }
            }

            self.append_block(target)
        }
    }

    /// Allocate room for `count` values of `size` bytes and zero the whole
    /// granted block, not just `count * size` of it, so nothing a previous
    /// owner of a reused block wrote can leak out.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        let total = count
            .checked_mul(size)
            .ok_or(AllocError::SizeOverflow { count, size })?;
        let payload = self.allocate(total)?;
        // SAFETY: `payload` was just granted, so its header is live and the
        //         whole payload is ours to write.
        unsafe {
            let granted = (*Block::from_payload(payload).as_ptr()).size;
            payload.as_ptr().write_bytes(0, granted);
        }
        Ok(payload)
    }

    /// Release a block. Null and already-free blocks are ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a payload pointer this heap handed out whose
    /// block has not since been absorbed into a neighbour (releasing it once
    /// is fine, releasing it twice is ignored only while its header survives).
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(payload) = NonNull::new(ptr) else {
            return;
        };
        let mut block = Block::from_payload(payload);
        let b = block.as_ptr();
        if (*b).state == BlockState::Free {
            putln!("release(", ptr, ") ignored, already free");
            return;
        }
        putln!("release(", ptr, "), size ", (*b).size);

        if (*b).mapped {
            self.unmap_block(block);
            return;
        }

        self.mark_free(block);
        if let Some(next) = (*b).next.filter(|&n| Block::is_free(Some(n))) {
            self.free_remove(next);
            self.absorb_next(block);
        }
        if let Some(prev) = (*b).prev.filter(|&p| Block::is_free(Some(p))) {
            self.free_remove(prev);
            self.absorb_next(prev);
            block = prev;
        }
        self.free_insert(block);
    }

    /// Resize a block to hold `size` bytes, preserving the first
    /// `min(old, size)` of them. Null `ptr` is a plain `allocate()`. On error
    /// the original block and its bytes are exactly as they were.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live (occupied) payload pointer from this heap.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize) -> Result<NonNull<u8>, AllocError> {
        let target = self.target(size)?;
        let Some(payload) = NonNull::new(ptr) else {
            return self.allocate(size);
        };
        let block = Block::from_payload(payload);
        let old = (*block.as_ptr()).size;
        putln!("reallocate(", ptr, ", ", size, "), old ", old);
        if old == target {
            return Ok(payload);
        }

        if (*block.as_ptr()).mapped {
            let fresh = self.map_block(target)?;
            ptr::copy_nonoverlapping(payload.as_ptr(), fresh.as_ptr(), old.min(target));
            self.release(ptr);
            return Ok(fresh);
        }

        let mut plan = self.plan_resize(block, target);
        putln!("resize plan ", plan.grow(), " bytes of growth");
        if plan.grow() > 0 {
            // Grow first: if the OS says no, nothing has been touched yet.
            let tail = self.tail.expect("a plan that grows the break has a wilderness");
            if let Extension::Detached = self.extend_at(Block::end(tail), plan.grow())? {
                plan = Resize::Relocate;
            }
        }

        let merged = match plan {
            Resize::InPlace => block,
            Resize::Extend { grow } => {
                self.grow_occupied(block, grow);
                block
            }
            Resize::MergeDown { grow } => {
                let prev = self.merge_down(block);
                self.grow_occupied(prev, grow);
                prev
            }
            Resize::MergeUp => {
                self.merge_up(block);
                block
            }
            Resize::MergeBoth => {
                self.merge_up(block);
                self.merge_down(block)
            }
            Resize::MergeUpExtend { down, grow } => {
                self.merge_up(block);
                let merged = if down { self.merge_down(block) } else { block };
                self.grow_occupied(merged, grow);
                merged
            }
            Resize::Relocate => {
                let fresh = self.allocate(size)?;
                ptr::copy_nonoverlapping(payload.as_ptr(), fresh.as_ptr(), old.min(target));
                self.release(ptr);
                return Ok(fresh);
            }
        };
        debug_assert!((*merged.as_ptr()).size >= target);

        // A downward merge moves the payload start; the regions may overlap.
        let destination = Block::payload(merged);
        if destination != payload {
            ptr::copy(payload.as_ptr(), destination.as_ptr(), old.min(target));
        }
        self.split(merged, target);
        Ok(destination)
    }

    /// Bytes actually granted to the block behind `ptr`
    ///
    /// # Safety
    ///
    /// `ptr` must be a live payload pointer from this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        (*Block::from_payload(ptr).as_ptr()).size
    }

    unsafe fn plan_resize(&self, block: NonNull<Block>, target: usize) -> Resize {
        let b = block.as_ptr();
        let old = (*b).size;
        if old >= target {
            return Resize::InPlace;
        }

        let is_wilderness = self.tail == Some(block);
        let prev = (*b).prev.filter(|&p| Block::is_free(Some(p)));
        let next = (*b).next.filter(|&n| Block::is_free(Some(n)));
        let prev_size = prev.map_or(0, |p| (*p.as_ptr()).size + HEADER_SIZE);
        let next_size = next.map_or(0, |n| (*n.as_ptr()).size + HEADER_SIZE);

        if prev.is_some() {
            let merged = old + prev_size;
            if merged >= target {
                return Resize::MergeDown { grow: 0 };
            }
            if is_wilderness {
                return Resize::MergeDown {
                    grow: target - merged,
                };
            }
        }
        if is_wilderness {
            return Resize::Extend { grow: target - old };
        }
        if let Some(next) = next {
            if old + next_size >= target {
                return Resize::MergeUp;
            }
            if prev.is_some() && old + prev_size + next_size >= target {
                return Resize::MergeBoth;
            }
            if self.tail == Some(next) {
                return Resize::MergeUpExtend {
                    down: prev.is_some(),
                    grow: target - (old + prev_size + next_size),
                };
            }
        }
        Resize::Relocate
    }

    /// Fold the occupied `block` into its free predecessor, which becomes the
    /// occupied block. Payload bytes are not moved.
    unsafe fn merge_down(&mut self, block: NonNull<Block>) -> NonNull<Block> {
        let prev = (*block.as_ptr()).prev.expect("merge_down needs a predecessor");
        self.free_remove(prev);
        self.mark_occupied(prev);
        self.absorb_next(prev);
        prev
    }

    /// Fold the free successor into the occupied `block`
    unsafe fn merge_up(&mut self, block: NonNull<Block>) {
        let next = (*block.as_ptr()).next.expect("merge_up needs a successor");
        self.free_remove(next);
        self.absorb_next(block);
    }

    /// Account for `grow` bytes the break has already been moved by
    unsafe fn grow_occupied(&mut self, block: NonNull<Block>, grow: usize) {
        (*block.as_ptr()).size += grow;
        self.allocated_bytes += grow;
    }

    /// Move the break by `delta` bytes, provided it currently sits at `end`
    unsafe fn extend_at(&mut self, end: *mut u8, delta: usize) -> Result<Extension, AllocError> {
        let delta = isize::try_from(delta).map_err(|_| AllocError::OutOfMemory)?;
        let old = self.growth.sbrk(delta)?;
        if old.as_ptr() == end {
            return Ok(Extension::Extended);
        }
        cold(|| {
            putln!("break moved under us: expected ", end, ", found ", old);
            // Nobody can have moved it again since, so this always lands.
            let _ = self.growth.sbrk(-delta);
            Ok(Extension::Detached)
        })
    }

    /// The free wilderness is too small for `target`: grow it in place
    unsafe fn grow_free_wilderness(
        &mut self,
        tail: NonNull<Block>,
        target: usize,
    ) -> Result<Option<NonNull<u8>>, AllocError> {
        let diff = target - (*tail.as_ptr()).size;
        match self.extend_at(Block::end(tail), diff)? {
            Extension::Extended => {
                self.free_remove(tail);
                self.mark_occupied(tail);
                self.grow_occupied(tail, diff);
                Ok(Some(Block::payload(tail)))
            }
            Extension::Detached => Ok(None),
        }
    }

    /// Grow the break by a whole new block and make it the wilderness. If the
    /// break has been moved by somebody else the new block could not be
    /// merged with its neighbour safely, so the request is mapped instead.
    ///
    /// The break never comes back to the wilderness after that, so from then
    /// on every request the free index cannot serve gets its own mapping.
    unsafe fn append_block(&mut self, target: usize) -> Result<NonNull<u8>, AllocError> {
        let total = target + HEADER_SIZE;
        let delta = isize::try_from(total).map_err(|_| AllocError::OutOfMemory)?;
        let at = self.growth.sbrk(delta)?;

        let contiguous = match self.tail {
            Some(tail) => Block::end(tail) == at.as_ptr(),
            None => true,
        };
        if !contiguous || !aligned_to(at.as_ptr(), ALIGN) {
            return cold(|| {
                let _ = self.growth.sbrk(-delta);
                self.map_block(target)
            });
        }

        let block = Block::write(at, target, BlockState::Occupied, false);
        self.address_append(block);
        self.allocated_blocks += 1;
        self.allocated_bytes += target;
        Ok(Block::payload(block))
    }

    /// Give `target` bytes a standalone region of exactly `target + header`
    fn map_block(&mut self, target: usize) -> Result<NonNull<u8>, AllocError> {
        let len = target
            .checked_add(HEADER_SIZE)
            .ok_or(AllocError::OutOfMemory)?;
        let at = self.growth.map(len)?;
        debug_assert!(aligned_to(at.as_ptr(), ALIGN));
        // SAFETY: `map()` gave us `len >= HEADER_SIZE` fresh, aligned bytes.
        unsafe {
            let block = Block::write(at, target, BlockState::Occupied, true);
            self.mapped_push(block);
            self.allocated_blocks += 1;
            self.allocated_bytes += target;
            Ok(Block::payload(block))
        }
    }

    unsafe fn unmap_block(&mut self, block: NonNull<Block>) {
        let size = (*block.as_ptr()).size;
        self.mapped_unlink(block);
        self.allocated_blocks -= 1;
        self.allocated_bytes -= size;
        if self.growth.unmap(block.cast(), size + HEADER_SIZE).is_err() {
            // We mapped exactly this many bytes here, so the header is garbage.
            fatal(c"wilderness: munmap() refused a region this heap mapped");
        }
    }

    pub const fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    pub const fn free_bytes(&self) -> usize {
        self.free_bytes
    }

    pub const fn allocated_blocks(&self) -> usize {
        self.allocated_blocks
    }

    pub const fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    pub const fn metadata_bytes(&self) -> usize {
        self.allocated_blocks * HEADER_SIZE
    }

    pub const fn header_size(&self) -> usize {
        HEADER_SIZE
    }

    pub const fn stats(&self) -> HeapStats {
        HeapStats {
            free_blocks: self.free_blocks,
            free_bytes: self.free_bytes,
            allocated_blocks: self.allocated_blocks,
            allocated_bytes: self.allocated_bytes,
            metadata_bytes: self.metadata_bytes(),
            header_size: HEADER_SIZE,
        }
    }

    /// Whether `ptr` is the payload of a block in the break region
    pub fn owns_in_break(&self, ptr: *const u8) -> bool {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            return false;
        };
        // SAFETY: tail is a live header.
        let end = unsafe { Block::end(tail) } as *const u8;
        ptr >= head.as_ptr() as *const u8 && ptr < end
    }
}

impl<G> Drop for Heap<G>
where
    G: Growth,
{
    fn drop(&mut self) {
        // Break memory belongs to `G`; mapped regions are ours to return.
        let mut cursor = self.mapped_head.take();
        while let Some(block) = cursor {
            // SAFETY: The registry only holds live mapped headers.
            unsafe {
                cursor = (*block.as_ptr()).next;
                let len = (*block.as_ptr()).size + HEADER_SIZE;
                let _ = self.growth.unmap(block.cast(), len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::mem::ReservedBreak;

    fn heap() -> Heap<ReservedBreak> {
        Heap::new(ReservedBreak::new(1 << 24).unwrap())
    }

    unsafe fn size_of_block(ptr: NonNull<u8>) -> usize {
        (*Block::from_payload(ptr).as_ptr()).size
    }

    #[test]
    fn rejects_zero_and_oversized_requests() {
        let mut heap = heap();
        assert_eq!(heap.allocate(0), Err(AllocError::InvalidSize { size: 0 }));
        assert_eq!(
            heap.allocate(100_000_001),
            Err(AllocError::InvalidSize { size: 100_000_001 })
        );
        assert_eq!(heap.stats(), HeapStats { header_size: HEADER_SIZE, ..Default::default() });
        assert_eq!(heap.growth().brk(), heap.growth().base());
    }

    #[test]
    fn sizes_round_up_to_eight() {
        let mut heap = heap();
        let p = heap.allocate(13).unwrap();
        assert!(aligned_to(p.as_ptr(), ALIGN));
        assert_eq!(unsafe { size_of_block(p) }, 16);
        assert_eq!(heap.allocated_bytes(), 16);
        assert_eq!(heap.growth().brk() as usize - heap.growth().base() as usize, 16 + HEADER_SIZE);
    }

    #[test]
    fn free_wilderness_grows_in_place() {
        let mut heap = heap();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        unsafe { heap.release(b.as_ptr()) };
        assert_eq!(heap.free_blocks(), 1);

        let c = heap.allocate(256).unwrap();
        assert_eq!(c, b);
        assert_eq!(heap.free_blocks(), 0);
        assert_eq!(heap.free_bytes(), 0);
        assert_eq!(heap.allocated_blocks(), 2);
        assert_eq!(heap.allocated_bytes(), 64 + 256);
        unsafe { heap.release(a.as_ptr()) };
    }

    #[test]
    fn release_merges_with_both_neighbours() {
        let mut heap = heap();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        let c = heap.allocate(64).unwrap();
        let _guard = heap.allocate(64).unwrap();
        unsafe {
            heap.release(a.as_ptr());
            heap.release(c.as_ptr());
            assert_eq!(heap.free_blocks(), 2);
            heap.release(b.as_ptr());
        }
        assert_eq!(heap.free_blocks(), 1);
        assert_eq!(heap.free_bytes(), 3 * 64 + 2 * HEADER_SIZE);
        assert_eq!(heap.allocated_blocks(), 2);
        assert_eq!(heap.free_head, Some(unsafe { Block::from_payload(a) }));
    }

    #[test]
    fn double_release_is_ignored() {
        let mut heap = heap();
        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        unsafe {
            heap.release(a.as_ptr());
            let before = heap.stats();
            heap.release(a.as_ptr());
            heap.release(ptr::null_mut());
            assert_eq!(heap.stats(), before);
        }
    }

    #[test]
    fn reuse_splits_large_free_blocks() {
        let mut heap = heap();
        let big = heap.allocate(1024).unwrap();
        let _guard = heap.allocate(8).unwrap();
        unsafe { heap.release(big.as_ptr()) };

        let small = heap.allocate(100).unwrap();
        assert_eq!(small, big);
        unsafe { assert_eq!(size_of_block(small), 104) };
        assert_eq!(heap.free_blocks(), 1);
        assert_eq!(heap.free_bytes(), 1024 - 104 - HEADER_SIZE);
        assert_eq!(heap.allocated_blocks(), 3);
    }

    #[test]
    fn small_leftover_is_handed_over_whole() {
        let mut heap = heap();
        let big = heap.allocate(200).unwrap();
        let _guard = heap.allocate(8).unwrap();
        unsafe { heap.release(big.as_ptr()) };

        // 200 - 80 = 120 < 128 + header
        let p = heap.allocate(80).unwrap();
        assert_eq!(p, big);
        unsafe { assert_eq!(size_of_block(p), 200) };
        assert_eq!(heap.free_blocks(), 0);
    }

    #[test]
    fn best_fit_prefers_smallest_then_lowest() {
        let mut heap = heap();
        let large = heap.allocate(512).unwrap();
        let _g1 = heap.allocate(8).unwrap();
        let small_a = heap.allocate(128).unwrap();
        let _g2 = heap.allocate(8).unwrap();
        let small_b = heap.allocate(128).unwrap();
        let _g3 = heap.allocate(8).unwrap();
        unsafe {
            heap.release(small_b.as_ptr());
            heap.release(large.as_ptr());
            heap.release(small_a.as_ptr());
        }
        assert_eq!(heap.allocate(120).unwrap(), small_a);
        assert_eq!(heap.allocate(120).unwrap(), small_b);
        assert_eq!(heap.allocate(120).unwrap(), large);
    }

    #[test]
    fn shrinking_reallocate_splits_and_coalesces_the_remainder() {
        let mut heap = heap();
        let a = heap.allocate(1024).unwrap();
        let b = heap.allocate(512).unwrap();
        let _guard = heap.allocate(8).unwrap();
        unsafe {
            heap.release(b.as_ptr());
            let p = heap.reallocate(a.as_ptr(), 64).unwrap();
            assert_eq!(p, a);
            assert_eq!(size_of_block(p), 64);
        }
        assert_eq!(heap.free_blocks(), 1);
        assert_eq!(heap.free_bytes(), (1024 - 64 - HEADER_SIZE) + HEADER_SIZE + 512);
    }

    #[test]
    fn resize_plans_follow_case_order() {
        let mut heap = heap();
        let a = heap.allocate(256).unwrap();
        let b = heap.allocate(256).unwrap();
        let c = heap.allocate(256).unwrap();
        let d = heap.allocate(256).unwrap();
        unsafe {
            let block = |p| Block::from_payload(p);
            assert_eq!(heap.plan_resize(block(b), 200), Resize::InPlace);
            assert_eq!(heap.plan_resize(block(d), 1000), Resize::Extend { grow: 744 });
            assert_eq!(heap.plan_resize(block(b), 400), Resize::Relocate);

            heap.release(a.as_ptr());
            assert_eq!(heap.plan_resize(block(b), 400), Resize::MergeDown { grow: 0 });
            assert_eq!(
                heap.plan_resize(block(b), 1000),
                Resize::Relocate,
            );

            heap.release(c.as_ptr());
            // a and c free around b
            assert_eq!(heap.plan_resize(block(b), 500), Resize::MergeDown { grow: 0 });
            assert_eq!(heap.plan_resize(block(b), 800), Resize::MergeBoth);
            assert_eq!(heap.plan_resize(block(b), 900), Resize::Relocate);

            heap.release(d.as_ptr());
            // c and d merged into a free wilderness after b
            assert_eq!(
                heap.plan_resize(block(b), 2000),
                Resize::MergeUpExtend {
                    down: true,
                    grow: 2000 - (256 + 256 + HEADER_SIZE + 512 + 2 * HEADER_SIZE),
                }
            );
        }
    }

    #[test]
    fn failed_growth_leaves_reallocate_untouched() {
        let mut heap = Heap::new(ReservedBreak::new(4096).unwrap().with_map_budget(0));
        let a = heap.allocate(64).unwrap();
        unsafe {
            a.as_ptr().write_bytes(0x5a, 64);
            let before = heap.stats();
            let past_capacity = heap.growth().capacity();
            assert_eq!(heap.reallocate(a.as_ptr(), past_capacity), Err(AllocError::OutOfMemory));
            assert_eq!(heap.stats(), before);
            assert_eq!(size_of_block(a), 64);
            assert!(std::slice::from_raw_parts(a.as_ptr(), 64).iter().all(|&x| x == 0x5a));
        }
    }
}
