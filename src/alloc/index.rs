//! Maintenance of the three intrusive lists threaded through the headers:
//! the address-order list, the free-size index and the mapped registry.
//!
//! Every function here works on live headers owned by the heap, so all of
//! them are `unsafe` with that one contract. None of them touches the growth
//! primitive.

use std::ptr::NonNull;

use super::{
    block::{Block, BlockState, Link, HEADER_SIZE},
    heap::Heap,
};
use crate::{os::mem::Growth, putln};

/// Sort key of the free-size index: smallest first, lowest address on ties
unsafe fn key(block: NonNull<Block>) -> (usize, usize) {
    ((*block.as_ptr()).size, block.as_ptr() as usize)
}

impl<G> Heap<G>
where
    G: Growth,
{
    /// Best fit: the first free block, in (size, address) order, that holds
    /// `target` bytes
    pub(super) unsafe fn best_fit(&self, target: usize) -> Link {
        let mut cursor = self.free_head;
        while let Some(block) = cursor {
            if (*block.as_ptr()).size >= target {
                return Some(block);
            }
            cursor = (*block.as_ptr()).free_next;
        }
        None
    }

    /// Insert a free block that is not already in the free-size index
    pub(super) unsafe fn free_insert(&mut self, block: NonNull<Block>) {
        debug_assert_eq!((*block.as_ptr()).state, BlockState::Free);
        debug_assert!(!(*block.as_ptr()).mapped);

        let mut before = None;
        let mut after = self.free_head;
        while let Some(node) = after {
            if key(node) > key(block) {
                break;
            }
            before = after;
            after = (*node.as_ptr()).free_next;
        }

        (*block.as_ptr()).free_prev = before;
        (*block.as_ptr()).free_next = after;
        match before {
            Some(node) => (*node.as_ptr()).free_next = Some(block),
            None => self.free_head = Some(block),
        }
        match after {
            Some(node) => (*node.as_ptr()).free_prev = Some(block),
            None => self.free_tail = Some(block),
        }
    }

    pub(super) unsafe fn free_remove(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        match (*b).free_prev {
            Some(node) => (*node.as_ptr()).free_next = (*b).free_next,
            None => self.free_head = (*b).free_next,
        }
        match (*b).free_next {
            Some(node) => (*node.as_ptr()).free_prev = (*b).free_prev,
            None => self.free_tail = (*b).free_prev,
        }
        (*b).free_prev = None;
        (*b).free_next = None;
    }

    /// Link `block` as the new wilderness
    pub(super) unsafe fn address_append(&mut self, block: NonNull<Block>) {
        (*block.as_ptr()).prev = self.tail;
        (*block.as_ptr()).next = None;
        match self.tail {
            Some(tail) => (*tail.as_ptr()).next = Some(block),
            None => self.head = Some(block),
        }
        self.tail = Some(block);
    }

    pub(super) unsafe fn address_insert_after(&mut self, at: NonNull<Block>, block: NonNull<Block>) {
        let next = (*at.as_ptr()).next;
        (*block.as_ptr()).prev = Some(at);
        (*block.as_ptr()).next = next;
        (*at.as_ptr()).next = Some(block);
        match next {
            Some(next) => (*next.as_ptr()).prev = Some(block),
            None => self.tail = Some(block),
        }
    }

    unsafe fn address_unlink(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        match (*b).prev {
            Some(node) => (*node.as_ptr()).next = (*b).next,
            None => self.head = (*b).next,
        }
        match (*b).next {
            Some(node) => (*node.as_ptr()).prev = (*b).prev,
            None => self.tail = (*b).prev,
        }
    }

    pub(super) unsafe fn mapped_push(&mut self, block: NonNull<Block>) {
        (*block.as_ptr()).prev = None;
        (*block.as_ptr()).next = self.mapped_head;
        if let Some(head) = self.mapped_head {
            (*head.as_ptr()).prev = Some(block);
        }
        self.mapped_head = Some(block);
    }

    pub(super) unsafe fn mapped_unlink(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        match (*b).prev {
            Some(node) => (*node.as_ptr()).next = (*b).next,
            None => self.mapped_head = (*b).next,
        }
        if let Some(node) = (*b).next {
            (*node.as_ptr()).prev = (*b).prev;
        }
    }

    /// Occupied -> Free, counters only. The caller decides when the block
    /// enters the free-size index.
    pub(super) unsafe fn mark_free(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        (*b).state = BlockState::Free;
        self.free_blocks += 1;
        self.free_bytes += (*b).size;
    }

    /// Free -> Occupied, counters only. The block must already be out of the
    /// free-size index.
    pub(super) unsafe fn mark_occupied(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        (*b).state = BlockState::Occupied;
        self.free_blocks -= 1;
        self.free_bytes -= (*b).size;
    }

    /// Fold the address-order successor of `block` into it. The merged block
    /// keeps `block`'s state. Neither block may be in the free-size index.
    pub(super) unsafe fn absorb_next(&mut self, block: NonNull<Block>) {
        let b = block.as_ptr();
        let Some(next) = (*b).next else {
            return;
        };
        let n = next.as_ptr();
        debug_assert_eq!(Block::end(block), n.cast::<u8>());

        if (*n).state == BlockState::Free {
            self.free_blocks -= 1;
            self.free_bytes -= (*n).size;
        }
        let gained = (*n).size + HEADER_SIZE;
        self.address_unlink(next);
        self.allocated_blocks -= 1;
        self.allocated_bytes += HEADER_SIZE;

        (*b).size += gained;
        if (*b).state == BlockState::Free {
            self.free_bytes += gained;
        }
        putln!("merged ", next.as_ptr(), " into ", b, ", size ", (*b).size);
    }

    /// Shrink the occupied `block` to `target` bytes and carve the rest into a
    /// new free block, but only if the rest is big enough to be worth
    /// handing out again. The remainder absorbs a free successor.
    pub(super) unsafe fn split(&mut self, block: NonNull<Block>, target: usize) {
        let b = block.as_ptr();
        debug_assert_eq!((*b).state, BlockState::Occupied);
        debug_assert!(!(*b).mapped);

        let leftover = (*b).size - target;
        if leftover < self.config.split_threshold + HEADER_SIZE {
            return;
        }

        let at = NonNull::new_unchecked(Block::payload(block).as_ptr().add(target));
        let rest = Block::write(at, leftover - HEADER_SIZE, BlockState::Free, false);
        (*b).size = target;
        self.address_insert_after(block, rest);
        self.allocated_blocks += 1;
        self.allocated_bytes -= HEADER_SIZE;
        self.free_blocks += 1;
        self.free_bytes += leftover - HEADER_SIZE;
        putln!("split ", b, " at ", target, ", remainder ", leftover - HEADER_SIZE);

        if let Some(next) = (*rest.as_ptr()).next.filter(|&n| Block::is_free(Some(n))) {
            self.free_remove(next);
            self.absorb_next(rest);
        }
        self.free_insert(rest);
    }
}
