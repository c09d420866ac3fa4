//! The header that prefixes every block's payload.
//!
//! ```plaintext
//! +-----------------+ <- header (8-byte aligned)
//! | Block           | HEADER_SIZE bytes
//! +-----------------+ <- payload, what the caller gets
//! | payload         | size bytes (multiple of 8)
//! +-----------------+ <- next block's header, or the break
//! ```
//!
//! Legal combinations of `state` and `mapped`:
//!
//! | state    | mapped | lives in                                   |
//! |:--------:|:------:|:-------------------------------------------|
//! | Occupied | false  | address-order list                         |
//! | Free     | false  | address-order list and free-size index     |
//! | Occupied | true   | mapped registry                            |
//!
//! A mapped block is never `Free`: releasing it hands the region straight
//! back to the OS.

use std::{mem, ptr::NonNull};

use serde::{Deserialize, Serialize};

/// A non-owning location marker. The heap owns the memory behind it.
pub(crate) type Link = Option<NonNull<Block>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockState {
    Free,
    Occupied,
}

#[repr(C)]
pub(crate) struct Block {
    /// Payload bytes, excluding this header
    pub(crate) size: usize,
    pub(crate) state: BlockState,
    pub(crate) mapped: bool,
    /// Address-order neighbours, or mapped-registry neighbours when `mapped`
    pub(crate) prev: Link,
    pub(crate) next: Link,
    /// Free-size index neighbours, only meaningful while free
    pub(crate) free_prev: Link,
    pub(crate) free_next: Link,
}

pub const HEADER_SIZE: usize = mem::size_of::<Block>();

const _: () = assert!(HEADER_SIZE % 8 == 0);
const _: () = assert!(mem::align_of::<Block>() <= 8);

impl Block {
    /// Write a fresh, unlinked header at `at`
    ///
    /// # Safety
    ///
    /// `at` must be 8-byte aligned and valid for writes of `HEADER_SIZE`
    /// bytes that nobody else is using.
    pub(crate) unsafe fn write(
        at: NonNull<u8>,
        size: usize,
        state: BlockState,
        mapped: bool,
    ) -> NonNull<Block> {
        let block = at.cast::<Block>();
        block.as_ptr().write(Block {
            size,
            state,
            mapped,
            prev: None,
            next: None,
            free_prev: None,
            free_next: None,
        });
        block
    }

    /// # Safety
    ///
    /// `block` must point at a live header.
    pub(crate) unsafe fn payload(block: NonNull<Block>) -> NonNull<u8> {
        NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(HEADER_SIZE))
    }

    /// # Safety
    ///
    /// `payload` must have been returned by [`Block::payload()`] on a header
    /// that is still live.
    pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> NonNull<Block> {
        NonNull::new_unchecked(payload.as_ptr().sub(HEADER_SIZE).cast::<Block>())
    }

    /// One past the last payload byte
    ///
    /// # Safety
    ///
    /// `block` must point at a live header.
    pub(crate) unsafe fn end(block: NonNull<Block>) -> *mut u8 {
        Block::payload(block).as_ptr().add((*block.as_ptr()).size)
    }

    /// Whether `block` is a live break-region block with state `Free`
    ///
    /// # Safety
    ///
    /// `block`, if any, must point at a live header.
    pub(crate) unsafe fn is_free(block: Link) -> bool {
        matches!(block, Some(b) if (*b.as_ptr()).state == BlockState::Free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_payload() {
        let mut buf = [0u64; 16];
        let at = NonNull::new(buf.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe {
            let block = Block::write(at, 64, BlockState::Occupied, false);
            let payload = Block::payload(block);
            assert_eq!(payload.as_ptr() as usize - at.as_ptr() as usize, HEADER_SIZE);
            assert_eq!(Block::from_payload(payload), block);
            assert!(!Block::is_free(Some(block)));
            assert!(!Block::is_free(None));
        }
    }
}
