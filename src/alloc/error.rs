use thiserror::Error;

/// Why an allocation request could not be satisfied. Neither variant leaves
/// any trace in the heap: a failed call changes no block and no counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Zero bytes or more than the configured maximum
    #[error("invalid allocation size {size}")]
    InvalidSize { size: usize },
    /// A zeroed request whose `count * size` does not fit in `usize`
    #[error("{count} elements of {size} bytes overflow the address space")]
    SizeOverflow { count: usize, size: usize },
    /// The growth primitive refused to extend the break or map a region
    #[error("out of memory")]
    OutOfMemory,
}

/// A structural problem found by [`Heap::verify()`](super::heap::Heap::verify).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapCorruption {
    #[error("block at {address:#x} is not adjacent to its address-order successor")]
    Gap { address: usize },
    #[error("address-order links disagree at {address:#x}")]
    AddressLinks { address: usize },
    #[error("adjacent blocks at {address:#x} are both free")]
    Uncoalesced { address: usize },
    #[error("free-size index is out of (size, address) order at {address:#x}")]
    FreeIndexOrder { address: usize },
    #[error("block at {address:#x} is in the free-size index but not free")]
    FreeIndexState { address: usize },
    #[error("free-size index holds {indexed} blocks but {free} free blocks exist")]
    FreeIndexMembership { indexed: usize, free: usize },
    #[error("free-size index holds {indexed} bytes but free blocks hold {free}")]
    FreeIndexBytes { indexed: usize, free: usize },
    #[error("mapped registry entry at {address:#x} is not an occupied mapped block")]
    MappedState { address: usize },
    #[error("payload size {size} at {address:#x} is not a multiple of 8")]
    Misaligned { address: usize, size: usize },
    #[error("counter {counter} is {recorded}, heap walk says {actual}")]
    Counter {
        counter: &'static str,
        recorded: usize,
        actual: usize,
    },
}
