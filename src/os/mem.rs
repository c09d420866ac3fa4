//! Growth primitives: the only places real memory enters or leaves the heap.

use std::ptr::{self, NonNull};

use libc::{
    intptr_t, mmap, munmap, sbrk, MAP_ANONYMOUS, MAP_FAILED, MAP_NORESERVE, MAP_PRIVATE,
    PROT_READ, PROT_WRITE,
};
use once_cell::sync::Lazy;

use crate::{
    alloc::error::AllocError,
    putln,
    util::{hint::cold, num::round_up},
};

pub static PAGE_SIZE: Lazy<usize> = Lazy::new(page_size::get);

/// Where a heap gets its memory from.
///
/// # Safety
///
/// - `sbrk()` must hand out one contiguous, append-only region: a successful
///   call with `delta > 0` returns the previous break `b`, and
///   `[b, b + delta)` is then readable, writable and owned by the heap until
///   the break is moved back below it.
/// - Regions from `map()` must be 8-byte aligned, readable and writable, and
///   disjoint from the break region and from every other live mapping.
pub unsafe trait Growth {
    /// Move the break by `delta` bytes, returning the previous break. Zero
    /// queries the break, negative hands memory back.
    fn sbrk(&mut self, delta: isize) -> Result<NonNull<u8>, AllocError>;

    /// Map a standalone anonymous region of at least `len` bytes
    fn map(&mut self, len: usize) -> Result<NonNull<u8>, AllocError>;

    /// # Safety
    ///
    /// `ptr` and `len` must be exactly what a previous `map()` returned and
    /// was asked for, and nothing may use the region afterwards.
    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) -> Result<(), AllocError>;
}

fn map_anonymous(len: usize, extra_flags: libc::c_int) -> Result<NonNull<u8>, AllocError> {
    if len == 0 {
        return Err(AllocError::InvalidSize { size: 0 });
    }
    // SAFETY: An anonymous private mapping at a kernel-chosen address cannot
    //         alias anything we already own.
    let ptr = unsafe {
        mmap(
            ptr::null_mut(),
            len,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS | extra_flags,
            -1,
            0,
        )
    };
    if ptr == MAP_FAILED {
        return cold(|| Err(AllocError::OutOfMemory));
    }
    putln!("mmap(", len, ") = ", ptr as usize);
    NonNull::new(ptr.cast::<u8>()).ok_or(AllocError::OutOfMemory)
}

/// # Safety
///
/// Same as [`Growth::unmap()`].
unsafe fn unmap_anonymous(ptr: NonNull<u8>, len: usize) -> Result<(), AllocError> {
    putln!("munmap(", ptr, ", ", len, ")");
    if munmap(ptr.as_ptr().cast(), len) == 0 {
        Ok(())
    } else {
        cold(|| Err(AllocError::OutOfMemory))
    }
}

/// The process's real program break, plus ordinary anonymous mappings.
pub struct ProgramBreak(());

impl ProgramBreak {
    /// # Safety
    ///
    /// Nothing else may move the program break for as long as a heap uses this
    /// (no second `ProgramBreak`, no `brk()`-based allocator running
    /// alongside). The heap notices a foreign move when it tries to grow in
    /// place and backs off, but blocks are never checked against a break that
    /// shrinks underneath them.
    pub const unsafe fn new() -> Self {
        Self(())
    }
}

unsafe impl Growth for ProgramBreak {
    fn sbrk(&mut self, delta: isize) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: The constructor's contract gives us the break.
        let old = unsafe { sbrk(delta as intptr_t) };
        if old as isize == -1 {
            return cold(|| Err(AllocError::OutOfMemory));
        }
        putln!("sbrk(", delta, ") = ", old as usize);
        NonNull::new(old.cast::<u8>()).ok_or(AllocError::OutOfMemory)
    }

    fn map(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        map_anonymous(len, 0)
    }

    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) -> Result<(), AllocError> {
        unmap_anonymous(ptr, len)
    }
}

/// A page-aligned read/write reservation that is unmapped on drop.
pub struct MmapRegion {
    ptr: NonNull<u8>,
    size: usize,
}

impl MmapRegion {
    /// `mmap()` a read/write, page-aligned arena of at least `size` bytes
    /// without reserving swap for it. At least one page is mapped.
    pub fn map_noreserve(size: usize) -> Result<MmapRegion, AllocError> {
        let size = round_up(size.max(1), *PAGE_SIZE).ok_or(AllocError::OutOfMemory)?;
        let ptr = map_anonymous(size, MAP_NORESERVE)?;
        Ok(MmapRegion { ptr, size })
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    pub const fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        // SAFETY:
        // - The address is page aligned because `mmap()` chose it
        // - We requested exactly `self.size` bytes and never changed it
        unsafe {
            munmap(self.ptr.as_ptr().cast(), self.size);
        }
    }
}

/// A private "program break" that bumps through one [`MmapRegion`], capping
/// out at the top of the reservation. Several of these can live in one
/// process, which is what makes heaps built on them independent of each
/// other (and of whatever allocator the process itself uses).
pub struct ReservedBreak {
    arena: MmapRegion,
    brk: usize,
    map_budget: Option<usize>,
    mapped: usize,
}

impl ReservedBreak {
    /// Reserve room for a break region of up to `capacity` bytes (rounded up
    /// to whole pages).
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            arena: MmapRegion::map_noreserve(capacity)?,
            brk: 0,
            map_budget: None,
            mapped: 0,
        })
    }

    /// Refuse `map()` once live mappings would exceed `bytes` in total
    pub fn with_map_budget(mut self, bytes: usize) -> Self {
        self.map_budget = Some(bytes);
        self
    }

    /// Lowest address the break can ever cover
    pub fn base(&self) -> *const u8 {
        self.arena.as_ptr()
    }

    /// Current break
    pub fn brk(&self) -> *const u8 {
        self.arena.as_ptr().wrapping_add(self.brk)
    }

    pub fn capacity(&self) -> usize {
        self.arena.size()
    }

    /// Whether `ptr` lies below the current break, inside the reservation
    pub fn contains<T>(&self, ptr: *const T) -> bool {
        let ptr = ptr as usize;
        ptr >= self.base() as usize && ptr < self.brk() as usize
    }
}

unsafe impl Growth for ReservedBreak {
    fn sbrk(&mut self, delta: isize) -> Result<NonNull<u8>, AllocError> {
        let new = self
            .brk
            .checked_add_signed(delta)
            .filter(|&new| new <= self.arena.size())
            .ok_or(AllocError::OutOfMemory)?;
        // SAFETY: `self.brk <= self.arena.size()`, so this is in bounds (or
        //         one past the end).
        let old = unsafe { NonNull::new_unchecked(self.arena.as_ptr().add(self.brk)) };
        self.brk = new;
        Ok(old)
    }

    fn map(&mut self, len: usize) -> Result<NonNull<u8>, AllocError> {
        let mapped = self
            .mapped
            .checked_add(len)
            .ok_or(AllocError::OutOfMemory)?;
        if self.map_budget.is_some_and(|budget| mapped > budget) {
            return Err(AllocError::OutOfMemory);
        }
        let ptr = map_anonymous(len, 0)?;
        self.mapped = mapped;
        Ok(ptr)
    }

    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) -> Result<(), AllocError> {
        unmap_anonymous(ptr, len)?;
        self.mapped -= len;
        Ok(())
    }
}
