use std::{
    alloc::{GlobalAlloc, Layout},
    cell::UnsafeCell,
    hint,
    ptr::{self, NonNull},
    sync::atomic::{AtomicBool, Ordering},
};

use super::{
    error::AllocError,
    heap::{Heap, ALIGN},
    stats::HeapStats,
};
use crate::os::mem::ProgramBreak;

/// The process-wide arena, over the real program break. Install it with
///
/// ```no_run
/// #[global_allocator]
/// static GLOBAL: &wilderness::GlobalHeap = &wilderness::WILDERNESS;
///
/// fn main() {}
/// ```
///
/// or reach it from C through [`crate::externc`].
///
/// Payloads are only 8-byte aligned. Any [`Layout`] asking for more gets null,
/// which under `#[global_allocator]` means `handle_alloc_error` aborts on the
/// first `u128` or `#[repr(align(16))]` allocation on targets that align
/// those to 16.
// SAFETY: This is the only `ProgramBreak` the crate ever constructs.
pub static WILDERNESS: GlobalHeap = unsafe { GlobalHeap::new(ProgramBreak::new()) };

/// A [`Heap`] that can sit in a `static`.
///
/// The heap itself is single threaded. Entry is serialised by a spin flag so
/// that an accidental second caller waits instead of corrupting the lists;
/// there is no fairness and no reentrancy (allocating from inside the heap
/// would spin forever).
pub struct GlobalHeap {
    heap: UnsafeCell<Heap<ProgramBreak>>,
    busy: SpinFlag,
}

/// A bare test-and-set lock
struct SpinFlag(AtomicBool);

/// Holds a [`SpinFlag`] until dropped, unwinding included
struct SpinGuard<'a>(&'a AtomicBool);

impl SpinFlag {
    const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    fn lock(&self) -> SpinGuard<'_> {
        while self
            .0
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            hint::spin_loop();
        }
        SpinGuard(&self.0)
    }
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// SAFETY: All access to `heap` goes through `with()`, which holds `busy`.
unsafe impl Sync for GlobalHeap {}

impl GlobalHeap {
    /// # Safety
    ///
    /// Same as [`ProgramBreak::new()`]: at most one of these may exist.
    pub const unsafe fn new(growth: ProgramBreak) -> Self {
        Self {
            heap: UnsafeCell::new(Heap::new(growth)),
            busy: SpinFlag::new(),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Heap<ProgramBreak>) -> R) -> R {
        let _guard = self.busy.lock();
        // SAFETY: We hold `busy`, so this is the only live reference. A panic
        //         in `f` releases it on the way out.
        f(unsafe { &mut *self.heap.get() })
    }

    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.with(|heap| heap.allocate(size))
    }

    pub fn allocate_zeroed(&self, count: usize, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.with(|heap| heap.allocate_zeroed(count, size))
    }

    /// # Safety
    ///
    /// See [`Heap::release()`].
    pub unsafe fn release(&self, ptr: *mut u8) {
        self.with(|heap| heap.release(ptr))
    }

    /// # Safety
    ///
    /// See [`Heap::reallocate()`].
    pub unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.with(|heap| heap.reallocate(ptr, size))
    }

    pub fn stats(&self) -> HeapStats {
        self.with(|heap| heap.stats())
    }
}

fn into_raw(result: Result<NonNull<u8>, AllocError>) -> *mut u8 {
    result.map_or(ptr::null_mut(), NonNull::as_ptr)
}

unsafe impl GlobalAlloc for GlobalHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        into_raw(self.allocate(layout.size()))
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        into_raw(self.allocate_zeroed(1, layout.size()))
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _: Layout) {
        // SAFETY: The caller gives us a pointer we handed out.
        unsafe { self.release(ptr) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGN {
            return ptr::null_mut();
        }
        // SAFETY: Identical contract to caller, which is described in
        //         `GlobalAlloc` docs.
        into_raw(unsafe { self.reallocate(ptr, new_size) })
    }
}

unsafe impl GlobalAlloc for &GlobalHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        (**self).alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        (**self).alloc_zeroed(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        (**self).dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        (**self).realloc(ptr, layout, new_size)
    }
}
