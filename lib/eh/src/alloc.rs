//! Memory for in-flight exceptions.
//!
//! Every thrown exception costs exactly one [`ExceptionAllocator::allocate`]
//! call, made by the throwing thread, and exactly one
//! [`ExceptionAllocator::deallocate`] call, made by the cleanup callback once
//! the exception has been handled. Nothing else in this crate touches the
//! heap on the exception path.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A source of memory for exception records.
///
/// # Safety
///
/// `allocate` must return memory that fits `layout` (size and alignment) and
/// stays valid until it is handed back to `deallocate` with the same layout.
/// Both methods may be called from any thread, and `deallocate` runs from
/// inside the unwinder, so neither may unwind.
pub unsafe trait ExceptionAllocator: Sync {
    /// Allocates a block for `layout`, or returns `None` when out of memory.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block obtained from `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `self.allocate(layout)` and must not be used
    /// afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Allocates through the process-wide Rust global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

/// The allocator used by [`throw`](crate::throw()).
pub static SYSTEM: SystemAllocator = SystemAllocator;

unsafe impl ExceptionAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert_ne!(layout.size(), 0);
        // SAFETY: every exception record has a non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// A snapshot of the counters kept by a [`CountingAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful `allocate` calls.
    pub allocations: usize,
    /// `deallocate` calls.
    pub deallocations: usize,
    /// Bytes handed out over the allocator's lifetime.
    pub bytes_allocated: usize,
    /// Bytes handed out and not yet returned.
    pub bytes_live: usize,
}

impl AllocStats {
    /// Records that are allocated and not yet cleaned up.
    pub fn live(&self) -> usize {
        self.allocations.saturating_sub(self.deallocations)
    }
}

/// Wraps another allocator and counts every call that goes through it.
///
/// Meant to be placed in a `static` and passed to
/// [`throw_in`](crate::throw_in).
#[derive(Debug)]
pub struct CountingAllocator<A = SystemAllocator> {
    inner: A,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    bytes_allocated: AtomicUsize,
    bytes_live: AtomicUsize,
}

impl CountingAllocator<SystemAllocator> {
    /// Counts allocations served by the global allocator.
    pub const fn system() -> Self {
        Self::new(SystemAllocator)
    }
}

impl<A> CountingAllocator<A> {
    /// Counts allocations served by `inner`.
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            bytes_allocated: AtomicUsize::new(0),
            bytes_live: AtomicUsize::new(0),
        }
    }

    /// Reads the counters.
    pub fn stats(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Acquire),
            deallocations: self.deallocations.load(Ordering::Acquire),
            bytes_allocated: self.bytes_allocated.load(Ordering::Acquire),
            bytes_live: self.bytes_live.load(Ordering::Acquire),
        }
    }
}

unsafe impl<A: ExceptionAllocator> ExceptionAllocator for CountingAllocator<A> {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let ptr = self.inner.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        self.bytes_allocated.fetch_add(layout.size(), Ordering::AcqRel);
        self.bytes_live.fetch_add(layout.size(), Ordering::AcqRel);
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.fetch_add(1, Ordering::AcqRel);
        self.bytes_live.fetch_sub(layout.size(), Ordering::AcqRel);
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
