//! Allocation strategies for the heap fallback path.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::AllocError;
use crate::sptr;

/// Source of heap blocks for values that do not fit inline.
///
/// An [`SboPtr`](crate::SboPtr) only calls into its allocator when a value
/// has to live on the heap. Failures are returned to the caller as they are;
/// the handle never retries.
///
/// # Safety
///
/// * `allocate` must return a block that is valid for reads and writes of
///   `layout.size()` bytes and aligned to `layout.align()`, and that stays
///   valid until passed to `deallocate`.
/// * Every clone of an allocator must be able to deallocate blocks produced by
///   any other clone, since handles hand their blocks over on moves.
pub unsafe trait Allocator {
    /// Whether this allocator can ever hand out memory.
    ///
    /// When `false`, emplacing a value that does not fit inline is rejected at
    /// compile time.
    const HEAP: bool = true;

    /// Requests a block for `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator (or a clone of it),
    /// called with the same `layout`, and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global memory allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Global;

unsafe impl Allocator for Global {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(sptr::dangling(layout));
        }

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { ::alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError { layout })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: the caller guarantees `ptr` came from `allocate` with `layout`.
            unsafe { ::alloc::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

/// An allocator that never allocates.
///
/// Handles using `NoHeap` keep every value inline; emplacing a value that does
/// not fit is a compile error.
///
/// ```compile_fail
/// use sboptr::InlineSboPtr;
/// use sboptr::space::S1;
///
/// let mut ptr = InlineSboPtr::<S1>::new_in(sboptr::NoHeap);
/// ptr.emplace([0usize; 4]);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoHeap;

unsafe impl Allocator for NoHeap {
    const HEAP: bool = false;

    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError { layout })
    }

    #[inline]
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("NoHeap never hands out blocks");
    }
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    const HEAP: bool = A::HEAP;

    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}
