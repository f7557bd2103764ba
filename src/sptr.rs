#[cfg(feature = "nightly")]
mod implementation {
    pub use core::ptr::without_provenance_mut;

    pub fn with_metadata_of<U: ?Sized>(ptr: *const u8, meta: *const U) -> *const U {
        ptr.with_metadata_of(meta)
    }

    pub fn with_metadata_of_mut<U: ?Sized>(ptr: *mut u8, meta: *const U) -> *mut U {
        ptr.with_metadata_of(meta)
    }
}

#[cfg(not(feature = "nightly"))]
#[allow(clippy::as_conversions)]
mod implementation {
    use core::ptr::addr_of_mut;

    pub fn without_provenance_mut<T>(addr: usize) -> *mut T {
        addr as _
    }

    pub fn with_metadata_of<U: ?Sized>(ptr: *const u8, meta: *const U) -> *const U {
        with_metadata_of_mut(ptr.cast_mut(), meta)
    }

    /// Replaces the address part of `meta` with `ptr`. Pointers to unsized
    /// types keep their address in the first word.
    pub fn with_metadata_of_mut<U: ?Sized>(ptr: *mut u8, mut meta: *const U) -> *mut U {
        let meta_ptr = addr_of_mut!(meta).cast::<usize>();
        unsafe { meta_ptr.write(ptr as usize) }
        meta.cast_mut()
    }
}

pub use implementation::*;

use core::alloc::Layout;
use core::ptr::NonNull;

/// A well-aligned, non-null pointer that owns no memory.
///
/// Used as the "block" for zero-sized heap requests.
pub fn dangling(layout: Layout) -> NonNull<u8> {
    // SAFETY: `Layout` guarantees a non-zero power-of-two alignment.
    unsafe { NonNull::new_unchecked(without_provenance_mut(layout.align())) }
}
