use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::error::Error;
use crate::vtable::Table;

/// Where a handle currently keeps its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// No value.
    Empty,
    /// The value lives in the buffer embedded in the handle.
    Inline,
    /// The value lives in a block obtained from the handle's allocator.
    Heap,
}

/// The tagged slot behind a handle.
///
/// `Storage` is plain data: it never drops or frees what it holds. The owning
/// handle does that through the table carried by the non-empty variants.
pub(crate) enum Storage<S, V: 'static> {
    Empty,
    Inline {
        space: MaybeUninit<S>,
        vtable: &'static V,
    },
    Heap {
        ptr: NonNull<u8>,
        vtable: &'static V,
    },
}

impl<S, V: Table> Storage<S, V> {
    #[inline]
    pub(crate) fn mode(&self) -> Mode {
        match self {
            Storage::Empty => Mode::Empty,
            Storage::Inline { .. } => Mode::Inline,
            Storage::Heap { .. } => Mode::Heap,
        }
    }

    #[inline]
    pub(crate) fn vtable(&self) -> Option<&'static V> {
        match *self {
            Storage::Empty => None,
            Storage::Inline { vtable, .. } | Storage::Heap { vtable, .. } => Some(vtable),
        }
    }

    /// Pointer to the held value, if any.
    #[inline]
    pub(crate) fn as_ptr(&self) -> Option<*const u8> {
        match self {
            Storage::Empty => None,
            Storage::Inline { space, .. } => Some(space.as_ptr().cast()),
            Storage::Heap { ptr, .. } => Some(ptr.as_ptr().cast_const()),
        }
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> Option<*mut u8> {
        match self {
            Storage::Empty => None,
            Storage::Inline { space, .. } => Some(space.as_mut_ptr().cast()),
            Storage::Heap { ptr, .. } => Some(ptr.as_ptr()),
        }
    }

    /// Verifies that the held value is a `T`.
    pub(crate) fn check<T: 'static>(&self) -> Result<(), Error> {
        let vtable = self.vtable().ok_or(Error::EmptyAccess)?.base();
        if vtable.is::<T>() {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: core::any::type_name::<T>(),
                found: vtable.type_name(),
            })
        }
    }

    /// Moves the contents of `src` into `self`, leaving `src` empty.
    ///
    /// Heap blocks change hands by pointer; inline values are relocated
    /// through their table. `self` must be empty.
    pub(crate) fn take_from(&mut self, src: &mut Storage<S, V>) {
        debug_assert!(matches!(self, Storage::Empty));

        match src {
            Storage::Empty => {}
            Storage::Heap { ptr, vtable } => {
                *self = Storage::Heap {
                    ptr: *ptr,
                    vtable: *vtable,
                };
            }
            Storage::Inline { space, vtable } => {
                let vtable = *vtable;
                let from = space.as_mut_ptr().cast::<u8>();
                let mut to = MaybeUninit::<S>::uninit();
                // SAFETY: `from` holds a live value described by `vtable`, and
                // `to` is a distinct buffer of the same space type, so it is
                // large and aligned enough for that value.
                unsafe { (vtable.base().relocate)(from, to.as_mut_ptr().cast()) };
                *self = Storage::Inline { space: to, vtable };
            }
        }
        *src = Storage::Empty;
    }
}
