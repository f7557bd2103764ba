//! Per-type operation tables.
//!
//! A table is plain `'static` data: a layout and a handful of function
//! pointers instantiated for one concrete type. Handles keep a reference to
//! the table of whatever they hold and never look at the concrete type again.

use core::alloc::Layout;
use core::any::{self, TypeId};

/// Operations every stored type supports.
pub struct VTable {
    pub(crate) layout: Layout,
    pub(crate) type_id: fn() -> TypeId,
    pub(crate) type_name: fn() -> &'static str,
    /// Runs the destructor of the value at the pointer.
    pub(crate) drop_in_place: unsafe fn(*mut u8),
    /// Moves the value at the first pointer into the uninitialized second
    /// pointer. The source must not be used or dropped afterwards.
    pub(crate) relocate: unsafe fn(*mut u8, *mut u8),
}

/// The table shape for copyable handles: [`VTable`] plus a clone entry.
pub struct CopyVTable {
    pub(crate) base: VTable,
    /// Clones the value at the first pointer into the uninitialized second
    /// pointer.
    pub(crate) clone_into: unsafe fn(*const u8, *mut u8),
}

/// Access to the operations shared by every table shape.
pub trait Table: sealed::Sealed + 'static {
    #[doc(hidden)]
    fn base(&self) -> &VTable;
}

impl Table for VTable {
    #[inline]
    fn base(&self) -> &VTable {
        self
    }
}

impl Table for CopyVTable {
    #[inline]
    fn base(&self) -> &VTable {
        &self.base
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::VTable {}
    impl Sealed for super::CopyVTable {}
}

impl VTable {
    pub(crate) const fn new<T: 'static>() -> VTable {
        VTable {
            layout: Layout::new::<T>(),
            type_id: TypeId::of::<T>,
            type_name: any::type_name::<T>,
            drop_in_place: drop_in_place::<T>,
            relocate: relocate::<T>,
        }
    }

    /// Size and alignment of the stored type.
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Identity of the stored type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Name of the stored type, for diagnostics only.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    #[inline]
    pub(crate) fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }
}

impl CopyVTable {
    pub(crate) const fn new<T: Clone + 'static>() -> CopyVTable {
        CopyVTable {
            base: VTable::new::<T>(),
            clone_into: clone_into::<T>,
        }
    }
}

/// # Safety
///
/// `ptr` must point to a live, aligned `T` that is not used afterwards.
unsafe fn drop_in_place<T>(ptr: *mut u8) {
    unsafe { ptr.cast::<T>().drop_in_place() }
}

/// # Safety
///
/// `src` must point to a live, aligned `T`; `dst` must be valid and aligned
/// for a `T` and must not overlap `src`.
unsafe fn relocate<T>(src: *mut u8, dst: *mut u8) {
    unsafe { dst.cast::<T>().write(src.cast::<T>().read()) }
}

/// # Safety
///
/// Same as [`relocate`], except `src` stays live.
unsafe fn clone_into<T: Clone>(src: *const u8, dst: *mut u8) {
    // `clone` may panic; nothing has been written to `dst` at that point.
    let value = unsafe { (*src.cast::<T>()).clone() };
    unsafe { dst.cast::<T>().write(value) }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use core::cell::Cell;
    use core::mem::MaybeUninit;

    use super::*;

    struct Counted(Rc<Cell<usize>>, u32);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_identity() {
        const U32: &VTable = &VTable::new::<u32>();
        const I32: &VTable = &VTable::new::<i32>();

        assert!(U32.is::<u32>());
        assert!(!U32.is::<i32>());
        assert_ne!(U32.type_id(), I32.type_id());
        assert_eq!(U32.type_name(), "u32");
        assert_eq!(U32.layout(), Layout::new::<u32>());
    }

    #[test]
    fn test_relocate_then_drop() {
        let drops = Rc::new(Cell::new(0));
        let table = VTable::new::<Counted>();

        let mut src = MaybeUninit::new(Counted(drops.clone(), 7));
        let mut dst = MaybeUninit::<Counted>::uninit();
        unsafe {
            (table.relocate)(src.as_mut_ptr().cast(), dst.as_mut_ptr().cast());
            assert_eq!(dst.assume_init_ref().1, 7);
            assert_eq!(drops.get(), 0);
            (table.drop_in_place)(dst.as_mut_ptr().cast());
        }
        assert_eq!(drops.get(), 1);
        assert_eq!(Rc::strong_count(&drops), 1);
    }

    #[test]
    fn test_clone_into() {
        let table = CopyVTable::new::<[u16; 3]>();
        let src = [1u16, 2, 3];
        let mut dst = MaybeUninit::<[u16; 3]>::uninit();
        unsafe {
            (table.clone_into)(core::ptr::from_ref(&src).cast(), dst.as_mut_ptr().cast());
            assert_eq!(dst.assume_init(), src);
        }
        assert!(table.base().is::<[u16; 3]>());
    }
}
