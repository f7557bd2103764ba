//! Copy policies.
//!
//! The policy parameter of [`SboPtr`](crate::SboPtr) decides which table shape
//! a handle carries. With [`Movable`] the table has no clone entry and the
//! handle does not implement `Clone`; with [`Copyable`] only `Clone` types can
//! be stored and the handle can be deep-copied.
//!
//! ```compile_fail
//! use sboptr::UniqueSboPtr;
//!
//! let ptr: UniqueSboPtr = UniqueSboPtr::from_value(1u8);
//! let _copy: UniqueSboPtr = ptr.clone();
//! ```
//!
//! ```compile_fail
//! use sboptr::CloneSboPtr;
//!
//! struct NotClone;
//!
//! let mut ptr: CloneSboPtr = CloneSboPtr::new();
//! ptr.emplace(NotClone);
//! ```
//!
//! [`SendMovable`] and [`SendCopyable`] additionally require stored values to
//! be `Send`, which makes the handle itself `Send`:
//!
//! ```compile_fail
//! use std::rc::Rc;
//! use sboptr::SendSboPtr;
//!
//! let mut ptr: SendSboPtr = SendSboPtr::new();
//! ptr.emplace(Rc::new(1u8));
//! ```

use crate::vtable::{CopyVTable, Table, VTable};

/// Selects the table shape of a handle.
pub trait Policy: sealed::Sealed + 'static {
    /// The operations table stored by handles with this policy.
    type VTable: Table;
}

/// Move-only handles. Any `'static` type can be stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Movable;

/// Copyable handles. Stored types must implement `Clone`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Copyable;

/// Move-only handles that can be sent to another thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendMovable;

/// Copyable handles that can be sent to another thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendCopyable;

impl Policy for Movable {
    type VTable = VTable;
}

impl Policy for Copyable {
    type VTable = CopyVTable;
}

impl Policy for SendMovable {
    type VTable = VTable;
}

impl Policy for SendCopyable {
    type VTable = CopyVTable;
}

/// Policies whose handles implement `Clone`.
pub trait ClonePolicy: Policy<VTable = CopyVTable> {}

impl ClonePolicy for Copyable {}
impl ClonePolicy for SendCopyable {}

/// Policies that only admit `Send` values. Handles using them are `Send`
/// when their allocator is.
pub trait SendPolicy: Policy {}

impl SendPolicy for SendMovable {}
impl SendPolicy for SendCopyable {}

/// Types that can be stored under policy `P`.
///
/// Implemented for every `T: 'static` under [`Movable`], every
/// `T: Clone + 'static` under [`Copyable`], and the `Send` subsets of those
/// under [`SendMovable`] and [`SendCopyable`]. It cannot be implemented
/// outside this crate.
pub trait Erasable<P: Policy>: sealed::Erase<P> + 'static {
    #[doc(hidden)]
    const VTABLE: &'static P::VTable;
}

impl<T: 'static> Erasable<Movable> for T {
    const VTABLE: &'static VTable = &VTable::new::<T>();
}

impl<T: Clone + 'static> Erasable<Copyable> for T {
    const VTABLE: &'static CopyVTable = &CopyVTable::new::<T>();
}

impl<T: Send + 'static> Erasable<SendMovable> for T {
    const VTABLE: &'static VTable = &VTable::new::<T>();
}

impl<T: Clone + Send + 'static> Erasable<SendCopyable> for T {
    const VTABLE: &'static CopyVTable = &CopyVTable::new::<T>();
}

mod sealed {
    use super::{Copyable, Movable, SendCopyable, SendMovable};

    pub trait Sealed {}

    impl Sealed for Movable {}
    impl Sealed for Copyable {}
    impl Sealed for SendMovable {}
    impl Sealed for SendCopyable {}

    pub trait Erase<P> {}

    impl<T: 'static> Erase<Movable> for T {}
    impl<T: Clone + 'static> Erase<Copyable> for T {}
    impl<T: Send + 'static> Erase<SendMovable> for T {}
    impl<T: Clone + Send + 'static> Erase<SendCopyable> for T {}
}
