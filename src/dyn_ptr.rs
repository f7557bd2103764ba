use core::any::TypeId;
use core::fmt;
use core::ptr::NonNull;

use crate::allocator::{Allocator, Global};
use crate::error::Error;
use crate::policy::{ClonePolicy, Erasable, Movable, Policy};
use crate::sboptr::SboPtr;
use crate::space::{Space, S2};
use crate::sptr;
use crate::storage::Mode;

/// Stores a value in a [`DynSboPtr`], viewed through the unsized type of the
/// binding it is assigned to.
///
/// `sboptr!(value)` uses the global allocator; `sboptr!(value, in alloc)`
/// uses `alloc`.
///
/// # Example
///
/// ```
/// #[macro_use]
/// extern crate sboptr;
/// # fn main() {
/// use sboptr::DynSboPtr;
/// use sboptr::space::S1;
///
/// let base = 40;
/// let add: DynSboPtr<dyn Fn(i32) -> i32, S1> = sboptr!(move |x: i32| x + base);
///
/// assert!(add.is_inline());
/// assert_eq!(add.get().map(|f| f(2)), Ok(42));
/// # }
/// ```
#[macro_export]
macro_rules! sboptr {
    ($e:expr) => {
        $crate::sboptr!($e, in $crate::Global)
    };
    ($e:expr, in $alloc:expr) => {{
        let val = $e;
        let ptr = ::core::ptr::addr_of!(val);
        #[allow(unsafe_code)]
        unsafe {
            $crate::DynSboPtr::from_raw_parts(val, ptr, $alloc)
        }
    }};
}

/// An [`SboPtr`] that also remembers how to view its value as a `D`.
///
/// `D` is usually a trait object such as `dyn Fn(u8) -> bool` or
/// `dyn Debug`: the value is stored with the same inline or heap placement
/// as in an `SboPtr`, and [`get`](Self::get) hands it back as `&D` without
/// naming its concrete type. Build one with the [`sboptr!`] macro.
///
/// ```
/// # #[macro_use] extern crate sboptr;
/// # fn main() {
/// use core::fmt::Debug;
/// use sboptr::DynSboPtr;
/// use sboptr::space::S2;
///
/// let values: [DynSboPtr<dyn Debug, S2>; 2] = [sboptr!(7u8), sboptr!([1u64; 8])];
///
/// assert!(values[0].is_inline());
/// assert!(values[1].is_heap());
/// assert_eq!(format!("{:?}", values[0].get().unwrap()), "7");
/// # }
/// ```
pub struct DynSboPtr<D: ?Sized, S: Space = S2, P: Policy = Movable, A: Allocator = Global> {
    inner: SboPtr<S, P, A>,
    /// Pointer metadata for viewing the held value as a `D`. Only the
    /// metadata part is meaningful; the address is replaced on access.
    meta: Option<NonNull<D>>,
}

// SAFETY: `meta` is only pointer metadata; the value lives in `inner`.
unsafe impl<D: ?Sized, S: Space, P: Policy, A: Allocator> Send for DynSboPtr<D, S, P, A>
where
    SboPtr<S, P, A>: Send,
{
}

impl<D: ?Sized, S: Space, P: Policy> DynSboPtr<D, S, P, Global> {
    /// Creates an empty handle using the global allocator.
    #[inline]
    pub const fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<D: ?Sized, S: Space, P: Policy, A: Allocator> DynSboPtr<D, S, P, A> {
    /// Creates an empty handle that falls back to `alloc` for large values.
    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        DynSboPtr {
            inner: SboPtr::new_in(alloc),
            meta: None,
        }
    }

    /// # Safety
    ///
    /// `meta` must be a pointer to a `T` unsized to a `D`, like
    /// `&val as *const D`. Its address is never dereferenced.
    #[doc(hidden)]
    pub unsafe fn from_raw_parts<T: Erasable<P>>(val: T, meta: *const D, alloc: A) -> Self {
        let mut ptr = SboPtr::new_in(alloc);
        ptr.emplace(val);
        DynSboPtr {
            inner: ptr,
            meta: NonNull::new(meta.cast_mut()),
        }
    }

    /// Returns a reference to the allocator.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.inner.allocator()
    }

    /// Returns true if the handle holds a value.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.inner.has_value()
    }

    /// Returns true if the held value lives in the embedded buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }

    /// Returns true if the held value lives on the heap.
    #[inline]
    pub fn is_heap(&self) -> bool {
        self.inner.is_heap()
    }

    /// Returns where the value currently lives.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.inner.mode()
    }

    /// Returns the [`TypeId`] of the concrete held value.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.inner.type_id()
    }

    /// Returns the type name of the concrete held value.
    #[inline]
    pub fn type_name(&self) -> Option<&'static str> {
        self.inner.type_name()
    }

    /// Returns true if the handle holds a `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Returns the held value viewed as a `D`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyAccess`] if the handle is empty.
    pub fn get(&self) -> Result<&D, Error> {
        match (self.meta, self.inner.data_ptr()) {
            // SAFETY: `meta` was produced for the held value's type, and the
            // value is live at `data` for as long as `self` is borrowed.
            (Some(meta), Some(data)) => {
                Ok(unsafe { &*sptr::with_metadata_of(data, meta.as_ptr()) })
            }
            _ => Err(Error::EmptyAccess),
        }
    }

    /// Returns the held value viewed as a mutable `D`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyAccess`] if the handle is empty.
    pub fn get_mut(&mut self) -> Result<&mut D, Error> {
        match (self.meta, self.inner.data_mut_ptr()) {
            // SAFETY: as in `get`, with `self` borrowed mutably.
            (Some(meta), Some(data)) => {
                Ok(unsafe { &mut *sptr::with_metadata_of_mut(data, meta.as_ptr()) })
            }
            _ => Err(Error::EmptyAccess),
        }
    }

    /// Returns a reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns a mutable reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut()
    }

    /// Moves the held `T` out of the handle.
    ///
    /// Returns the handle unchanged if it is empty or holds another type.
    pub fn into_inner<T: 'static>(self) -> Result<T, Self> {
        let DynSboPtr { inner, meta } = self;
        inner.into_inner().map_err(|inner| DynSboPtr { inner, meta })
    }

    /// Forgets the view and returns the underlying handle.
    #[inline]
    pub fn into_erased(self) -> SboPtr<S, P, A> {
        self.inner
    }

    /// Returns the underlying handle.
    ///
    /// Only shared access is offered, so the view always matches the value.
    #[inline]
    pub fn as_erased(&self) -> &SboPtr<S, P, A> {
        &self.inner
    }

    /// Drops the held value and releases its heap block, if any.
    pub fn reset(&mut self) {
        self.inner.reset();
        self.meta = None;
    }

    /// Moves the value out into a new handle, leaving `self` empty.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        DynSboPtr {
            inner: self.inner.take(),
            meta: self.meta.take(),
        }
    }

    /// Drops the held value, then moves `other`'s value into `self`.
    pub fn move_from(&mut self, other: &mut Self) {
        self.inner.move_from(&mut other.inner);
        self.meta = other.meta.take();
    }

    /// Exchanges the values (and allocators) of two handles.
    pub fn swap(&mut self, other: &mut Self) {
        self.inner.swap(&mut other.inner);
        core::mem::swap(&mut self.meta, &mut other.meta);
    }

    /// Moves the value into a handle with a different inline space.
    ///
    /// See [`SboPtr::resize`].
    pub fn resize<ToSpace: Space>(self) -> Result<DynSboPtr<D, ToSpace, P, A>, Self> {
        let DynSboPtr { inner, meta } = self;
        match inner.resize::<ToSpace>() {
            Ok(inner) => Ok(DynSboPtr { inner, meta }),
            Err(inner) => Err(DynSboPtr { inner, meta }),
        }
    }
}

impl<D: ?Sized, S: Space, P: ClonePolicy, A: Allocator + Clone> Clone for DynSboPtr<D, S, P, A> {
    fn clone(&self) -> Self {
        DynSboPtr {
            inner: self.inner.clone(),
            meta: self.meta,
        }
    }
}

impl<D: ?Sized, S: Space, P: Policy, A: Allocator + Default> Default for DynSboPtr<D, S, P, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<D: ?Sized + fmt::Debug, S: Space, P: Policy, A: Allocator> fmt::Debug
    for DynSboPtr<D, S, P, A>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Ok(value) => f.debug_tuple("DynSboPtr").field(&value).finish(),
            Err(_) => f.write_str("DynSboPtr(<empty>)"),
        }
    }
}
