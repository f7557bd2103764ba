use core::alloc::Layout;
use core::any::TypeId;
use core::convert::Infallible;
use core::fmt;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr::{self, NonNull};

use ::alloc::alloc::handle_alloc_error;

use crate::allocator::{Allocator, Global};
use crate::error::{AllocError, EmplaceError, Error};
use crate::policy::{ClonePolicy, Erasable, Movable, Policy, SendPolicy};
use crate::space::{self, Space, S2};
use crate::storage::{Mode, Storage};
use crate::vtable::Table;

/// An owning, type-erased pointer that stores small values inline.
///
/// A `SboPtr` holds at most one value of any `'static` type. Whether that
/// value lives in the embedded buffer or on the heap is decided per type at
/// compile time: a `T` is stored inline when it is no larger than
/// `S::CAPACITY` bytes and no more strictly aligned than `S::ALIGNMENT`.
/// Everything else goes to a block obtained from the allocator `A`.
///
/// * `S` is the [`Space`] backing the inline buffer.
/// * `P` is the copy [`Policy`]: [`Movable`], [`Copyable`](crate::Copyable),
///   or one of their `Send` variants.
/// * `A` is the [`Allocator`] used for the heap fallback.
///
/// # Example
///
/// ```
/// use sboptr::SboPtr;
/// use sboptr::space::S2;
///
/// let mut ptr: SboPtr<S2> = SboPtr::new();
/// assert!(!ptr.has_value());
///
/// ptr.emplace(42u32);
/// assert!(ptr.is_inline());
/// assert_eq!(ptr.get::<u32>(), Ok(&42));
///
/// ptr.emplace([7u64; 16]);
/// assert!(ptr.is_heap());
/// assert_eq!(ptr.get::<[u64; 16]>().unwrap()[15], 7);
/// assert!(ptr.get::<u32>().is_err());
/// ```
pub struct SboPtr<S: Space = S2, P: Policy = Movable, A: Allocator = Global> {
    storage: Storage<S, P::VTable>,
    alloc: A,
}

// SAFETY: a `SendPolicy` only admits `Send` values, the tables are immutable
// statics, and a heap block is owned exclusively by the handle.
unsafe impl<S: Space, P: SendPolicy, A: Allocator + Send> Send for SboPtr<S, P, A> {}

/// Releases a freshly allocated block unless it is disarmed with `mem::forget`.
struct BlockGuard<'a, A: Allocator> {
    alloc: &'a A,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl<A: Allocator> Drop for BlockGuard<'_, A> {
    fn drop(&mut self) {
        // SAFETY: the block was just allocated with `layout` and holds no value.
        unsafe { self.alloc.deallocate(self.ptr, self.layout) }
    }
}

impl<S: Space, P: Policy> SboPtr<S, P, Global> {
    /// Creates an empty handle using the global allocator.
    #[inline]
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a handle holding `value`.
    ///
    /// # Example
    ///
    /// ```
    /// use sboptr::UniqueSboPtr;
    /// use sboptr::space::S4;
    ///
    /// let small = UniqueSboPtr::<S4>::from_value([0usize; 2]);
    /// let large = UniqueSboPtr::<S4>::from_value([1usize; 8]);
    ///
    /// assert!(small.is_inline());
    /// assert!(large.is_heap());
    /// ```
    pub fn from_value<T: Erasable<P>>(value: T) -> Self {
        let mut ptr = Self::new();
        ptr.emplace(value);
        ptr
    }
}

impl<S: Space, P: Policy, A: Allocator> SboPtr<S, P, A> {
    /// Creates an empty handle that falls back to `alloc` for large values.
    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        SboPtr {
            storage: Storage::Empty,
            alloc,
        }
    }

    /// Creates a handle holding `value`, using `alloc` if it does not fit inline.
    pub fn try_from_value_in<T: Erasable<P>>(value: T, alloc: A) -> Result<Self, AllocError> {
        let mut ptr = Self::new_in(alloc);
        ptr.try_emplace(value)?;
        Ok(ptr)
    }

    /// Returns a reference to the allocator.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns true if the handle holds a value.
    #[inline]
    pub fn has_value(&self) -> bool {
        !matches!(self.storage, Storage::Empty)
    }

    /// Returns true if the held value lives in the embedded buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline { .. })
    }

    /// Returns true if the held value lives on the heap.
    #[inline]
    pub fn is_heap(&self) -> bool {
        matches!(self.storage, Storage::Heap { .. })
    }

    /// Returns where the value currently lives.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.storage.mode()
    }

    /// Returns the [`TypeId`] of the held value.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.storage.vtable().map(|vtable| vtable.base().type_id())
    }

    /// Returns the type name of the held value, for diagnostics.
    #[inline]
    pub fn type_name(&self) -> Option<&'static str> {
        self.storage.vtable().map(|vtable| vtable.base().type_name())
    }

    /// Returns true if the handle holds a `T`.
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.storage.check::<T>().is_ok()
    }

    /// Replaces the held value with `value`.
    ///
    /// The previous value is dropped first. Aborts through
    /// [`handle_alloc_error`] if a heap block is needed and cannot be obtained,
    /// like `Box::new` does.
    pub fn emplace<T: Erasable<P>>(&mut self, value: T) -> &mut T {
        self.emplace_with(|| value)
    }

    /// Replaces the held value with the one produced by `init`.
    ///
    /// The previous value is dropped before `init` runs. If `init` panics the
    /// handle is left empty.
    pub fn emplace_with<T: Erasable<P>, F: FnOnce() -> T>(&mut self, init: F) -> &mut T {
        match self.place(|| Ok::<T, Infallible>(init())) {
            Ok(value) => value,
            Err(EmplaceError::Alloc(err)) => handle_alloc_error(err.layout),
            Err(EmplaceError::Construct(never)) => match never {},
        }
    }

    /// Replaces the held value with `value`, reporting allocation failure.
    ///
    /// The heap block, if one is needed, is requested before the previous
    /// value is touched: on error the handle is unchanged.
    pub fn try_emplace<T: Erasable<P>>(&mut self, value: T) -> Result<&mut T, AllocError> {
        match self.place(|| Ok::<T, Infallible>(value)) {
            Ok(value) => Ok(value),
            Err(EmplaceError::Alloc(err)) => Err(err),
            Err(EmplaceError::Construct(never)) => match never {},
        }
    }

    /// Replaces the held value with the one built by a fallible constructor.
    ///
    /// * If no heap block can be obtained, `init` is not called and the handle
    ///   is unchanged.
    /// * Otherwise the previous value is dropped and `init` runs. If it fails
    ///   (or panics), the handle is left empty and nothing is leaked.
    ///
    /// # Example
    ///
    /// ```
    /// use sboptr::{EmplaceError, UniqueSboPtr};
    ///
    /// let mut ptr = UniqueSboPtr::<sboptr::space::S2>::from_value(1u8);
    /// let res = ptr.try_emplace_with(|| "x".parse::<u32>());
    /// assert!(matches!(res, Err(EmplaceError::Construct(_))));
    /// assert!(!ptr.has_value());
    /// ```
    pub fn try_emplace_with<T, E, F>(&mut self, init: F) -> Result<&mut T, EmplaceError<E>>
    where
        T: Erasable<P>,
        F: FnOnce() -> Result<T, E>,
    {
        self.place(init)
    }

    fn place<T, E, F>(&mut self, init: F) -> Result<&mut T, EmplaceError<E>>
    where
        T: Erasable<P>,
        F: FnOnce() -> Result<T, E>,
    {
        const {
            assert!(
                A::HEAP || space::fits_inline::<S>(Layout::new::<T>()),
                "value does not fit inline and this handle has no heap fallback"
            )
        };

        let vtable = T::VTABLE;

        let fits = const { space::fits_inline::<S>(Layout::new::<T>()) };
        if fits {
            self.reset();
            let value = init().map_err(EmplaceError::Construct)?;

            let mut space = MaybeUninit::<S>::uninit();
            // SAFETY: `T` fits the size and alignment of `S`.
            unsafe { space.as_mut_ptr().cast::<T>().write(value) };
            self.storage = Storage::Inline { space, vtable };
        } else {
            let layout = Layout::new::<T>();
            let block = self.alloc.allocate(layout).inspect_err(|_| {
                debug!(
                    ty = core::any::type_name::<T>(),
                    size = layout.size(),
                    "heap fallback failed"
                );
            })?;
            trace!(
                ty = core::any::type_name::<T>(),
                size = layout.size(),
                align = layout.align(),
                "storing value on the heap"
            );

            self.reset();
            let guard = BlockGuard {
                alloc: &self.alloc,
                ptr: block,
                layout,
            };
            let value = init().map_err(EmplaceError::Construct)?;
            mem::forget(guard);

            // SAFETY: `block` is valid and aligned for a `T`.
            unsafe { block.as_ptr().cast::<T>().write(value) };
            self.storage = Storage::Heap { ptr: block, vtable };
        }

        match self.storage.as_mut_ptr() {
            // SAFETY: a `T` was written to the storage above.
            Some(ptr) => Ok(unsafe { &mut *ptr.cast::<T>() }),
            None => unreachable!("storage was just filled"),
        }
    }

    /// Returns a reference to the held `T`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyAccess`] if the handle is empty and
    /// [`Error::TypeMismatch`] if it holds some other type.
    pub fn get<T: 'static>(&self) -> Result<&T, Error> {
        self.storage.check::<T>()?;
        match self.storage.as_ptr() {
            // SAFETY: the table says the storage holds a live `T`.
            Some(ptr) => Ok(unsafe { &*ptr.cast::<T>() }),
            None => Err(Error::EmptyAccess),
        }
    }

    /// Returns a mutable reference to the held `T`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut<T: 'static>(&mut self) -> Result<&mut T, Error> {
        self.storage.check::<T>()?;
        match self.storage.as_mut_ptr() {
            // SAFETY: the table says the storage holds a live `T`.
            Some(ptr) => Ok(unsafe { &mut *ptr.cast::<T>() }),
            None => Err(Error::EmptyAccess),
        }
    }

    /// Returns a reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.get().ok()
    }

    /// Returns a mutable reference to the held value if it is a `T`.
    #[inline]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.get_mut().ok()
    }

    /// Moves the held `T` out of the handle.
    ///
    /// Returns the handle unchanged if it is empty or holds another type.
    ///
    /// ```
    /// use sboptr::UniqueSboPtr;
    ///
    /// let ptr: UniqueSboPtr = UniqueSboPtr::from_value(String::from("hi"));
    /// let ptr = ptr.into_inner::<u32>().unwrap_err();
    /// assert_eq!(ptr.into_inner::<String>().unwrap(), "hi");
    /// ```
    pub fn into_inner<T: 'static>(mut self) -> Result<T, Self> {
        if !self.is::<T>() {
            return Err(self);
        }

        // SAFETY (all arms): the type check above passed, so the storage holds
        // a live `T` which is read exactly once and never dropped in place.
        match mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Empty => Err(self),
            Storage::Inline { space, .. } => Ok(unsafe { space.as_ptr().cast::<T>().read() }),
            Storage::Heap { ptr, vtable } => {
                let value = unsafe { ptr.as_ptr().cast::<T>().read() };
                unsafe { self.alloc.deallocate(ptr, vtable.base().layout) };
                Ok(value)
            }
        }
    }

    /// Drops the held value and releases its heap block, if any.
    pub fn reset(&mut self) {
        match mem::replace(&mut self.storage, Storage::Empty) {
            Storage::Empty => {}
            Storage::Inline { mut space, vtable } => {
                // SAFETY: the buffer holds a live value described by `vtable`.
                unsafe { (vtable.base().drop_in_place)(space.as_mut_ptr().cast()) }
            }
            Storage::Heap { ptr, vtable } => {
                let vtable = vtable.base();
                // SAFETY: the block holds a live value described by `vtable`
                // and was allocated by `self.alloc` with its layout.
                unsafe {
                    (vtable.drop_in_place)(ptr.as_ptr());
                    self.alloc.deallocate(ptr, vtable.layout);
                }
            }
        }
    }

    /// Moves the value out into a new handle, leaving `self` empty.
    ///
    /// Heap values change owner without reallocating.
    ///
    /// ```
    /// use sboptr::UniqueSboPtr;
    ///
    /// let mut a: UniqueSboPtr = UniqueSboPtr::from_value(7i32);
    /// let b = a.take();
    /// assert!(!a.has_value());
    /// assert_eq!(b.get::<i32>(), Ok(&7));
    /// ```
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let mut taken = Self::new_in(self.alloc.clone());
        taken.storage.take_from(&mut self.storage);
        taken
    }

    /// Drops the held value, then moves `other`'s value into `self`.
    ///
    /// `other` is left empty. The allocators of both handles are exchanged so
    /// that a heap block stays with the allocator that produced it.
    pub fn move_from(&mut self, other: &mut Self) {
        self.reset();
        mem::swap(&mut self.alloc, &mut other.alloc);
        self.storage.take_from(&mut other.storage);
    }

    /// Exchanges the values (and allocators) of two handles.
    pub fn swap(&mut self, other: &mut Self) {
        let mut scratch = Storage::Empty;
        scratch.take_from(&mut self.storage);
        self.storage.take_from(&mut other.storage);
        other.storage.take_from(&mut scratch);
        mem::swap(&mut self.alloc, &mut other.alloc);
    }

    /// Moves the value into a handle with a different inline space.
    ///
    /// Inline values are re-placed according to `ToSpace`, moving to the heap
    /// if they no longer fit. Values already on the heap are never moved.
    /// Returns the original handle if a block is needed and cannot be obtained.
    ///
    /// # Example
    ///
    /// ```
    /// use sboptr::UniqueSboPtr;
    /// use sboptr::space::{S1, S4};
    ///
    /// let s = UniqueSboPtr::<S4>::from_value([0usize; 4]);
    /// let m = s.resize::<S1>().ok().unwrap();
    /// assert!(m.is_heap());
    /// let l = m.resize::<S4>().ok().unwrap();
    /// assert!(l.is_heap());
    /// ```
    pub fn resize<ToSpace: Space>(self) -> Result<SboPtr<ToSpace, P, A>, Self> {
        let needs_block = match &self.storage {
            Storage::Inline { vtable, .. } => {
                let layout = vtable.base().layout;
                (!space::fits_inline::<ToSpace>(layout)).then_some(layout)
            }
            _ => None,
        };
        let block = match needs_block {
            Some(layout) => match self.alloc.allocate(layout) {
                Ok(block) => Some(block),
                Err(_) => {
                    debug!(size = layout.size(), "resize could not allocate");
                    return Err(self);
                }
            },
            None => None,
        };

        let (storage, alloc) = self.into_parts();
        let storage = match storage {
            Storage::Empty => Storage::Empty,
            Storage::Heap { ptr, vtable } => {
                trace!(ty = vtable.base().type_name(), "resize keeps heap block");
                Storage::Heap { ptr, vtable }
            }
            Storage::Inline { mut space, vtable } => {
                let from = space.as_mut_ptr().cast::<u8>();
                match block {
                    Some(block) => {
                        // SAFETY: `block` was allocated for the value's layout;
                        // the old buffer is discarded without dropping it.
                        unsafe { (vtable.base().relocate)(from, block.as_ptr()) };
                        Storage::Heap { ptr: block, vtable }
                    }
                    None => {
                        let mut to = MaybeUninit::<ToSpace>::uninit();
                        // SAFETY: the value fits `ToSpace`; the old buffer is
                        // discarded without dropping it.
                        unsafe { (vtable.base().relocate)(from, to.as_mut_ptr().cast()) };
                        Storage::Inline { space: to, vtable }
                    }
                }
            }
        };
        Ok(SboPtr { storage, alloc })
    }

    /// Address of the held value, if any.
    #[inline]
    pub(crate) fn data_ptr(&self) -> Option<*const u8> {
        self.storage.as_ptr()
    }

    #[inline]
    pub(crate) fn data_mut_ptr(&mut self) -> Option<*mut u8> {
        self.storage.as_mut_ptr()
    }

    /// Splits the handle without running its destructor.
    fn into_parts(self) -> (Storage<S, P::VTable>, A) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never used or dropped again.
        unsafe { (ptr::read(&this.storage), ptr::read(&this.alloc)) }
    }
}

impl<S: Space, P: ClonePolicy, A: Allocator + Clone> SboPtr<S, P, A> {
    /// Deep-copies the held value, reporting allocation failure.
    ///
    /// The copy is placed according to this handle's own space, independent
    /// of where the source value lives.
    pub fn try_clone(&self) -> Result<Self, AllocError> {
        let mut copy = Self::new_in(self.alloc.clone());
        let (Some(vtable), Some(src)) = (self.storage.vtable(), self.storage.as_ptr()) else {
            return Ok(copy);
        };
        let layout = vtable.base.layout;

        if space::fits_inline::<S>(layout) {
            let mut space = MaybeUninit::<S>::uninit();
            // SAFETY: `src` is a live value that fits `S`.
            unsafe { (vtable.clone_into)(src, space.as_mut_ptr().cast()) };
            copy.storage = Storage::Inline { space, vtable };
        } else {
            let block = copy.alloc.allocate(layout)?;
            let guard = BlockGuard {
                alloc: &copy.alloc,
                ptr: block,
                layout,
            };
            // SAFETY: `block` was allocated for `layout`.
            unsafe { (vtable.clone_into)(src, block.as_ptr()) };
            mem::forget(guard);
            copy.storage = Storage::Heap { ptr: block, vtable };
        }
        Ok(copy)
    }
}

impl<S: Space, P: ClonePolicy, A: Allocator + Clone> Clone for SboPtr<S, P, A> {
    /// Deep-copies the held value.
    ///
    /// `clone_from` keeps the default `*self = source.clone()`: the copy is
    /// built first, so a panicking `Clone` leaves the destination untouched.
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(err) => handle_alloc_error(err.layout),
        }
    }
}

impl<S: Space, P: Policy, A: Allocator + Default> Default for SboPtr<S, P, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<S: Space, P: Policy, A: Allocator> Drop for SboPtr<S, P, A> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<S: Space, P: Policy, A: Allocator> fmt::Debug for SboPtr<S, P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SboPtr")
            .field("mode", &self.mode())
            .field("type", &self.type_name())
            .finish()
    }
}
