//! Inline capacity configurations.
//!
//! A [`Space`] decides how many bytes an [`SboPtr`](crate::SboPtr) can hold
//! inline and how strictly those bytes are aligned. Values that are larger or
//! more strictly aligned than the space are moved to the heap.

use core::alloc::Layout;
use core::mem::{self, MaybeUninit};

/// Backing storage for the inline buffer of an [`SboPtr`](crate::SboPtr).
///
/// The buffer is a `MaybeUninit<Self>`, so `size_of::<Self>()` and
/// `align_of::<Self>()` bound what can be stored there. `CAPACITY` and
/// `ALIGNMENT` may narrow those bounds but never widen them.
pub trait Space: Sized {
    /// Number of bytes usable for inline values.
    const CAPACITY: usize = mem::size_of::<Self>();
    /// Largest alignment an inline value may require.
    const ALIGNMENT: usize = mem::align_of::<Self>();

    /// Returns true if a value with `layout` is stored inline.
    ///
    /// # Example
    ///
    /// ```
    /// use core::alloc::Layout;
    /// use sboptr::space::{Bytes, Space, S1};
    ///
    /// assert!(S1::fits_layout(Layout::new::<usize>()));
    /// assert!(!S1::fits_layout(Layout::new::<[usize; 2]>()));
    /// assert!(!<Bytes<16, u8>>::fits_layout(Layout::new::<u32>()));
    /// ```
    #[inline]
    fn fits_layout(layout: Layout) -> bool {
        fits_inline::<Self>(layout)
    }

    /// Returns true if a `T` is stored inline.
    #[inline]
    fn fits<T>() -> bool {
        fits_inline::<Self>(Layout::new::<T>())
    }
}

/// The fits-inline predicate, usable in `const` contexts.
pub(crate) const fn fits_inline<S: Space>(layout: Layout) -> bool {
    layout.size() <= capacity::<S>() && layout.align() <= alignment::<S>()
}

pub(crate) const fn capacity<S: Space>() -> usize {
    min(S::CAPACITY, mem::size_of::<S>())
}

pub(crate) const fn alignment<S: Space>() -> usize {
    min(S::ALIGNMENT, mem::align_of::<S>())
}

const fn min(a: usize, b: usize) -> usize {
    if a < b {
        a
    } else {
        b
    }
}

macro_rules! word_spaces {
    ($($(#[$meta:meta])* $name:ident = $words:literal;)*) => {
        $(
            $(#[$meta])*
            pub struct $name {
                _inner: [usize; $words],
            }

            impl Space for $name {}
        )*
    };
}

word_spaces! {
    /// One pointer-sized word.
    S1 = 1;
    /// Two pointer-sized words. This is the default space.
    S2 = 2;
    /// Four pointer-sized words.
    S4 = 4;
    /// Eight pointer-sized words.
    S8 = 8;
    /// Sixteen pointer-sized words.
    S16 = 16;
    /// Thirty-two pointer-sized words.
    S32 = 32;
    /// Sixty-four pointer-sized words.
    S64 = 64;
}

/// Exactly `N` bytes of inline capacity, aligned like `A`.
///
/// The struct itself may be padded to a multiple of `align_of::<A>()`, but
/// only `N` bytes count towards the capacity.
///
/// ```
/// use sboptr::space::{Bytes, Space};
///
/// assert!(<Bytes<4>>::fits::<u32>());
/// assert!(!<Bytes<4>>::fits::<u64>());
/// assert!(<Bytes<8, u64>>::fits::<u64>());
/// ```
#[repr(C)]
pub struct Bytes<const N: usize, A = usize> {
    _align: [A; 0],
    _bytes: [MaybeUninit<u8>; N],
}

impl<const N: usize, A> Space for Bytes<N, A> {
    const CAPACITY: usize = N;
}

impl Space for () {}

impl<const N: usize> Space for [u8; N] {}

impl<const N: usize> Space for [usize; N] {}

impl<const N: usize> Space for [u64; N] {}

impl<const N: usize> Space for [u128; N] {}
