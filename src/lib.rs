//! # SboPtr: Type-Erased Pointers with Small Buffer Optimization
//!
//! [`SboPtr`] owns at most one value of any `'static` type behind a single,
//! uniform handle. Small values are stored inline in a buffer embedded in the
//! handle; values that are too large or too strictly aligned fall back to a
//! heap block. The choice is made per type at compile time, so holding small
//! commands, closures, or variant-like payloads costs no allocation at all.
//!
//! ## Core Concept
//!
//! A `Box<dyn Any>` always heap-allocates. An [`SboPtr`] keeps a configurable
//! inline [`Space`](space::Space) and only allocates when the value does not
//! fit it. The stored type does not have to implement any trait: destroy,
//! move, and (optionally) copy are dispatched through a per-type table of
//! function pointers generated on first use.
//!
//! ## Quick Start
//!
//! ```rust
//! use sboptr::SboPtr;
//! use sboptr::space::S4;
//!
//! // Small values are stored inline
//! let mut ptr: SboPtr<S4> = SboPtr::new();
//! ptr.emplace([1u32, 2]);
//! assert!(ptr.is_inline());
//!
//! // Large values automatically use heap allocation
//! ptr.emplace([0u32; 32]);
//! assert!(ptr.is_heap());
//!
//! // Typed access checks the stored type
//! assert_eq!(ptr.get::<[u32; 32]>().map(|v| v.len()), Ok(32));
//! assert!(ptr.get::<[u32; 2]>().is_err());
//! ```
//!
//! ## Configuration
//!
//! A handle is configured by three type parameters:
//!
//! - **Space** (default [`S2`](space::S2), two pointer-sized words): the inline
//!   capacity and alignment. See the [`space`] module for the stock spaces and
//!   [`Bytes`](space::Bytes) for exact byte capacities.
//! - **Policy** (default [`Movable`]): [`Copyable`] handles implement `Clone`
//!   and only accept `Clone` values; [`Movable`] handles accept anything and
//!   cannot be cloned.
//! - **Allocator** (default [`Global`]): used only for the heap fallback.
//!   [`NoHeap`] turns oversized values into compile errors.
//!
//! ```rust
//! use sboptr::{CloneSboPtr, InlineSboPtr, NoHeap};
//! use sboptr::space::Bytes;
//!
//! let a: CloneSboPtr<Bytes<16>> = CloneSboPtr::from_value(String::from("copied"));
//! let b = a.clone();
//! assert_eq!(b.get::<String>().unwrap(), "copied");
//!
//! let mut c: InlineSboPtr<Bytes<16>> = InlineSboPtr::new_in(NoHeap);
//! c.emplace(7u64);
//! assert!(c.is_inline());
//! ```
//!
//! ## Using Values Through an Interface
//!
//! A [`DynSboPtr`] keeps the value the same way and hands it back through an
//! unsized view such as a trait object. Build one with [`sboptr!`]:
//!
//! ```rust
//! # #[macro_use] extern crate sboptr;
//! # fn main() {
//! use sboptr::DynSboPtr;
//! use sboptr::space::S1;
//!
//! let is_even: DynSboPtr<dyn Fn(u8) -> bool, S1> = sboptr!(|num: u8| num % 2 == 0);
//! let f = is_even.get().unwrap();
//! assert!(!f(5));
//! assert!(f(6));
//! # }
//! ```
//!
//! Handles are `!Send` by default. The [`SendMovable`] and [`SendCopyable`]
//! policies only accept `Send` values and make the handle `Send`.
//!
//! ### Feature Flags
//!
//! - **`std`** (enabled by default)
//!   - Links to the standard library
//!   - Disable for `#![no_std]` environments: `default-features = false`
//!
//! - **`tracing`** (optional)
//!   - Emits `trace`/`debug` events for heap fallbacks and allocation failures
//!
//! - **`nightly`** (optional, requires nightly)
//!   - Uses the strict provenance and pointer metadata APIs
//!
//! ## Moving, Copying, and Swapping
//!
//! ```rust
//! use sboptr::UniqueSboPtr;
//!
//! let mut a: UniqueSboPtr = UniqueSboPtr::from_value(7i32);
//! let mut b = a.take();
//! assert!(!a.has_value());
//! assert_eq!(b.get::<i32>(), Ok(&7));
//!
//! a.emplace(vec![1, 2, 3]);
//! a.swap(&mut b);
//! assert_eq!(a.get::<i32>(), Ok(&7));
//! assert_eq!(b.get::<Vec<i32>>().map(Vec::len), Ok(3));
//! ```

#![cfg_attr(feature = "nightly", feature(strict_provenance, set_ptr_value))]
#![cfg_attr(not(feature = "std"), no_std)]
#![allow(stable_features)]
#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::as_conversions)]

extern crate alloc;

#[macro_use]
mod trace;

mod allocator;
mod dyn_ptr;
mod error;
pub mod policy;
mod sboptr;
pub mod space;
mod sptr;
mod storage;
mod vtable;

pub use crate::allocator::{Allocator, Global, NoHeap};
pub use crate::dyn_ptr::DynSboPtr;
pub use crate::error::{AllocError, EmplaceError, Error};
pub use crate::policy::{
    ClonePolicy, Copyable, Erasable, Movable, Policy, SendCopyable, SendMovable, SendPolicy,
};
pub use crate::sboptr::SboPtr;
pub use crate::storage::Mode;
pub use crate::vtable::{CopyVTable, Table, VTable};

/// A move-only handle using the global allocator.
pub type UniqueSboPtr<S = space::S2> = SboPtr<S, Movable, Global>;

/// A copyable handle using the global allocator.
pub type CloneSboPtr<S = space::S2> = SboPtr<S, Copyable, Global>;

/// A move-only handle that never allocates.
pub type InlineSboPtr<S = space::S2> = SboPtr<S, Movable, NoHeap>;

/// A move-only handle that can be sent to another thread.
pub type SendSboPtr<S = space::S2> = SboPtr<S, SendMovable, Global>;
