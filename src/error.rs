use core::alloc::Layout;

use thiserror::Error;

/// Typed access failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The handle holds a value of a different type than the one requested.
    #[error("type mismatch: requested `{expected}`, handle holds `{found}`")]
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
        /// Name of the stored type.
        found: &'static str,
    },

    /// The handle is empty.
    #[error("access to an empty handle")]
    EmptyAccess,
}

/// The allocator could not provide a block for a heap-stored value.
///
/// The handle that requested the block is left as it was before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("failed to allocate {} bytes aligned to {}", .layout.size(), .layout.align())]
pub struct AllocError {
    /// The layout that was requested.
    pub layout: Layout,
}

/// Emplacing a value through a fallible constructor failed.
#[derive(Error, Debug)]
pub enum EmplaceError<E> {
    /// No heap block could be obtained; the constructor was not run.
    #[error(transparent)]
    Alloc(#[from] AllocError),

    /// The constructor reported an error; the handle is now empty.
    #[error("failed to construct value: {0}")]
    Construct(E),
}

impl<E> EmplaceError<E> {
    /// Returns the constructor error, if that is what failed.
    pub fn into_construct(self) -> Option<E> {
        match self {
            EmplaceError::Construct(err) => Some(err),
            EmplaceError::Alloc(_) => None,
        }
    }
}
