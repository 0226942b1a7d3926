//! Errors from the library.

use core::{error, fmt};

/// Errors returned by this library.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OwnershipError {
    /// The object is not, or no longer, owned by any `Shared` handle.
    NoOwner,
    /// No memory could be allocated.
    MemoryExhausted,
}

impl fmt::Display for OwnershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl error::Error for OwnershipError {}

//  Dereferencing an empty handle is a bug in the caller.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn null_dereference() -> ! {
    panic!("dereferenced an empty handle")
}
