//! Exclusive and shared ownership handles.
//!
//! This crate offers two ownership disciplines over heap-allocated objects:
//!
//! -   `Unique<T, D>`: a single owner, moved but never copied, destroying the object through its deleter `D`.
//! -   `Shared<T>`: many owners, reference-counted, destroying the object when the last owner is gone.
//!
//!
//! #   How to use?
//!
//! Construct a handle with `Unique::new` or `Shared::new`, or equivalently the `make_unique` and `make_shared`
//! factories, then use it as a reference to the object.
//!
//! A `Shared<T>` can further be:
//!
//! -   Built from a `Unique<T, D>`, keeping its deleter, or from a `Box<T>`.
//! -   Projected to a part of its object with `Shared::map`, or upcast to a trait object the same way.
//! -   Narrowed back with `dynamic_pointer_cast`, for traits declaring `Downcast` as a supertrait.
//! -   Obtained from within the object itself, see `SharedFromSelf`.
//!
//!
//! #   Internals
//!
//! A `Shared<T>` is a pair of pointers: the view it exposes, and the control block it keeps alive. The control block
//! comes in two shapes:
//!
//! -   Separate: the control block is allocated on its own, and holds the object pointer and deleter. This is the shape
//!     used when taking ownership of an existing allocation, such as a `Box<T>`.
//! -   Fused: the control block and the object share a single allocation, laid out as per `FusedLayout`. This is the
//!     shape used by `Shared::new` and its variants.
//!
//! In either case, the reference count is atomic, and the object is finalized by the one owner which observes the
//! count dropping from 1 to 0.
//!
//!
//! #   Limits
//!
//! -   There is no weak handle, hence cycles of `Shared` leak.
//! -   Only the global allocator is supported.

//  Use only core and alloc, guaranteeing no I/O nor threads.
#![cfg_attr(not(test), no_std)]
//  Ensure unsafe operations are duly checked.
#![deny(unsafe_op_in_unsafe_fn)]
//  Ensure proper documentation.
#![deny(missing_docs)]

//  Non-core must be explicitly depended on in no_std.
extern crate alloc;

mod anchor;
mod block;
mod cast;
mod deleter;
mod error;
mod layout;
mod make;
mod shared;
mod unique;

pub use anchor::{SharedAnchor, SharedFromSelf};
pub use cast::{const_pointer_cast, dynamic_pointer_cast, reinterpret_pointer_cast, static_pointer_cast, Downcast};
pub use deleter::{DefaultDelete, Deleter, DropInPlace};
pub use error::OwnershipError;
pub use layout::FusedLayout;
pub use make::{
    make_shared, make_shared_anchored, make_shared_array, make_shared_for_overwrite, make_shared_with,
    make_shared_with_anchored, make_unique, make_unique_array, make_unique_array_filled,
};
pub use shared::{ByOwner, Shared, SharedUninit};
pub use unique::{Unique, UniqueArray};
