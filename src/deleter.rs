//! Deleter strategies, invoked to destroy an owned object.
//!
//! A deleter is a policy object: `Unique` stores it alongside its pointer, and the separate control block of `Shared`
//! stores it alongside the object pointer. It is invoked exactly once per owned object.

use core::{fmt, ptr::NonNull};

use alloc::boxed::Box;

/// A strategy to destroy an owned object.
///
/// Any `Fn(NonNull<T>)` closure is a deleter: it receives ownership of the pointer.
pub trait Deleter<T>
where
    T: ?Sized,
{
    /// Destroys the object pointed to by `ptr`, and releases its memory as appropriate.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for this strategy.
    /// -   EndOfLife: `ptr` SHALL never be used again after this call.
    unsafe fn delete(&self, ptr: NonNull<T>);
}

/// The default strategy: the object was allocated as a `Box<T>`, and is released as one.
///
/// Slice pointers carry their length, hence this strategy also releases arrays allocated as `Box<[T]>`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DefaultDelete;

impl<T> Deleter<T> for DefaultDelete
where
    T: ?Sized,
{
    #[inline]
    unsafe fn delete(&self, ptr: NonNull<T>) {
        //  Safety:
        //  -   Owned: as per pre-condition, `ptr` was obtained from `Box::into_raw`, or an equivalent allocation.
        //  -   EndOfLife: as per pre-condition.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

/// Runs the drop glue of the object, without releasing its memory.
///
/// Used for objects whose memory is released by another party, such as a fused control block.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct DropInPlace;

impl<T> Deleter<T> for DropInPlace
where
    T: ?Sized,
{
    #[inline]
    unsafe fn delete(&self, ptr: NonNull<T>) {
        //  Safety:
        //  -   Valid: as per Owned pre-condition, the object is alive and valid for dropping.
        unsafe { ptr.as_ptr().drop_in_place() };
    }
}

impl<T, F> Deleter<T> for F
where
    T: ?Sized,
    F: Fn(NonNull<T>),
{
    #[inline]
    unsafe fn delete(&self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// Formats a deleter-bearing handle's deleter without requiring `Debug`.
pub(crate) struct DeleterName<D>(core::marker::PhantomData<D>);

impl<D> DeleterName<D> {
    pub(crate) const fn new() -> Self {
        Self(core::marker::PhantomData)
    }
}

impl<D> fmt::Debug for DeleterName<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(core::any::type_name::<D>())
    }
}

// mod tests
