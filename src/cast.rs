//! Casts between views of a shared object.
//!
//! The checked, static, and reinterpret casts produce a new handle sharing the owner of its source, exposing a
//! differently typed view. The source is left untouched; an empty source yields an empty result.
//!
//! `const_pointer_cast` instead borrows the source mutably, and returns a mutable reference to its view.
//!
//! Upcasts, from a concrete type to a trait object, are expressed with `Shared::map`.

use core::{any::Any, ptr::NonNull};

use crate::Shared;

/// Gives access to the concrete type of a trait object, for checked narrowing.
///
/// Implemented for every `'static` type, and for `dyn Any`. Traits opt in by declaring `Downcast` as a supertrait:
///
/// ```
/// use endor_own::{dynamic_pointer_cast, Downcast, Shared};
///
/// trait Animal: Downcast + Send + Sync {}
///
/// struct Cat;
/// struct Dog;
///
/// impl Animal for Cat {}
/// impl Animal for Dog {}
///
/// let animal: Shared<dyn Animal> = Shared::map(Shared::new(Cat), |cat| cat as &(dyn Animal + 'static));
///
/// let cat = dynamic_pointer_cast::<Cat, _>(&animal);
/// let dog = dynamic_pointer_cast::<Dog, _>(&animal);
///
/// assert!(!Shared::is_null(&cat));
/// assert!(Shared::is_null(&dog));
/// assert_eq!(2, Shared::use_count(&animal));
/// ```
pub trait Downcast: Any {
    /// Returns `self`, as its concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Downcast for T
where
    T: Any,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Downcast for dyn Any {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Downcast for dyn Any + Send + Sync {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Narrows `source` to its concrete type `T`, if it is indeed a `T`.
///
/// Returns an empty handle, without touching the count, if `source` is empty or not a `T`.
pub fn dynamic_pointer_cast<T, U>(source: &Shared<U>) -> Shared<T>
where
    T: Any,
    U: ?Sized + Downcast,
{
    let Some(view) = Shared::as_ptr(source) else { return Shared::null() };

    //  Safety:
    //  -   Convertible: alive & guarded shared access.
    let any = unsafe { view.as_ref() }.as_any();

    let Some(concrete) = any.downcast_ref::<T>() else { return Shared::null() };

    let concrete = NonNull::from(concrete);

    //  The view itself retains the provenance of the whole object, prefer it whenever it is the concrete object.
    let ptr = if concrete.cast::<u8>() == view.cast::<u8>() {
        view.cast::<T>()
    } else {
        concrete
    };

    //  Safety:
    //  -   Valid: `ptr` is derived from the view, which lives as long as the owner.
    //  -   Compatible: the owned object is the one `source` already exposes.
    //  -   Outlives: `T` is `'static`, as is the view of `source`.
    unsafe { Shared::alias(source, ptr) }
}

/// Narrows `source` to `T`, without checking.
///
/// Returns an empty handle if `source` is empty.
///
/// #   Safety
///
/// -   Valid: the view of `source` SHALL point to a valid `T`.
/// -   Outlives: any lifetime the object owned by `source` depends on SHALL outlive the result.
#[inline]
pub unsafe fn static_pointer_cast<T, U>(source: &Shared<U>) -> Shared<T>
where
    U: ?Sized,
{
    let Some(view) = Shared::as_ptr(source) else { return Shared::null() };

    //  Safety:
    //  -   Valid & Outlives: as per pre-conditions.
    //  -   Compatible: the owned object is the one `source` already exposes.
    unsafe { Shared::alias(source, view.cast::<T>()) }
}

/// Reinterprets the view of `source` as a `T`.
///
/// Returns an empty handle if `source` is empty.
///
/// #   Safety
///
/// -   Valid: the bytes of the view of `source` SHALL be a valid `T`, suitably aligned, for as long as the owner is
///     alive.
/// -   Compatible: `T` SHALL NOT allow more thread-safety than the owned object does.
/// -   Outlives: any lifetime the object owned by `source` depends on SHALL outlive the result.
#[inline]
pub unsafe fn reinterpret_pointer_cast<T, U>(source: &Shared<U>) -> Shared<T>
where
    U: ?Sized,
{
    let Some(view) = Shared::as_ptr(source) else { return Shared::null() };

    //  Safety:
    //  -   Valid, Compatible & Outlives: as per pre-conditions.
    unsafe { Shared::alias(source, view.cast::<T>()) }
}

/// Removes the immutability of the view of `source`.
///
/// #   Safety
///
/// See `Shared::get_mut_unchecked`.
#[inline(always)]
pub unsafe fn const_pointer_cast<T>(source: &mut Shared<T>) -> &mut T
where
    T: ?Sized,
{
    //  Safety:
    //  -   As per pre-conditions.
    unsafe { Shared::get_mut_unchecked(source) }
}

// mod tests
