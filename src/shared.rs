//! Shared-ownership handle, equivalent of `Arc<T>` with aliasing and pluggable deleters.
//!
//! A `Shared<T>` is made of two pointers:
//!
//! -   The view, the object exposed through `Deref`.
//! -   The owner, the control block which is kept alive by the handle.
//!
//! In general the view is the owned object, but aliasing constructions (`alias`, `map`, casts) may expose a part of
//! the owned object, or a different view of it, while keeping the whole object alive.

use core::{
    cmp, fmt, hash,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops,
    ptr::NonNull,
};

use alloc::boxed::Box;

use crate::{
    block::{ControlBlock, Fused, Separate},
    error::null_dereference,
    unique::address,
    DefaultDelete, Deleter, OwnershipError, Unique,
};

/// A shared-ownership handle.
///
/// If the handle is empty, it has neither view nor owner. Otherwise, the owner's count accounts for this handle, and
/// the view remains valid for as long as the handle is alive.
pub struct Shared<T>
where
    T: ?Sized,
{
    view: Option<NonNull<T>>,
    owner: Option<NonNull<ControlBlock>>,
    _marker: PhantomData<T>,
}

/// A fused block, allocated for a `Shared<T>`, whose object is not yet initialized.
///
/// Dropping it releases the memory, without running any destructor.
pub struct SharedUninit<T> {
    block: NonNull<u8>,
    _marker: PhantomData<T>,
}

/// Orders, compares, and hashes `Shared` handles by owner, rather than by view.
///
/// Two handles aliasing different parts of the same object are equal by owner, and thus may be used as keys in
/// associative containers keyed by object identity.
pub struct ByOwner<T>(pub Shared<T>)
where
    T: ?Sized;

//
//  Conversion
//

impl<T> Shared<T>
where
    T: ?Sized,
{
    /// Constructs an instance taking ownership of `ptr`, released by `DefaultDelete`.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL have been obtained from `Box::into_raw`, and be owned by the caller.
    #[inline(always)]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        //  Safety:
        //  -   Owned: as per pre-condition, suitable for `DefaultDelete`.
        unsafe { Self::from_raw_with(ptr, DefaultDelete) }
    }

    /// Constructs an instance taking ownership of `ptr`, to be destroyed by `deleter` once the last owner is gone.
    ///
    /// The control block is allocated separately from the object.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for `deleter`.
    #[inline]
    pub unsafe fn from_raw_with<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        let owner = Separate::allocate(ptr, deleter);

        //  Safety:
        //  -   Accounting: the freshly allocated block has a count of 1, accounted for by the new handle.
        //  -   Valid: `ptr` is owned by the block.
        unsafe { Self::from_parts(ptr, owner) }
    }

    /// Constructs an instance taking ownership of the content of `boxed`.
    #[inline]
    pub fn from_box(boxed: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(boxed));

        //  Safety:
        //  -   Owned: freshly released by `Box`.
        unsafe { Self::from_raw(ptr) }
    }

    /// Constructs an instance taking ownership of the object of `unique`, and its deleter.
    ///
    /// If `unique` is null, the result is empty.
    #[inline]
    pub fn from_unique<D>(unique: Unique<T, D>) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        let (ptr, deleter) = unique.into_raw_with_deleter();

        let Some(ptr) = ptr else { return Self::null() };

        //  Safety:
        //  -   Owned: relinquished by `unique`, which was using `deleter`.
        unsafe { Self::from_raw_with(ptr, deleter) }
    }

    /// Constructs an instance from its raw parts.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the count of `owner` SHALL already account for the new handle.
    /// -   Valid: `view` SHALL remain valid for as long as `owner` is alive.
    #[inline(always)]
    pub(crate) unsafe fn from_parts(view: NonNull<T>, owner: NonNull<ControlBlock>) -> Self {
        let (view, owner) = (Some(view), Some(owner));
        let _marker = PhantomData;

        Self { view, owner, _marker }
    }

    /// Returns the owner of the handle, if any.
    #[inline(always)]
    pub(crate) fn owner(this: &Self) -> Option<NonNull<ControlBlock>> {
        this.owner
    }
}

impl<T, D> From<Unique<T, D>> for Shared<T>
where
    T: ?Sized,
    D: Deleter<T> + Send + 'static,
{
    fn from(unique: Unique<T, D>) -> Self {
        Self::from_unique(unique)
    }
}

impl<T> From<Box<T>> for Shared<T>
where
    T: ?Sized,
{
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

//
//  Construction
//

impl<T> Shared<T> {
    /// Allocates a fused block on the heap, and then places `value` into it.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory. Use `try_new` to handle failures gracefully.
    #[inline]
    pub fn new(value: T) -> Self {
        SharedUninit::new().write(value)
    }

    /// Attempts to allocate a fused block on the heap, and then places `value` into it.
    ///
    /// Returns an error if the allocation fails. Use `new` for a panicking version instead.
    #[inline]
    pub fn try_new(value: T) -> Result<Self, OwnershipError> {
        SharedUninit::try_new().map(|uninit| uninit.write(value))
    }

    /// Allocates a fused block on the heap, and then places the result of `constructor` into it.
    ///
    /// The memory is allocated prior to invoking `constructor`, and released if `constructor` panics, in which case
    /// no destructor is run.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory, or if `constructor` panics.
    #[inline]
    pub fn new_with<F>(constructor: F) -> Self
    where
        F: FnOnce() -> T,
    {
        let uninit = SharedUninit::new();

        let value = constructor();

        uninit.write(value)
    }

    /// Allocates a fused block on the heap, and then places the result of `constructor` into it, if successful.
    ///
    /// The memory is allocated prior to invoking `constructor`, and released if `constructor` fails or panics, in
    /// which case no destructor is run.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory, or if `constructor` panics.
    #[inline]
    pub fn try_new_with<F, E>(constructor: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let uninit = SharedUninit::new();

        let value = constructor()?;

        Ok(uninit.write(value))
    }

    /// Allocates a fused block on the heap, leaving the object uninitialized.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory.
    #[inline(always)]
    pub fn new_uninit() -> SharedUninit<T> {
        SharedUninit::new()
    }
}

impl<T> Shared<T>
where
    T: ?Sized,
{
    /// Constructs an empty instance.
    #[inline(always)]
    pub const fn null() -> Self {
        Self {
            view: None,
            owner: None,
            _marker: PhantomData,
        }
    }

    /// Constructs an instance sharing the owner of `other`, while exposing `ptr`.
    ///
    /// If `other` is empty, the result is empty.
    ///
    /// #   Safety
    ///
    /// -   Valid: `ptr` SHALL remain valid for as long as the owner of `other` is alive.
    /// -   Compatible: the object owned by `other` SHALL be safe to drop on any thread the result is sent to.
    /// -   Outlives: any lifetime the object owned by `other` depends on SHALL outlive the result.
    #[inline]
    pub unsafe fn alias<U>(other: &Shared<U>, ptr: NonNull<T>) -> Self
    where
        U: ?Sized,
    {
        let Some(owner) = other.owner else { return Self::null() };

        //  Safety:
        //  -   Alive: `other` owns the block.
        //  -   Accounting: the extra owner is the new handle.
        unsafe { owner.as_ref().increment() };

        //  Safety:
        //  -   Accounting: incremented just above.
        //  -   Valid: as per pre-condition.
        unsafe { Self::from_parts(ptr, owner) }
    }

    /// Constructs an instance taking over the owner of `other`, while exposing `ptr`.
    ///
    /// If `other` is empty, the result is empty.
    ///
    /// #   Safety
    ///
    /// -   Valid: `ptr` SHALL remain valid for as long as the owner of `other` is alive.
    /// -   Compatible: the object owned by `other` SHALL be safe to drop on any thread the result is sent to.
    /// -   Outlives: any lifetime the object owned by `other` depends on SHALL outlive the result.
    #[inline]
    pub unsafe fn alias_from<U>(other: Shared<U>, ptr: NonNull<T>) -> Self
    where
        U: ?Sized,
    {
        let other = ManuallyDrop::new(other);

        let Some(owner) = other.owner else { return Self::null() };

        //  Safety:
        //  -   Accounting: the count of `other` is transferred to the new handle, as `other` is never dropped.
        //  -   Valid: as per pre-condition.
        unsafe { Self::from_parts(ptr, owner) }
    }

    /// Projects the view of `this` through `projection`, keeping the whole object alive.
    ///
    /// This covers both upcasts, such as `Shared<T>` to `Shared<dyn Trait>`, and member access.
    ///
    /// If `this` is empty, the result is empty and `projection` is not invoked.
    #[inline]
    pub fn map<U, F>(this: Self, projection: F) -> Shared<U>
    where
        T: Send + Sync + 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        let Some(view) = this.view else { return Shared::null() };

        //  Safety:
        //  -   Convertible: alive & guarded shared access.
        let projected = NonNull::from(projection(unsafe { view.as_ref() }));

        //  Safety:
        //  -   Valid: the projection is derived from the object, or outlives any borrow of it.
        //  -   Compatible & Outlives: `T` is `Send`, `Sync` and `'static`.
        unsafe { Shared::alias_from(this, projected) }
    }
}

impl<T> Clone for Shared<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        if let Some(owner) = self.owner {
            //  Safety:
            //  -   Alive: `self` owns the block.
            //  -   Accounting: the extra owner is the clone.
            unsafe { owner.as_ref().increment() };
        }

        Self {
            view: self.view,
            owner: self.owner,
            _marker: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.owner == source.owner && address(self.view) == address(source.view) {
            return;
        }

        *self = source.clone();
    }
}

impl<T> Default for Shared<T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Self::null()
    }
}

//
//  Destruction
//

impl<T> Drop for Shared<T>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        Self::reset(self);
    }
}

//
//  Ownership
//

impl<T> Shared<T>
where
    T: ?Sized,
{
    /// Releases the ownership of `this`, finalizing the object if `this` was its last owner.
    ///
    /// The handle is empty afterwards.
    #[inline]
    pub fn reset(this: &mut Self) {
        this.view = None;

        let Some(owner) = this.owner.take() else { return };

        //  Safety:
        //  -   Accounting: `this` relinquished its ownership just above.
        unsafe { ControlBlock::decrement(owner) };
    }

    /// Replaces the object of `this` by the content of `boxed`.
    ///
    /// The new control block is allocated before the previous ownership is released.
    #[inline]
    pub fn reset_box(this: &mut Self, boxed: Box<T>) {
        *this = Self::from_box(boxed);
    }

    /// Replaces the object of `this` by `ptr`, to be destroyed by `deleter`.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for `deleter`.
    #[inline]
    pub unsafe fn reset_raw<D>(this: &mut Self, ptr: NonNull<T>, deleter: D)
    where
        D: Deleter<T> + Send + 'static,
    {
        //  Safety:
        //  -   Owned: as per pre-condition.
        *this = unsafe { Self::from_raw_with(ptr, deleter) };
    }

    /// Moves the ownership out of `this`, leaving an empty handle behind.
    #[inline(always)]
    pub fn take(this: &mut Self) -> Self {
        mem::replace(this, Self::null())
    }

    /// Swaps the views, and owners, of `this` and `other`.
    #[inline(always)]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }
}

//
//  High-level Access
//

impl<T> Shared<T>
where
    T: ?Sized,
{
    /// Returns whether the handle is empty.
    #[inline(always)]
    pub const fn is_null(this: &Self) -> bool {
        this.owner.is_none()
    }

    /// Returns the number of handles sharing the owner of `this`, or 0 if empty.
    ///
    /// The number is a snapshot, which may be stale by the time it is returned if other threads concurrently clone or
    /// drop handles sharing the same owner.
    #[inline(always)]
    pub fn use_count(this: &Self) -> u64 {
        //  Safety:
        //  -   Alive: `this` owns the block.
        this.owner.map_or(0, |owner| unsafe { owner.as_ref().count() })
    }

    /// Returns whether `this` is the one and only owner of its object.
    #[inline(always)]
    pub fn is_unique(this: &Self) -> bool {
        Self::use_count(this) == 1
    }

    /// Returns a pointer to the view, if any.
    #[inline(always)]
    pub const fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.view
    }

    /// Returns a reference to the view, if any.
    #[inline(always)]
    pub fn as_ref(this: &Self) -> Option<&T> {
        //  Safety:
        //  -   Convertible: alive & guarded shared access.
        this.view.map(|view| unsafe { view.as_ref() })
    }

    /// Returns a reference to the view, without checking for emptiness.
    ///
    /// #   Safety
    ///
    /// -   NonNull: `this` SHALL NOT be empty.
    #[inline(always)]
    pub unsafe fn as_ref_unchecked(this: &Self) -> &T {
        //  Safety:
        //  -   NonNull: as per pre-condition.
        let view = unsafe { this.view.unwrap_unchecked() };

        //  Safety:
        //  -   Convertible: alive & guarded shared access.
        unsafe { view.as_ref() }
    }

    /// Returns a mutable reference to the view, removing the immutability of shared access.
    ///
    /// #   Safety
    ///
    /// -   NonNull: `this` SHALL NOT be empty.
    /// -   Exclusive: no other reference to the view, through any handle, SHALL be alive while the result is.
    /// -   InPlace: the object SHALL NOT be swapped or replaced through the result, only mutated.
    #[inline(always)]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        //  Safety:
        //  -   NonNull: as per pre-condition.
        let mut view = unsafe { this.view.unwrap_unchecked() };

        //  Safety:
        //  -   Convertible: alive, and exclusive as per pre-condition.
        unsafe { view.as_mut() }
    }
}

//
//  Owner Access
//

impl<T> Shared<T>
where
    T: ?Sized,
{
    /// Returns whether the owner of `this` is ordered before the owner of `other`.
    ///
    /// The order is a strict weak order on owners, independent of the views.
    #[inline(always)]
    pub fn owner_before<U>(this: &Self, other: &Shared<U>) -> bool
    where
        U: ?Sized,
    {
        address(this.owner) < address(other.owner)
    }

    /// Returns whether `this` and `other` share the same owner, or are both empty.
    #[inline(always)]
    pub fn owner_eq<U>(this: &Self, other: &Shared<U>) -> bool
    where
        U: ?Sized,
    {
        address(this.owner) == address(other.owner)
    }

    /// Compares the owners of `this` and `other`.
    #[inline(always)]
    pub fn owner_cmp<U>(this: &Self, other: &Shared<U>) -> cmp::Ordering
    where
        U: ?Sized,
    {
        address(this.owner).cmp(&address(other.owner))
    }
}

//
//  Value Access
//

impl<T> ops::Deref for Shared<T>
where
    T: ?Sized,
{
    type Target = T;

    /// #   Panics
    ///
    /// If the handle is empty.
    #[track_caller]
    fn deref(&self) -> &T {
        match Self::as_ref(self) {
            Some(value) => value,
            None => null_dereference(),
        }
    }
}

//
//  Formatting
//

impl<T> fmt::Debug for Shared<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Shared")
            .field("value", &Self::as_ref(self))
            .field("use_count", &Self::use_count(self))
            .finish()
    }
}

impl<T> fmt::Pointer for Shared<T>
where
    T: ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt::Pointer::fmt(&address(self.view), f)
    }
}

//
//  Identity
//
//  Handles compare by view address, not by value nor by owner.
//

impl<T, U> PartialEq<Shared<U>> for Shared<T>
where
    T: ?Sized,
    U: ?Sized,
{
    #[inline(always)]
    fn eq(&self, other: &Shared<U>) -> bool {
        address(self.view) == address(other.view)
    }
}

impl<T> Eq for Shared<T> where T: ?Sized {}

impl<T> hash::Hash for Shared<T>
where
    T: ?Sized,
{
    #[inline(always)]
    fn hash<HS>(&self, hasher: &mut HS)
    where
        HS: hash::Hasher,
    {
        hash::Hash::hash(&address(self.view), hasher);
    }
}

//
//  Ordering
//

impl<T, U> PartialOrd<Shared<U>> for Shared<T>
where
    T: ?Sized,
    U: ?Sized,
{
    #[inline(always)]
    fn partial_cmp(&self, other: &Shared<U>) -> Option<cmp::Ordering> {
        Some(address(self.view).cmp(&address(other.view)))
    }
}

impl<T> Ord for Shared<T>
where
    T: ?Sized,
{
    #[inline(always)]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        address(self.view).cmp(&address(other.view))
    }
}

//
//  Markers
//

impl<T> Unpin for Shared<T> where T: ?Sized {}

//  Safety: as Arc.
unsafe impl<T> Send for Shared<T> where T: ?Sized + Send + Sync {}

//  Safety: as Arc.
unsafe impl<T> Sync for Shared<T> where T: ?Sized + Send + Sync {}

//
//  SharedUninit
//

impl<T> SharedUninit<T> {
    /// Allocates a fused block on the heap.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory. Use `try_new` to handle failures gracefully.
    #[inline(always)]
    pub fn new() -> Self {
        let block = Fused::<T>::allocate();

        Self {
            block,
            _marker: PhantomData,
        }
    }

    /// Attempts to allocate a fused block on the heap.
    ///
    /// Returns an error if the allocation fails. Use `new` for a panicking version instead.
    #[inline(always)]
    pub fn try_new() -> Result<Self, OwnershipError> {
        let block = Fused::<T>::try_allocate()?;

        Ok(Self {
            block,
            _marker: PhantomData,
        })
    }

    /// Returns a pointer to the uninitialized object, suitably aligned.
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        //  Safety:
        //  -   Suitable: allocated by `Fused::<T>`.
        unsafe { Fused::<T>::value(self.block).as_ptr() }
    }

    /// Initializes the object with `value`, and converts into a `Shared<T>`.
    #[inline]
    pub fn write(mut self, value: T) -> Shared<T> {
        //  Safety:
        //  -   Valid & Aligned: as per `as_mut_ptr`.
        unsafe { self.as_mut_ptr().write(value) };

        //  Safety:
        //  -   Initialized: just written.
        unsafe { self.assume_init() }
    }

    /// Converts into a `Shared<T>`, considering the object initialized.
    ///
    /// #   Safety
    ///
    /// -   Initialized: the object SHALL have been fully initialized through `as_mut_ptr`.
    #[inline]
    pub unsafe fn assume_init(self) -> Shared<T> {
        let this = ManuallyDrop::new(self);

        //  Safety:
        //  -   Suitable: allocated by `Fused::<T>`.
        //  -   Initialized: as per pre-condition.
        //  -   Once: `this` is consumed.
        let (value, owner) = unsafe { Fused::<T>::place(this.block) };

        //  Safety:
        //  -   Accounting: the freshly placed header has a count of 1, accounted for by the new handle.
        //  -   Valid: the object is owned by the block.
        unsafe { Shared::from_parts(value, owner) }
    }
}

impl<T> Default for SharedUninit<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SharedUninit<T> {
    fn drop(&mut self) {
        log::debug!("releasing uninitialized fused block {:p}", self.block);

        //  Safety:
        //  -   Suitable: allocated by `Fused::<T>`.
        //  -   EndOfLife: `self` is being dropped, and never placed a header.
        unsafe { Fused::<T>::deallocate(self.block) };
    }
}

impl<T> fmt::Debug for SharedUninit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("SharedUninit").field("block", &self.block).finish()
    }
}

//  Safety: the block is uniquely owned, as a `Box<MaybeUninit<T>>`.
unsafe impl<T> Send for SharedUninit<T> where T: Send {}

//  Safety: the block is uniquely owned, as a `Box<MaybeUninit<T>>`.
unsafe impl<T> Sync for SharedUninit<T> where T: Sync {}

//
//  ByOwner
//

impl<T> Clone for ByOwner<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for ByOwner<T>
where
    T: ?Sized + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("ByOwner").field(&self.0).finish()
    }
}

impl<T, U> PartialEq<ByOwner<U>> for ByOwner<T>
where
    T: ?Sized,
    U: ?Sized,
{
    #[inline(always)]
    fn eq(&self, other: &ByOwner<U>) -> bool {
        Shared::owner_eq(&self.0, &other.0)
    }
}

impl<T> Eq for ByOwner<T> where T: ?Sized {}

impl<T> hash::Hash for ByOwner<T>
where
    T: ?Sized,
{
    #[inline(always)]
    fn hash<HS>(&self, hasher: &mut HS)
    where
        HS: hash::Hasher,
    {
        hash::Hash::hash(&address(self.0.owner), hasher);
    }
}

impl<T, U> PartialOrd<ByOwner<U>> for ByOwner<T>
where
    T: ?Sized,
    U: ?Sized,
{
    #[inline(always)]
    fn partial_cmp(&self, other: &ByOwner<U>) -> Option<cmp::Ordering> {
        Some(Shared::owner_cmp(&self.0, &other.0))
    }
}

impl<T> Ord for ByOwner<T>
where
    T: ?Sized,
{
    #[inline(always)]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        Shared::owner_cmp(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use core::{
        cell::Cell,
        fmt::Debug,
        sync::atomic::{AtomicU32, Ordering},
    };

    use super::*;

    #[test]
    fn decons_vanilla() {
        let shared = Shared::new(value());

        assert_eq!(1, Shared::use_count(&shared));
        assert!(Shared::is_unique(&shared));
        assert_eq!("Hello, World!", &*shared);
    }

    #[test]
    fn decons_box() {
        let shared: Shared<dyn Debug> = Shared::from_box(Box::new(value()));

        assert_eq!(1, Shared::use_count(&shared));
    }

    #[test]
    fn decons_zst() {
        let shared = Shared::new(());

        assert_eq!(1, Shared::use_count(&shared));
    }

    #[test]
    fn decons_null() {
        let shared: Shared<String> = Shared::null();

        assert!(Shared::is_null(&shared));
        assert!(!Shared::is_unique(&shared));
        assert_eq!(0, Shared::use_count(&shared));
        assert_eq!(None, Shared::as_ref(&shared));
    }

    #[test]
    #[should_panic]
    fn deref_null() {
        let shared: Shared<String> = Shared::null();

        let _ = shared.len();
    }

    #[test]
    fn clone_counts() {
        let shared = Shared::new(value());

        let clones: Vec<_> = (0..3).map(|_| shared.clone()).collect();

        assert_eq!(4, Shared::use_count(&shared));

        drop(clones);

        assert_eq!(1, Shared::use_count(&shared));
    }

    #[test]
    fn clone_from_self_is_noop() {
        let mut shared = Shared::new(value());
        let other = shared.clone();

        shared.clone_from(&other);

        assert_eq!(2, Shared::use_count(&shared));
    }

    #[test]
    fn take_empties_source() {
        let mut source = Shared::new(value());
        let _copy = source.clone();

        let destination = Shared::take(&mut source);

        assert!(Shared::is_null(&source));
        assert_eq!(0, Shared::use_count(&source));
        assert_eq!(2, Shared::use_count(&destination));
    }

    #[test]
    fn reset_finalizes_last() {
        let dropped = Cell::new(0);

        let mut first = Shared::new(Tracker(&dropped));
        let mut second = first.clone();

        Shared::reset(&mut first);

        assert!(Shared::is_null(&first));
        assert_eq!(0, dropped.get());

        Shared::reset(&mut second);

        assert_eq!(1, dropped.get());
    }

    #[test]
    fn reset_box_replaces() {
        let mut shared = Shared::new(String::from("Hello"));

        Shared::reset_box(&mut shared, Box::new(String::from("World")));

        assert_eq!("World", &*shared);
        assert_eq!(1, Shared::use_count(&shared));
    }

    #[test]
    fn from_unique_keeps_deleter() {
        static DELETED: AtomicU32 = AtomicU32::new(0);

        let deleter = |ptr: NonNull<u32>| {
            DELETED.fetch_add(1, Ordering::Relaxed);

            //  Safety:
            //  -   Owned: leaked below.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let ptr = NonNull::from(Box::leak(Box::new(7u32)));

        //  Safety:
        //  -   Owned: freshly leaked.
        let unique = unsafe { Unique::from_raw_with(ptr, deleter) };

        let shared = Shared::from_unique(unique);

        assert_eq!(7, *shared);
        assert_eq!(Some(ptr), Shared::as_ptr(&shared));

        let copy = shared.clone();

        drop(shared);

        assert_eq!(0, DELETED.load(Ordering::Relaxed));

        drop(copy);

        assert_eq!(1, DELETED.load(Ordering::Relaxed));
    }

    #[test]
    fn from_unique_null() {
        let unique: Unique<u32> = Unique::null();

        let shared = Shared::from(unique);

        assert!(Shared::is_null(&shared));
    }

    #[test]
    fn map_keeps_owner_alive() {
        let shared = Shared::new((String::from("Hello"), String::from("World")));
        let witness = shared.clone();

        let second = Shared::map(shared, |pair| &pair.1);

        assert_eq!("World", &*second);
        assert_eq!(2, Shared::use_count(&second));
        assert!(Shared::owner_eq(&second, &witness));
        assert!(second != witness);

        drop(witness);

        assert_eq!("World", &*second);
        assert!(Shared::is_unique(&second));
    }

    #[test]
    fn map_upcasts() {
        let shared = Shared::new(value());

        let debug: Shared<dyn Debug + Send + Sync> =
            Shared::map(shared, |s| s as &(dyn Debug + Send + Sync + 'static));

        assert_eq!("\"Hello, World!\"", format!("{:?}", &*debug));
    }

    #[test]
    fn map_null() {
        let shared: Shared<(u32, u32)> = Shared::null();

        let mapped = Shared::map(shared, |pair| &pair.0);

        assert!(Shared::is_null(&mapped));
    }

    #[test]
    fn alias_null() {
        let shared: Shared<u32> = Shared::null();
        let ptr = NonNull::from(&42u32);

        //  Safety:
        //  -   Valid: the result is empty.
        let alias = unsafe { Shared::alias(&shared, ptr) };

        assert!(Shared::is_null(&alias));
        assert_eq!(None, Shared::as_ptr(&alias));
    }

    #[test]
    fn compare_by_view() {
        let one = Shared::new(1u32);
        let other = Shared::new(1u32);
        let null: Shared<u32> = Shared::null();

        assert_ne!(one, other);
        assert_eq!(one, one.clone());
        assert!(null < one);
        assert_eq!(Shared::owner_before(&one, &other), Shared::owner_cmp(&one, &other).is_lt());
    }

    #[test]
    fn by_owner_groups_aliases() {
        let shared = Shared::new((1u32, 2u32));

        let first = Shared::map(shared.clone(), |pair| &pair.0);
        let second = Shared::map(shared.clone(), |pair| &pair.1);

        assert!(first != second);
        assert!(ByOwner(first) == ByOwner(second));
    }

    #[test]
    fn uninit_write() {
        let mut uninit = Shared::<u64>::new_uninit();

        assert_eq!(0, (uninit.as_mut_ptr() as usize) % core::mem::align_of::<u64>());

        let shared = uninit.write(42);

        assert_eq!(42, *shared);
    }

    #[test]
    fn uninit_drop_runs_no_destructor() {
        let dropped = Cell::new(0);

        let uninit = SharedUninit::<Tracker<'_>>::new();

        drop(uninit);

        assert_eq!(0, dropped.get());
    }

    #[test]
    fn try_new_with_failure() {
        let dropped = Cell::new(0);

        let result: Result<Shared<Tracker<'_>>, &str> = Shared::try_new_with(|| Err("nope"));

        assert_eq!(Some("nope"), result.err());
        assert_eq!(0, dropped.get());
    }

    #[test]
    fn try_new_with_success() {
        let dropped = Cell::new(0);

        let result: Result<_, ()> = Shared::try_new_with(|| Ok(Tracker(&dropped)));

        assert!(result.is_ok());

        drop(result);

        assert_eq!(1, dropped.get());
    }

    struct Tracker<'a>(&'a Cell<u32>);

    impl Drop for Tracker<'_> {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn value() -> String {
        String::from("Hello, World!")
    }
} // mod tests
