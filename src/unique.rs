//! Exclusive-ownership handle, equivalent of `Box<T>` with a pluggable deleter.
//!
//! Contrary to `Box<T>`, a `Unique<T, D>` may be null, and is destroyed by its deleter strategy `D`.

use core::{
    cmp, fmt, hash,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops, panic,
    ptr::{self, NonNull},
};

use alloc::boxed::Box;

use crate::{deleter::DeleterName, error::null_dereference, DefaultDelete, Deleter};

/// The exclusive-ownership equivalent of `[T]`, released by `DefaultDelete` unless specified otherwise.
pub type UniqueArray<T, D = DefaultDelete> = Unique<[T], D>;

/// An exclusive-ownership handle.
///
/// At most one `Unique` observes a given non-null pointer; the deleter is invoked exactly once on this pointer, when
/// the handle is dropped or reset.
pub struct Unique<T, D = DefaultDelete>
where
    T: ?Sized,
    D: Deleter<T>,
{
    ptr: Option<NonNull<T>>,
    deleter: D,
    _marker: PhantomData<T>,
}

//
//  Conversion
//

impl<T, D> Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Constructs an instance taking ownership of `ptr`, with a default constructed deleter.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for `D`.
    #[inline(always)]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self
    where
        D: Default,
    {
        //  Safety:
        //  -   Owned: as per pre-condition.
        unsafe { Self::from_raw_with(ptr, D::default()) }
    }

    /// Constructs an instance taking ownership of `ptr`, to be destroyed by `deleter`.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for `deleter`.
    #[inline(always)]
    pub unsafe fn from_raw_with(ptr: NonNull<T>, deleter: D) -> Self {
        let ptr = Some(ptr);
        let _marker = PhantomData;

        Self { ptr, deleter, _marker }
    }

    /// Deconstructs the instance, returning the pointer and deleter.
    ///
    /// The deleter is not invoked, the caller becomes responsible for the object, if any.
    #[inline]
    pub fn into_raw_with_deleter(self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(self);

        //  Safety:
        //  -   Valid: `this.deleter` is initialized.
        //  -   Once: `this` is never dropped, hence `deleter` is only moved out once.
        let deleter = unsafe { ptr::read(&this.deleter) };

        (this.ptr, deleter)
    }
}

impl<T> Unique<T, DefaultDelete>
where
    T: ?Sized,
{
    /// Constructs an instance taking ownership of the content of `boxed`.
    #[inline(always)]
    pub fn from_box(boxed: Box<T>) -> Self {
        //  Safety:
        //  -   NonNull: `Box::into_raw` never returns a null pointer.
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };

        //  Safety:
        //  -   Owned: freshly released by `Box`.
        unsafe { Self::from_raw_with(ptr, DefaultDelete) }
    }

    /// Converts back into a `Box`, unless null.
    #[inline]
    pub fn into_box(self) -> Option<Box<T>> {
        let (ptr, _) = self.into_raw_with_deleter();

        //  Safety:
        //  -   Owned: `DefaultDelete` pointers are obtained from `Box::into_raw`, and the handle relinquished it.
        ptr.map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

//
//  Construction
//

impl<T> Unique<T, DefaultDelete> {
    /// Allocates memory on the heap and then places `value` into it.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory.
    #[inline(always)]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T, D> Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Constructs a null instance.
    #[inline(always)]
    pub fn null() -> Self
    where
        D: Default,
    {
        Self::null_with(D::default())
    }

    /// Constructs a null instance, with a specific deleter.
    #[inline(always)]
    pub const fn null_with(deleter: D) -> Self {
        Self {
            ptr: None,
            deleter,
            _marker: PhantomData,
        }
    }
}

impl<T, D> Default for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T> + Default,
{
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Box<T>> for Unique<T, DefaultDelete>
where
    T: ?Sized,
{
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

//
//  Destruction
//

impl<T, D> Drop for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    fn drop(&mut self) {
        self.reset();
    }
}

//
//  Ownership
//

impl<T, D> Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Relinquishes ownership of the pointer, if any, without invoking the deleter.
    ///
    /// The handle is null afterwards.
    #[inline(always)]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Destroys the current object, if any.
    ///
    /// The handle is null afterwards.
    #[inline]
    pub fn reset(&mut self) {
        let Some(ptr) = self.ptr.take() else { return };

        //  Safety:
        //  -   Owned: the handle owned `ptr` until just now.
        //  -   EndOfLife: `ptr` was taken out of the handle.
        unsafe { self.deleter.delete(ptr) };
    }

    /// Destroys the current object, if any, and takes ownership of `ptr` instead.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for the deleter.
    /// -   Distinct: `ptr` SHALL NOT be the pointer currently owned by this handle.
    #[inline]
    pub unsafe fn reset_raw(&mut self, ptr: NonNull<T>) {
        //  The handle is updated prior to invoking the deleter, so it never observes a destroyed object.
        let Some(previous) = self.ptr.replace(ptr) else { return };

        debug_assert!(previous.cast::<u8>() != ptr.cast::<u8>(), "reset to the owned pointer");

        //  Safety:
        //  -   Owned: the handle owned `previous` until just now.
        //  -   EndOfLife: `previous` was replaced.
        unsafe { self.deleter.delete(previous) };
    }

    /// Moves the object out of `self`, leaving a null handle behind.
    #[inline]
    pub fn take(&mut self) -> Self
    where
        D: Default,
    {
        mem::replace(self, Self::null())
    }

    /// Swaps the objects, and deleters, of `self` and `other`.
    #[inline(always)]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

//
//  High-level Access
//

impl<T, D> Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Returns whether the handle is null.
    #[inline(always)]
    pub const fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns a pointer to the object, if any.
    #[inline(always)]
    pub const fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Returns a reference to the object, if any.
    #[inline(always)]
    pub fn as_ref(&self) -> Option<&T> {
        //  Safety:
        //  -   Convertible: alive & guarded shared access.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns a mutable reference to the object, if any.
    #[inline(always)]
    pub fn as_mut(&mut self) -> Option<&mut T> {
        //  Safety:
        //  -   Convertible: alive & guarded exclusive access.
        self.ptr.map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Returns a reference to the object, without checking for null.
    ///
    /// #   Safety
    ///
    /// -   NonNull: the handle SHALL NOT be null.
    #[inline(always)]
    pub unsafe fn as_ref_unchecked(&self) -> &T {
        //  Safety:
        //  -   NonNull: as per pre-condition.
        let ptr = unsafe { self.ptr.unwrap_unchecked() };

        //  Safety:
        //  -   Convertible: alive & guarded shared access.
        unsafe { ptr.as_ref() }
    }

    /// Returns a reference to the deleter.
    #[inline(always)]
    pub const fn deleter(&self) -> &D {
        &self.deleter
    }

    /// Returns a mutable reference to the deleter.
    #[inline(always)]
    pub fn deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }
}

//
//  Value Access
//

impl<T, D> ops::Deref for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    type Target = T;

    /// #   Panics
    ///
    /// If the handle is null.
    #[track_caller]
    fn deref(&self) -> &T {
        match self.as_ref() {
            Some(value) => value,
            None => null_dereference(),
        }
    }
}

impl<T, D> ops::DerefMut for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// #   Panics
    ///
    /// If the handle is null.
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.as_mut() {
            Some(value) => value,
            None => null_dereference(),
        }
    }
}

//
//  Formatting
//

impl<T, D> fmt::Debug for Unique<T, D>
where
    T: ?Sized + fmt::Debug,
    D: Deleter<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Unique")
            .field("value", &self.as_ref())
            .field("deleter", &DeleterName::<D>::new())
            .finish()
    }
}

impl<T, D> fmt::Pointer for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt::Pointer::fmt(&address(self.ptr), f)
    }
}

//
//  Identity
//
//  Handles compare by address, not by value.
//

impl<T, D, U, E> PartialEq<Unique<U, E>> for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
    U: ?Sized,
    E: Deleter<U>,
{
    #[inline(always)]
    fn eq(&self, other: &Unique<U, E>) -> bool {
        address(self.ptr) == address(other.ptr)
    }
}

impl<T, D> Eq for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
}

impl<T, D> hash::Hash for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    #[inline(always)]
    fn hash<HS>(&self, hasher: &mut HS)
    where
        HS: hash::Hasher,
    {
        hash::Hash::hash(&address(self.ptr), hasher);
    }
}

//
//  Ordering
//

impl<T, D, U, E> PartialOrd<Unique<U, E>> for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
    U: ?Sized,
    E: Deleter<U>,
{
    #[inline(always)]
    fn partial_cmp(&self, other: &Unique<U, E>) -> Option<cmp::Ordering> {
        Some(address(self.ptr).cmp(&address(other.ptr)))
    }
}

impl<T, D> Ord for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    #[inline(always)]
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        address(self.ptr).cmp(&address(other.ptr))
    }
}

//
//  Markers
//

//  Safety: as Box.
impl<T, D> Unpin for Unique<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
}

//  Safety: as Box.
impl<T, D> panic::RefUnwindSafe for Unique<T, D>
where
    T: ?Sized + panic::RefUnwindSafe,
    D: Deleter<T> + panic::RefUnwindSafe,
{
}

//  Safety: as Box.
impl<T, D> panic::UnwindSafe for Unique<T, D>
where
    T: ?Sized + panic::UnwindSafe,
    D: Deleter<T> + panic::UnwindSafe,
{
}

//  Safety: as Box.
unsafe impl<T, D> Send for Unique<T, D>
where
    T: ?Sized + Send,
    D: Deleter<T> + Send,
{
}

//  Safety: as Box.
unsafe impl<T, D> Sync for Unique<T, D>
where
    T: ?Sized + Sync,
    D: Deleter<T> + Sync,
{
}

//  Thin address, ignoring any metadata.
#[inline(always)]
pub(crate) fn address<T>(ptr: Option<NonNull<T>>) -> *const u8
where
    T: ?Sized,
{
    ptr.map_or(ptr::null(), |ptr| ptr.cast::<u8>().as_ptr() as *const u8)
}

// mod tests
