//! Handles the actual memory finnicky details of reference counting.
//!
//! A control block is a header holding the reference count, followed by whatever its shape requires to finalize the
//! owned object. There are exactly two shapes:
//!
//! -   `Separate`: the block is allocated on its own, and holds the object pointer and its deleter.
//! -   `Fused`: the block and the object share a single allocation, laid out as per `FusedLayout`.
//!
//! The header is always the first field of the shape, and `#[repr(C)]`, so that a pointer to the header is a pointer
//! to the shape. The shape is erased behind the `finalize` function pointer of the header.

use core::{
    alloc::Layout,
    marker::PhantomData,
    ptr::NonNull,
    sync::atomic::{self, AtomicU64, Ordering},
};

use alloc::{
    alloc::{alloc, dealloc, handle_alloc_error},
    boxed::Box,
};

use crate::{Deleter, DropInPlace, FusedLayout, OwnershipError};

/// The header of every control block.
#[repr(C)]
pub(crate) struct ControlBlock {
    count: AtomicU64,
    //  Address of the owned object, whichever view of it the handles expose.
    object: NonNull<u8>,
    finalize: unsafe fn(NonNull<ControlBlock>),
}

impl ControlBlock {
    /// Constructs a header for shape `S`, with a count of 1.
    #[inline(always)]
    fn new<S>(object: NonNull<u8>) -> Self
    where
        S: Shape,
    {
        let count = AtomicU64::new(1);
        let finalize = S::finalize as unsafe fn(NonNull<ControlBlock>);

        Self {
            count,
            object,
            finalize,
        }
    }

    /// Returns the number of owners.
    ///
    /// The count is read with relaxed ordering: it is only a snapshot, and may already be stale by the time it is
    /// returned if other owners concurrently clone or drop their handles.
    #[inline(always)]
    pub(crate) fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the address of the owned object.
    #[inline(always)]
    pub(crate) fn object(&self) -> NonNull<u8> {
        self.object
    }

    /// Increments the count.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller guarantees that the incremented count faithfully represents the number of owners.
    /// -   Alive: the count SHALL be at least 1, that is the caller already owns the block.
    #[inline(always)]
    pub(crate) unsafe fn increment(&self) {
        //  Relaxed is sufficient: the new owner is derived from an existing one, which already keeps the block alive,
        //  and the handle is published to other threads by whatever mechanism transfers it.
        let previous = self.count.fetch_add(1, Ordering::Relaxed);

        debug_assert!(previous > 0, "resurrected a finalized control block");
    }

    /// Increments the count, unless it already reached 0.
    ///
    /// Returns whether the increment succeeded.
    ///
    /// #   Safety
    ///
    /// -   Accounting: on success, the caller guarantees that the incremented count faithfully represents the number
    ///     of owners.
    #[inline]
    pub(crate) unsafe fn try_increment(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);

        //  Once `count` has dropped to 0, the object is being finalized, there's no recovering it, ever.
        while current > 0 {
            let result = self
                .count
                .compare_exchange_weak(current, current + 1, Ordering::Acquire, Ordering::Relaxed);

            match result {
                Ok(_) => return true,
                Err(new) => current = new,
            }
        }

        false
    }

    /// Decrements the count, finalizing the object and releasing the block if it reaches 0.
    ///
    /// #   Safety
    ///
    /// -   Accounting: the caller gives up its ownership, and SHALL never use `this` again.
    #[inline]
    pub(crate) unsafe fn decrement(this: NonNull<ControlBlock>) {
        //  Safety:
        //  -   Alive: the caller still owns the block, hence it is alive.
        let count = unsafe { &(*this.as_ptr()).count };

        //  Release is necessary so that all reads/writes on the object are done before entering `fetch_sub`, in order
        //  to avoid a data-race with the finalization being invoked on another thread.
        //
        //  Only the decrement which observes the 1 -> 0 transition finalizes: the value returned by `fetch_sub` is
        //  authoritative, a separate load would race.
        let previous = count.fetch_sub(1, Ordering::Release);

        debug_assert!(previous > 0, "decremented a finalized control block");

        if previous != 1 {
            return;
        }

        //  Safety:
        //  -   Accounting: count reached 0, and only this thread observed it.
        unsafe { Self::finalize(this) };
    }

    //  Safety:
    //  -   Accounting: should only be invoked once, when the count reaches 0.
    #[inline(never)]
    unsafe fn finalize(this: NonNull<ControlBlock>) {
        //  Atomic - Fence synchronization, so that all reads/writes on the object do not start prior to this point, in
        //  order to avoid a data-race with reads/writes pre-sub on another thread.
        //
        //  The fence by itself is insufficient, a prior load on the atomic object which was written to with the
        //  Release memory ordering is required. Fortunately, `fetch_sub` counts as a load too.
        atomic::fence(Ordering::Acquire);

        //  Safety:
        //  -   Alive: the block is only released by `finalize` below.
        let finalize = unsafe { (*this.as_ptr()).finalize };

        log::trace!("finalizing control block {:p}", this);

        //  Safety:
        //  -   Shape: `finalize` was set by the shape which allocated `this`.
        //  -   Accounting: as per pre-condition.
        unsafe { finalize(this) };
    }
}

/// The shape of a control block.
///
/// Closed: only `Separate` and `Fused` are shapes.
pub(crate) trait Shape {
    /// Finalizes the object, then releases the block.
    ///
    /// #   Safety
    ///
    /// -   Shape: `block` SHALL have been allocated by this very shape.
    /// -   Accounting: SHALL only be invoked once, when the count reaches 0.
    unsafe fn finalize(block: NonNull<ControlBlock>);
}

//
//  Separate
//

/// A control block allocated separately from the object it owns.
#[repr(C)]
pub(crate) struct Separate<T, D>
where
    T: ?Sized,
{
    header: ControlBlock,
    ptr: NonNull<T>,
    deleter: D,
}

impl<T, D> Separate<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    /// Allocates a control block owning `ptr`, to be destroyed by `deleter`.
    ///
    /// Returns a pointer to the header of the block.
    #[inline]
    pub(crate) fn allocate(ptr: NonNull<T>, deleter: D) -> NonNull<ControlBlock> {
        let header = ControlBlock::new::<Self>(ptr.cast());

        let block = Box::new(Self { header, ptr, deleter });

        //  The header is the first field of a `#[repr(C)]` struct, and the pointer retains the provenance of the
        //  whole block.
        NonNull::from(Box::leak(block)).cast()
    }
}

impl<T, D> Shape for Separate<T, D>
where
    T: ?Sized,
    D: Deleter<T>,
{
    unsafe fn finalize(block: NonNull<ControlBlock>) {
        //  Safety:
        //  -   Shape: allocated by `Separate::<T, D>::allocate`, as per pre-condition.
        let this = unsafe { Box::from_raw(block.cast::<Self>().as_ptr()) };

        //  The block is released when `this` goes out of scope, even if the deleter panics.

        //  Safety:
        //  -   Owned: the block owns `ptr` since its creation.
        //  -   EndOfLife: the block is released right after.
        unsafe { this.deleter.delete(this.ptr) };
    }
}

//
//  Fused
//

/// A control block sharing its allocation with the object it owns.
pub(crate) struct Fused<T>(PhantomData<fn(T) -> T>);

impl<T> Fused<T> {
    /// Returns the layout of the fused block.
    #[inline(always)]
    pub(crate) fn layout() -> FusedLayout {
        FusedLayout::new::<ControlBlock, T>()
    }

    /// Allocates a fused block, with neither header nor object.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory, through `handle_alloc_error`. Use `try_allocate` to handle failures gracefully.
    #[inline]
    pub(crate) fn allocate() -> NonNull<u8> {
        let layout = Self::layout().block();

        Self::allocate_raw(layout).unwrap_or_else(|| handle_alloc_error(layout))
    }

    /// Attempts to allocate a fused block, with neither header nor object.
    #[inline]
    pub(crate) fn try_allocate() -> Result<NonNull<u8>, OwnershipError> {
        Self::allocate_raw(Self::layout().block()).ok_or(OwnershipError::MemoryExhausted)
    }

    /// Returns a pointer to the object slot of `block`.
    ///
    /// #   Safety
    ///
    /// -   Suitable: `block` SHALL have been allocated by `Self::allocate` or `Self::try_allocate`.
    #[inline(always)]
    pub(crate) unsafe fn value(block: NonNull<u8>) -> NonNull<T> {
        //  Safety:
        //  -   InBounds: as per Suitable pre-condition, `value_offset` is within the block.
        unsafe { block.add(Self::layout().value_offset()).cast() }
    }

    /// Places the header at the start of `block`, which takes ownership of the object.
    ///
    /// Returns pointers to the object and the header.
    ///
    /// #   Safety
    ///
    /// -   Suitable: `block` SHALL have been allocated by `Self::allocate` or `Self::try_allocate`.
    /// -   Initialized: the object slot of `block` SHALL be initialized.
    /// -   Once: SHALL only be invoked once per block.
    #[inline]
    pub(crate) unsafe fn place(block: NonNull<u8>) -> (NonNull<T>, NonNull<ControlBlock>) {
        //  Safety:
        //  -   Suitable: as per pre-condition.
        let value = unsafe { Self::value(block) };

        let header = block.cast::<ControlBlock>();

        //  Safety:
        //  -   InBounds & Aligned: the header is at the start of the block, whose alignment is at least its own.
        unsafe { header.write(ControlBlock::new::<Self>(value.cast())) };

        (value, header)
    }

    /// Releases `block`, without touching its content.
    ///
    /// #   Safety
    ///
    /// -   Suitable: `block` SHALL have been allocated by `Self::allocate` or `Self::try_allocate`.
    /// -   EndOfLife: `block` SHALL never be used again.
    #[inline]
    pub(crate) unsafe fn deallocate(block: NonNull<u8>) {
        //  Safety:
        //  -   SameLayout: allocated with this very layout, as per Suitable pre-condition.
        unsafe { dealloc(block.as_ptr(), Self::layout().block()) };
    }

    fn allocate_raw(layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "the header is never zero-sized");

        //  Safety:
        //  -   NonZero: the layout includes the header.
        NonNull::new(unsafe { alloc(layout) })
    }
}

impl<T> Shape for Fused<T> {
    unsafe fn finalize(block: NonNull<ControlBlock>) {
        //  Ensure deallocation even if the object panics during the drop.
        struct DeallocateGuard<T>(NonNull<u8>, PhantomData<fn(T) -> T>);

        impl<T> Drop for DeallocateGuard<T> {
            fn drop(&mut self) {
                //  Safety:
                //  -   Suitable: the guarded block is a fused block for `T`.
                //  -   EndOfLife: last use, the object was dropped.
                unsafe { Fused::<T>::deallocate(self.0) };
            }
        }

        let block = block.cast::<u8>();

        //  Safety:
        //  -   Suitable: as per Shape pre-condition.
        let value = unsafe { Self::value(block) };

        let _guard = DeallocateGuard::<T>(block, PhantomData);

        //  Safety:
        //  -   Owned: the object was placed before the header, and is owned by it.
        //  -   EndOfLife: as per Accounting pre-condition.
        unsafe { DropInPlace.delete(value) };
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    struct Tracker<'a>(&'a Cell<u32>);

    impl Drop for Tracker<'_> {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn separate_finalizes_once() {
        let dropped = Cell::new(0);

        let ptr = NonNull::from(Box::leak(Box::new(Tracker(&dropped))));
        let block = Separate::allocate(ptr, crate::DefaultDelete);

        //  Safety:
        //  -   Alive: count is 1.
        let header = unsafe { block.as_ref() };

        assert_eq!(1, header.count());
        assert_eq!(ptr.cast::<u8>(), header.object());

        //  Safety:
        //  -   Accounting: 2 owners, from now on.
        unsafe { header.increment() };

        assert_eq!(2, header.count());

        //  Safety:
        //  -   Accounting: back to 1 owner.
        unsafe { ControlBlock::decrement(block) };

        assert_eq!(0, dropped.get());

        //  Safety:
        //  -   Accounting: last owner.
        unsafe { ControlBlock::decrement(block) };

        assert_eq!(1, dropped.get());
    }

    #[test]
    fn fused_finalizes_once() {
        let dropped = Cell::new(0);

        let block = Fused::<Tracker<'_>>::allocate();

        //  Safety:
        //  -   Suitable: freshly allocated.
        unsafe { Fused::<Tracker<'_>>::value(block).write(Tracker(&dropped)) };

        //  Safety:
        //  -   Suitable & Initialized: just written, once.
        let (value, header) = unsafe { Fused::<Tracker<'_>>::place(block) };

        assert_eq!(block.cast::<ControlBlock>(), header);
        assert_eq!(0, (value.as_ptr() as usize) % core::mem::align_of::<Tracker<'_>>());

        //  Safety:
        //  -   Accounting: last owner.
        unsafe { ControlBlock::decrement(header) };

        assert_eq!(1, dropped.get());
    }

    #[test]
    fn try_increment_refuses_zero() {
        let ptr = NonNull::from(Box::leak(Box::new(0u32)));
        let block = Separate::allocate(ptr, crate::DefaultDelete);

        //  Safety:
        //  -   Alive: count is 1.
        let header = unsafe { block.as_ref() };

        //  Safety:
        //  -   Accounting: the extra owner is released right after.
        assert!(unsafe { header.try_increment() });
        assert_eq!(2, header.count());

        //  Safety:
        //  -   Accounting: back to 1, then 0.
        unsafe {
            ControlBlock::decrement(block);
            ControlBlock::decrement(block);
        }

        let stale = ControlBlock {
            count: AtomicU64::new(0),
            object: NonNull::dangling(),
            finalize: Separate::<u32, crate::DefaultDelete>::finalize,
        };

        //  Safety:
        //  -   Accounting: refused, nothing to account for.
        assert!(!unsafe { stale.try_increment() });
    }
} // mod tests
