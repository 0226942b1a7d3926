//! Self-observation: obtaining a `Shared<Self>` from `&self`.
//!
//! An object wishing to observe its own shared ownership embeds a `SharedAnchor`, and implements `SharedFromSelf`.
//! The anchor is attached to the control block by the anchored constructors of `Shared`, right after the block is
//! placed, and is never detached: once the object is finalized, the anchor is gone with it.
//!
//! ```
//! use endor_own::{Shared, SharedAnchor, SharedFromSelf};
//!
//! struct Node {
//!     anchor: SharedAnchor,
//!     name: String,
//! }
//!
//! //  Safety:
//! //  -   Embedded: the anchor is a field of `self`.
//! unsafe impl SharedFromSelf for Node {
//!     fn shared_anchor(&self) -> &SharedAnchor {
//!         &self.anchor
//!     }
//! }
//!
//! let node = Shared::new_anchored(Node { anchor: SharedAnchor::new(), name: "root".into() });
//!
//! let myself = node.shared_from_self().unwrap();
//!
//! assert_eq!("root", myself.name);
//! assert_eq!(2, Shared::use_count(&node));
//! ```

use core::{
    fmt,
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, Ordering},
};

use alloc::boxed::Box;

use crate::{block::ControlBlock, DefaultDelete, Deleter, OwnershipError, Shared, SharedUninit, Unique};

/// The back-pointer from an object to its control block.
///
/// Unattached until the object is placed under shared ownership by an anchored constructor.
pub struct SharedAnchor {
    owner: AtomicPtr<ControlBlock>,
}

impl SharedAnchor {
    /// Constructs an unattached anchor.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            owner: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Returns whether the anchor was attached to a control block.
    #[inline(always)]
    pub fn is_attached(&self) -> bool {
        !self.owner.load(Ordering::Relaxed).is_null()
    }

    /// Attaches the anchor to `owner`, unless already attached.
    #[inline]
    pub(crate) fn attach(&self, owner: NonNull<ControlBlock>) {
        //  An object already under shared ownership keeps its original owner.
        let _ = self
            .owner
            .compare_exchange(ptr::null_mut(), owner.as_ptr(), Ordering::Release, Ordering::Relaxed);
    }

    #[inline(always)]
    fn owner(&self) -> Option<NonNull<ControlBlock>> {
        NonNull::new(self.owner.load(Ordering::Acquire))
    }
}

//  A copy of the object is a different object, with no owner yet.
impl Clone for SharedAnchor {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Default for SharedAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("SharedAnchor")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Self-observation of shared ownership.
///
/// #   Safety
///
/// -   Embedded: `shared_anchor` SHALL return a reference to a `SharedAnchor` stored within `self`, and always the
///     same one.
pub unsafe trait SharedFromSelf {
    /// Returns the anchor embedded in `self`.
    fn shared_anchor(&self) -> &SharedAnchor;

    /// Returns a new handle sharing the ownership of `self`.
    ///
    /// Returns `OwnershipError::NoOwner` if `self` was not placed under shared ownership by an anchored constructor,
    /// or if it is being finalized.
    fn shared_from_self(&self) -> Result<Shared<Self>, OwnershipError>
    where
        Self: Sized,
    {
        let this = NonNull::from(self);

        let Some(owner) = self.shared_anchor().owner() else {
            log::debug!("shared_from_self on {:p}: unattached anchor", this);

            return Err(OwnershipError::NoOwner);
        };

        //  Safety:
        //  -   Alive: the anchor is embedded in `self`, itself owned by the block, which is released after `self`.
        let header = unsafe { owner.as_ref() };

        if header.object() != this.cast() {
            log::debug!("shared_from_self on {:p}: owner {:p} owns another object", this, owner);

            return Err(OwnershipError::NoOwner);
        }

        //  Safety:
        //  -   Accounting: on success, the extra owner is the new handle.
        if !unsafe { header.try_increment() } {
            log::debug!("shared_from_self on {:p}: owner {:p} is finalizing", this, owner);

            return Err(OwnershipError::NoOwner);
        }

        //  Safety:
        //  -   Accounting: incremented just above.
        //  -   Valid: `self` is the object owned by the block.
        Ok(unsafe { Shared::from_parts(this, owner) })
    }
}

//
//  Anchored construction
//

impl<T> Shared<T>
where
    T: SharedFromSelf,
{
    /// Allocates a fused block on the heap, places `value` into it, and attaches its anchor.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory.
    #[inline]
    pub fn new_anchored(value: T) -> Self {
        let this = Self::new(value);

        Self::attach_anchor(&this);

        this
    }

    /// Attempts to allocate a fused block on the heap, places `value` into it, and attaches its anchor.
    ///
    /// Returns an error if the allocation fails.
    #[inline]
    pub fn try_new_anchored(value: T) -> Result<Self, OwnershipError> {
        SharedUninit::try_new().map(|uninit| uninit.write_anchored(value))
    }

    /// Allocates a fused block on the heap, places the result of `constructor` into it, and attaches its anchor.
    ///
    /// The memory is released if `constructor` panics, in which case no destructor is run.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory, or if `constructor` panics.
    #[inline]
    pub fn new_with_anchored<F>(constructor: F) -> Self
    where
        F: FnOnce() -> T,
    {
        let this = Self::new_with(constructor);

        Self::attach_anchor(&this);

        this
    }

    /// Allocates a fused block on the heap, places the result of `constructor` into it if successful, and attaches
    /// its anchor.
    ///
    /// The memory is released if `constructor` fails or panics, in which case no destructor is run.
    ///
    /// #   Panics
    ///
    /// If there is not enough memory, or if `constructor` panics.
    #[inline]
    pub fn try_new_with_anchored<F, E>(constructor: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let this = Self::try_new_with(constructor)?;

        Self::attach_anchor(&this);

        Ok(this)
    }

    /// Constructs an instance taking ownership of the content of `boxed`, and attaches its anchor.
    #[inline]
    pub fn from_box_anchored(boxed: Box<T>) -> Self {
        let this = Self::from_box(boxed);

        Self::attach_anchor(&this);

        this
    }

    /// Constructs an instance taking ownership of the object of `unique`, and attaches its anchor.
    ///
    /// If `unique` is null, the result is empty.
    #[inline]
    pub fn from_unique_anchored(unique: Unique<T, DefaultDelete>) -> Self {
        let this = Self::from_unique(unique);

        Self::attach_anchor(&this);

        this
    }

    /// Constructs an instance taking ownership of `ptr`, to be destroyed by `deleter`, and attaches its anchor.
    ///
    /// #   Safety
    ///
    /// -   Owned: `ptr` SHALL point to an object owned by the caller, suitable for `deleter`.
    /// -   Destroys: `deleter` SHALL end the lifetime of the object, so that no attached anchor outlives its block.
    #[inline]
    pub unsafe fn from_raw_with_anchored<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + Send + 'static,
    {
        //  Safety:
        //  -   Owned: as per pre-condition.
        let this = unsafe { Self::from_raw_with(ptr, deleter) };

        Self::attach_anchor(&this);

        this
    }

    fn attach_anchor(this: &Self) {
        let (Some(value), Some(owner)) = (Self::as_ref(this), Self::owner(this)) else { return };

        value.shared_anchor().attach(owner);
    }
}

impl<T> SharedUninit<T>
where
    T: SharedFromSelf,
{
    /// Initializes the object with `value`, converts into a `Shared<T>`, and attaches its anchor.
    #[inline]
    pub fn write_anchored(self, value: T) -> Shared<T> {
        let this = self.write(value);

        Shared::attach_anchor(&this);

        this
    }

    /// Converts into a `Shared<T>`, considering the object initialized, and attaches its anchor.
    ///
    /// #   Safety
    ///
    /// -   Initialized: the object SHALL have been fully initialized through `as_mut_ptr`.
    #[inline]
    pub unsafe fn assume_init_anchored(self) -> Shared<T> {
        //  Safety:
        //  -   Initialized: as per pre-condition.
        let this = unsafe { self.assume_init() };

        Shared::attach_anchor(&this);

        this
    }
}

// mod tests
