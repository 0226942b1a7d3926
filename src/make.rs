//! Factories, constructing the object and its handle in one go.

use alloc::{boxed::Box, vec, vec::Vec};

use crate::{Shared, SharedFromSelf, SharedUninit, Unique, UniqueArray};

/// Allocates `value` on the heap, under exclusive ownership.
///
/// #   Panics
///
/// If there is not enough memory.
#[inline(always)]
pub fn make_unique<T>(value: T) -> Unique<T> {
    Unique::new(value)
}

/// Allocates an array of `len` default values on the heap, under exclusive ownership.
///
/// #   Panics
///
/// If there is not enough memory.
pub fn make_unique_array<T>(len: usize) -> UniqueArray<T>
where
    T: Default,
{
    let array: Box<[T]> = (0..len).map(|_| T::default()).collect();

    Unique::from_box(array)
}

/// Allocates an array of `len` copies of `value` on the heap, under exclusive ownership.
///
/// #   Panics
///
/// If there is not enough memory.
pub fn make_unique_array_filled<T>(len: usize, value: T) -> UniqueArray<T>
where
    T: Clone,
{
    let array: Vec<T> = vec![value; len];

    Unique::from_box(array.into_boxed_slice())
}

/// Allocates `value` in a fused block on the heap, under shared ownership.
///
/// #   Panics
///
/// If there is not enough memory.
#[inline(always)]
pub fn make_shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// Allocates a fused block on the heap, then constructs the object in it with `constructor`.
///
/// If `constructor` panics, the block is released and no destructor is run.
///
/// #   Panics
///
/// If there is not enough memory, or if `constructor` panics.
#[inline(always)]
pub fn make_shared_with<T, F>(constructor: F) -> Shared<T>
where
    F: FnOnce() -> T,
{
    Shared::new_with(constructor)
}

/// Allocates `value` in a fused block on the heap, under shared ownership, and attaches its anchor.
///
/// #   Panics
///
/// If there is not enough memory.
#[inline(always)]
pub fn make_shared_anchored<T>(value: T) -> Shared<T>
where
    T: SharedFromSelf,
{
    Shared::new_anchored(value)
}

/// Allocates a fused block on the heap, constructs the object in it with `constructor`, and attaches its anchor.
///
/// If `constructor` panics, the block is released and no destructor is run.
///
/// #   Panics
///
/// If there is not enough memory, or if `constructor` panics.
#[inline(always)]
pub fn make_shared_with_anchored<T, F>(constructor: F) -> Shared<T>
where
    T: SharedFromSelf,
    F: FnOnce() -> T,
{
    Shared::new_with_anchored(constructor)
}

/// Allocates a fused block on the heap, leaving the object for the caller to initialize.
///
/// #   Panics
///
/// If there is not enough memory.
#[inline(always)]
pub fn make_shared_for_overwrite<T>() -> SharedUninit<T> {
    SharedUninit::new()
}

/// Allocates an array of `len` default values on the heap, under shared ownership.
///
/// The array and the control block are allocated separately.
///
/// #   Panics
///
/// If there is not enough memory.
pub fn make_shared_array<T>(len: usize) -> Shared<[T]>
where
    T: Default,
{
    let array: Box<[T]> = (0..len).map(|_| T::default()).collect();

    Shared::from_box(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_array_default() {
        let array = make_unique_array::<u32>(4);

        assert_eq!([0, 0, 0, 0], *array);
    }

    #[test]
    fn unique_array_filled() {
        let mut array = make_unique_array_filled(3, String::from("a"));

        array[2].push('b');

        assert_eq!(["a", "a", "ab"], *array);
    }

    #[test]
    fn unique_array_empty() {
        let array = make_unique_array::<String>(0);

        assert!(!array.is_null());
        assert!(array.is_empty());
    }

    #[test]
    fn shared_with() {
        let shared = make_shared_with(|| String::from("Hello"));

        assert_eq!("Hello", &*shared);
    }

    #[test]
    fn shared_for_overwrite() {
        let mut uninit = make_shared_for_overwrite::<[u8; 4]>();

        //  Safety:
        //  -   Valid & Aligned: as per `as_mut_ptr`.
        unsafe { uninit.as_mut_ptr().write([1, 2, 3, 4]) };

        //  Safety:
        //  -   Initialized: fully written just above.
        let shared = unsafe { uninit.assume_init() };

        assert_eq!([1, 2, 3, 4], *shared);
    }

    #[test]
    fn shared_array() {
        let shared = make_shared_array::<u64>(3);
        let copy = shared.clone();

        assert_eq!(3, copy.len());
        assert_eq!(0, copy[2]);
        assert_eq!(2, Shared::use_count(&shared));
    }
} // mod tests
