//! The layout of a fused memory block.
//!
//! A fused memory block hosts both the control block header and the object, in a single allocation:
//!
//! ```txt
//! +--------+----+-------+----+
//! | header | .. | value | .. |
//! +--------+----+-------+----+
//! ^             ^
//! block         block + value_offset
//! ```

use core::{
    alloc::{Layout, LayoutError},
    cmp,
};

/// The layout of a fused memory block.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FusedLayout {
    //  Layout of the entire block.
    block: Layout,
    //  Forward offset from the start of the block.
    value_offset: usize,
}

impl FusedLayout {
    /// Constructs the layout of a block hosting a header `H` followed by a value `T`.
    ///
    /// #   Panics
    ///
    /// If the resulting block cannot be represented, which the compiler would already reject for `(H, T)`.
    pub fn new<H, T>() -> Self {
        //  The compiler will error if this type cannot be represented (too large).
        #[allow(dead_code)]
        struct Block<H, T>(H, T);

        let Ok(this) = Self::compute_layout(Layout::new::<H>(), Layout::new::<T>()) else {
            unreachable!("`Block<H, T>` is representable, hence so is its fused layout")
        };

        debug_assert!(Layout::new::<Block<H, T>>().size() <= this.block().size());

        this
    }

    /// Returns the layout of the complete block.
    pub const fn block(&self) -> Layout {
        self.block
    }

    /// Returns the offset between the start of the block and the start of the value.
    pub const fn value_offset(&self) -> usize {
        self.value_offset
    }
}

//
//  Implementation
//

impl FusedLayout {
    //  Explicit arithmetic:
    //
    //  -   align  = max(align(header), align(value))
    //  -   offset = round_up(size(header), align(value))
    //  -   size   = round_up(offset + size(value), align)
    fn compute_layout(header: Layout, value: Layout) -> Result<Self, LayoutError> {
        let align = cmp::max(header.align(), value.align());

        let value_offset = round_up(header.size(), value.align())?;

        let unpadded = value_offset.checked_add(value.size()).ok_or_else(overflow)?;

        let size = round_up(unpadded, align)?;

        let block = Layout::from_size_align(size, align)?;

        Ok(Self { block, value_offset })
    }
}

//  `align` is a power of 2, as per `Layout` invariant.
fn round_up(size: usize, align: usize) -> Result<usize, LayoutError> {
    debug_assert!(align.is_power_of_two());

    let mask = align - 1;

    size.checked_add(mask).map(|s| s & !mask).ok_or_else(overflow)
}

//  `LayoutError` cannot be constructed directly, derive one from an invalid request instead.
fn overflow() -> LayoutError {
    match Layout::from_size_align(usize::MAX, usize::MAX) {
        Err(e) => e,
        Ok(_) => unreachable!("`usize::MAX` is not a power of 2"),
    }
}

// mod tests
