/// Allocation accounting of fused construction.
///
/// A counting global allocator tracks, per thread, the number of allocations and the number of live bytes, so that
/// each test can check it neither leaks nor over-allocates, even when construction fails midway.
use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    ptr,
};

use endor_own::{make_shared_for_overwrite, OwnershipError, Shared, SharedUninit, Unique};

#[global_allocator]
static ALLOCATOR: Counting = Counting;

#[test]
fn new_single_allocation() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    let shared = Shared::new(Probe(&dropped));

    let during = Snapshot::take();

    assert_eq!(1, during.allocations - before.allocations);

    drop(shared);

    assert_eq!(1, dropped.get());
    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn from_box_single_allocation() {
    let dropped = Cell::new(0);

    let boxed = Box::new(Probe(&dropped));

    let before = Snapshot::take();

    let shared = Shared::from_box(boxed);

    let during = Snapshot::take();

    //  The control block only, the object is already allocated.
    assert_eq!(1, during.allocations - before.allocations);

    drop(shared);

    assert_eq!(1, dropped.get());
    assert!(Snapshot::take().live < before.live);
}

#[test]
fn from_unique_leaks_nothing() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    let shared = Shared::from_unique(Unique::new(Probe(&dropped)));
    let copy = shared.clone();

    drop(shared);
    drop(copy);

    assert_eq!(1, dropped.get());
    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn new_with_panic_leaks_nothing() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Shared::<Probe<'_>>::new_with(|| {
            if dropped.get() == 0 {
                panic::resume_unwind(Box::new("constructor failure"));
            }

            Probe(&dropped)
        })
    }));

    let during = Snapshot::take();

    let payload = result.err().expect("panicked");

    drop(payload);

    //  The fused block, and the payload.
    assert!(during.allocations - before.allocations >= 2);
    assert_eq!(0, dropped.get());
    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn try_new_with_error_leaks_nothing() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    let result: Result<Shared<Probe<'_>>, _> = Shared::try_new_with(|| Err(OwnershipError::NoOwner));

    let during = Snapshot::take();

    assert_eq!(Some(OwnershipError::NoOwner), result.err());
    assert_eq!(1, during.allocations - before.allocations);
    assert_eq!(0, dropped.get());
    assert_eq!(before.live, during.live);
}

#[test]
fn try_new_exhausted() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    fail_next_allocation();

    let result = Shared::try_new(Probe(&dropped));

    assert_eq!(Some(OwnershipError::MemoryExhausted), result.err());

    //  The value is dropped along with the failed construction.
    assert_eq!(1, dropped.get());
    assert_eq!(before, Snapshot::take());

    let shared = Shared::try_new(Probe(&dropped)).expect("allocated");

    assert!(Shared::is_unique(&shared));
}

#[test]
fn uninit_try_new_exhausted() {
    let before = Snapshot::take();

    fail_next_allocation();

    let result = SharedUninit::<[u64; 8]>::try_new();

    assert_eq!(Some(OwnershipError::MemoryExhausted), result.err());
    assert_eq!(before, Snapshot::take());
}

#[test]
fn uninit_drop_leaks_nothing() {
    let dropped = Cell::new(0);

    let before = Snapshot::take();

    let uninit = SharedUninit::<Probe<'_>>::new();

    assert_eq!(1, Snapshot::take().allocations - before.allocations);

    drop(uninit);

    assert_eq!(0, dropped.get());
    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn for_overwrite_leaks_nothing() {
    let before = Snapshot::take();

    let mut uninit = make_shared_for_overwrite::<[u64; 8]>();

    //  Safety:
    //  -   Valid & Aligned: as per `as_mut_ptr`.
    unsafe { uninit.as_mut_ptr().write([7; 8]) };

    //  Safety:
    //  -   Initialized: fully written just above.
    let shared = unsafe { uninit.assume_init() };

    assert_eq!(56, shared.iter().sum::<u64>());

    drop(shared);

    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn panicking_drop_fused_leaks_nothing() {
    let before = Snapshot::take();

    let shared = Shared::new(Grenade);

    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));

    drop(result.err().expect("panicked"));

    assert_eq!(before.live, Snapshot::take().live);
}

#[test]
fn panicking_drop_separate_leaks_nothing() {
    let before = Snapshot::take();

    let shared = Shared::from_box(Box::new(Grenade));

    let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));

    drop(result.err().expect("panicked"));

    assert_eq!(before.live, Snapshot::take().live);
}

//
//  Implementation
//

std::thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    static LIVE: Cell<isize> = const { Cell::new(0) };
    //  When set, the next allocation of this thread fails, and the switch resets.
    static FAIL_NEXT: Cell<bool> = const { Cell::new(false) };
}

fn fail_next_allocation() {
    FAIL_NEXT.with(|fail| fail.set(true));
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Snapshot {
    allocations: usize,
    live: isize,
}

impl Snapshot {
    fn take() -> Self {
        let allocations = ALLOCATIONS.with(Cell::get);
        let live = LIVE.with(Cell::get);

        Self { allocations, live }
    }
}

struct Counting;

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if FAIL_NEXT.try_with(|fail| fail.replace(false)).unwrap_or(false) {
            return ptr::null_mut();
        }

        //  Safety:
        //  -   As per pre-conditions.
        let ptr = unsafe { System.alloc(layout) };

        if !ptr.is_null() {
            let _ = ALLOCATIONS.try_with(|allocations| allocations.set(allocations.get() + 1));
            let _ = LIVE.try_with(|live| live.set(live.get() + layout.size() as isize));
        }

        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let _ = LIVE.try_with(|live| live.set(live.get() - layout.size() as isize));

        //  Safety:
        //  -   As per pre-conditions.
        unsafe { System.dealloc(ptr, layout) };
    }
}

//  Counts its own destruction.
struct Probe<'a>(&'a Cell<u32>);

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

//  Panics on destruction, without invoking the panic hook.
struct Grenade;

impl Drop for Grenade {
    fn drop(&mut self) {
        panic::resume_unwind(Box::new("destructor failure"));
    }
}
