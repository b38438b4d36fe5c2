use bootpool::*;
use std::{
    collections::HashSet,
    ptr::{self, NonNull},
    sync::atomic::{AtomicUsize, Ordering},
};

#[derive(Default)]
struct Meta {
    links: PoolLinks<Meta>,
    value: AtomicUsize,
}

impl Meta {
    fn with_value(value: usize) -> Self {
        Meta {
            links: PoolLinks::new(),
            value: AtomicUsize::new(value),
        }
    }
}

impl Pooled for Meta {
    fn pool_links(&self) -> &PoolLinks<Self> {
        &self.links
    }

    fn soft_reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

fn addr(obj: &Meta) -> usize {
    obj as *const Meta as usize
}

singleton_pool!(Meta, HeapBackend);
singleton_pool!(struct ReusePool: Meta, HeapBackend);
singleton_pool!(struct RegistryPool: Meta, HeapBackend);
singleton_pool!(struct ExtractPool: Meta, HeapBackend);
singleton_pool!(struct EmptyPool: Meta, HeapBackend);
singleton_pool!(struct PartialPool: Meta, HeapBackend);
singleton_pool!(struct ClaimedPool: Meta, HeapBackend);

#[test]
fn test_default_singleton() {
    let obj = Pool::<Meta>::acquire();
    assert!(obj.is_in_use());
    assert!(Pool::<Meta>::iter().any(|o| ptr::eq(o, obj)));
    Pool::<Meta>::release(obj);
    assert!(!obj.is_in_use());
}

#[test]
fn test_release_then_acquire_returns_same_object() {
    type P = Pool<Meta, ReusePool>;
    let obj = P::acquire_with(|| Meta::with_value(7));
    obj.value.store(42, Ordering::Relaxed);
    P::release(obj);

    let again = P::acquire_with(|| panic!("a released object should be reused"));
    assert!(ptr::eq(obj, again));
    assert!(again.is_in_use());
    assert_eq!(again.value.load(Ordering::Relaxed), 42);

    // Resetting is up to the caller.
    again.soft_reset();
    assert_eq!(again.value.load(Ordering::Relaxed), 0);
    P::release(again);
}

#[test]
fn test_iterate_in_construction_order() {
    type P = Pool<Meta, RegistryPool>;
    assert!(P::iterate(None).is_none());

    let objs: Vec<_> = (0..5).map(|i| P::acquire_with(|| Meta::with_value(i))).collect();
    P::release(objs[2]);
    // Reused objects are not registered again.
    let reused = P::acquire();
    assert!(ptr::eq(reused, objs[2]));
    let _fresh = P::acquire();

    let mut walked = Vec::new();
    let mut cursor = P::iterate(None);
    while let Some(obj) = cursor {
        walked.push(obj.value.load(Ordering::Relaxed));
        cursor = P::iterate(Some(obj));
    }
    assert_eq!(walked, vec![0, 1, 2, 3, 4, 0]);
    assert_eq!(P::iter().count(), 6);
}

#[test]
fn test_extract_restore() {
    type P = Pool<Meta, ExtractPool>;
    let objs: Vec<_> = (0..8).map(|_| P::acquire()).collect();
    for &obj in &objs {
        P::release(obj);
    }
    let before: HashSet<usize> = objs.iter().map(|o| addr(o)).collect();

    let first = P::extract(None).expect("free-list should not be empty");
    let mut chain = vec![first];
    while let Some(next) = P::extract(Some(chain[chain.len() - 1])) {
        chain.push(next);
    }
    assert_eq!(chain.len(), 8);
    assert!(chain.iter().all(|o| !o.is_in_use()));
    assert_eq!(chain.iter().map(|o| addr(o)).collect::<HashSet<_>>(), before);

    // Nothing is left to acquire while the chain is claimed.
    assert!(P::extract(None).is_none());

    P::restore(first, chain[chain.len() - 1]);
    let after: HashSet<usize> = P::extract_all().map(addr).collect();
    assert_eq!(after, before);
}

#[test]
fn test_extract_empty() {
    type P = Pool<Meta, EmptyPool>;
    assert!(P::extract(None).is_none());
    assert!(P::extract(None).is_none());
    assert_eq!(P::extract_all().count(), 0);
    assert!(P::extract_all().first().is_none());
}

#[test]
fn test_unrestored_objects_stay_registered() {
    type P = Pool<Meta, PartialPool>;
    let objs: Vec<_> = (0..4).map(|_| P::acquire()).collect();
    for &obj in &objs {
        P::release(obj);
    }

    let chain: Vec<_> = P::extract_all().collect();
    assert_eq!(chain.len(), 4);
    // Put back only the first two.
    P::restore(chain[0], chain[1]);

    let free: Vec<_> = P::extract_all().collect();
    assert_eq!(free.len(), 2);
    assert!(ptr::eq(free[0], chain[0]) || ptr::eq(free[0], chain[1]));
    P::restore(free[0], free[1]);

    assert_eq!(P::iter().count(), 4);
    let registered: HashSet<usize> = P::iter().map(addr).collect();
    assert!(chain.iter().all(|o| registered.contains(&addr(o))));
}

#[test]
fn test_acquire_while_claimed_constructs() {
    type P = Pool<Meta, ClaimedPool>;
    let obj = P::acquire();
    P::release(obj);

    let claimed = P::extract_all();
    let fresh = P::acquire();
    assert!(!ptr::eq(fresh, obj));
    assert_eq!(P::iter().count(), 2);

    let first = claimed.first().expect("one object was claimed");
    P::restore(first, first);
    P::release(fresh);
    assert_eq!(P::extract_all().count(), 2);
}

struct FailingBackend;

unsafe impl Backend for FailingBackend {
    fn alloc_meta_data(_layout: core::alloc::Layout) -> Result<NonNull<u8>, SupplyError> {
        Err(SupplyError::Unavailable)
    }

    fn error(message: core::fmt::Arguments<'_>) -> ! {
        panic!("{message}")
    }
}

singleton_pool!(struct FailingPool: Meta, FailingBackend);

#[test]
#[should_panic(expected = "failed to initialise pooled allocator state: meta-data supplier is unavailable")]
fn test_supply_failure_is_fatal() {
    Pool::<Meta, FailingPool>::acquire();
}

static MANUAL_STATE: PoolState<Meta> = PoolState::new();

struct ManualState;

impl PoolStateAccessor<Meta> for ManualState {
    type Backend = HeapBackend;

    fn pool_state() -> &'static PoolState<Meta> {
        &MANUAL_STATE
    }
}

#[test]
fn test_manual_state_accessor() {
    type P = Pool<Meta, ManualState>;
    let a = P::acquire_with(|| Meta::with_value(1));
    let b = P::acquire_with(|| Meta::with_value(2));
    assert!(!ptr::eq(a, b));
    P::release(a);
    P::release(b);
    assert_eq!(P::iter().count(), 2);
    assert!(!MANUAL_STATE.free_list().is_empty());
}
