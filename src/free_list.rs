use crate::pooled::{link_to_ref, ref_to_link, Pooled};
use core::{
    fmt,
    marker::PhantomData,
    mem, ptr,
    sync::atomic::{AtomicU64, Ordering},
};
use crossbeam_utils::{Backoff, CachePadded};

/// Number of low address bits that can be addressed by a free-list head.
const ADDR_BITS: u32 = if usize::BITS < 48 { usize::BITS } else { 48 };
/// Pooled objects embed atomics, so their low address bits are always zero.
const ALIGN_SHIFT: u32 = mem::align_of::<usize>().trailing_zeros();
const ADDR_FIELD_BITS: u32 = ADDR_BITS - ALIGN_SHIFT;
const ADDR_FIELD_MASK: u64 = (1 << ADDR_FIELD_BITS) - 1;

/// Free-list head: a compressed node address in the low bits and an ABA
/// generation tag in the remaining high bits.
///
/// On 64-bit targets the address takes 45 bits, leaving 19 for the tag, so the
/// tag wraps after 524,288 head updates. A stale exchange only succeeds if a
/// thread stalls between its load and its exchange across exactly a multiple
/// of that many updates and finds the same node on top again.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Head(u64);

impl Head {
    const EMPTY: Head = Head(0);

    #[inline(always)]
    fn addr(self) -> usize {
        ((self.0 & ADDR_FIELD_MASK) << ALIGN_SHIFT) as usize
    }

    #[inline(always)]
    fn ptr<T>(self) -> *mut T {
        self.addr() as *mut T
    }

    #[inline(always)]
    fn tag(self) -> u64 {
        self.0 >> ADDR_FIELD_BITS
    }

    /// The head that replaces `self` once the top becomes `ptr`.
    #[inline(always)]
    fn advance<T>(self, ptr: *mut T) -> Head {
        let addr = ptr as usize;
        debug_assert!(is_addressable(addr), "free-list node {addr:#x} out of range");
        let tag = self.tag().wrapping_add(1);
        Head(((addr as u64) >> ALIGN_SHIFT) | (tag << ADDR_FIELD_BITS))
    }
}

impl fmt::Debug for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Head({:#x}, tag={})", self.addr(), self.tag())
    }
}

#[inline(always)]
fn is_addressable(addr: usize) -> bool {
    (addr as u64) >> ADDR_BITS == 0 && addr & ((1 << ALIGN_SHIFT) - 1) == 0
}

/// Every node becomes the head through `push_chain`, so checking there keeps
/// a truncated address out of `pop`.
#[inline(always)]
#[track_caller]
fn check_addressable(addr: usize) {
    if !is_addressable(addr) {
        out_of_range(addr);
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn out_of_range(addr: usize) -> ! {
    panic!("free-list node {addr:#x} is outside the addressable range")
}

/// A lock-free multi-producer, multi-consumer stack of pooled objects.
///
/// Objects are linked intrusively through the free-list link of their
/// [`PoolLinks`](crate::PoolLinks) header; the registry link is never touched.
/// Every successful head update bumps a generation tag stored next to the
/// address, so a compare-exchange based on a stale head always fails.
pub struct FreeList<T> {
    head: CachePadded<AtomicU64>,
    _marker: PhantomData<*const T>,
}

// The list only ever hands out shared `&'static T` references.
unsafe impl<T: Sync> Send for FreeList<T> {}
unsafe impl<T: Sync> Sync for FreeList<T> {}

impl<T> FreeList<T> {
    /// Creates an empty free-list.
    pub const fn new() -> Self {
        FreeList {
            head: CachePadded::new(AtomicU64::new(Head::EMPTY.0)),
            _marker: PhantomData,
        }
    }

    /// Returns `true` if `obj` sits at an address the list head can encode.
    ///
    /// Objects that fail this check must never be pushed.
    #[inline]
    pub fn can_hold(obj: &T) -> bool {
        is_addressable(obj as *const T as usize)
    }

    /// Returns `true` if the list has no members.
    ///
    /// The answer may be stale by the time it is observed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        Head(self.head.load(Ordering::Relaxed)).addr() == 0
    }
}

impl<T: Pooled> FreeList<T> {
    const ALIGNED: () = assert!(
        mem::align_of::<T>() >= 1 << ALIGN_SHIFT,
        "pooled types must be at least word aligned"
    );

    /// Pushes one object.
    ///
    /// # Panics
    ///
    /// Panics if `node` fails [`Self::can_hold`].
    #[inline]
    #[track_caller]
    pub fn push(&self, node: &'static T) {
        self.push_chain(node, node);
    }

    /// Pushes a chain of objects in one atomic step.
    ///
    /// `first` must reach `last` by following free-list links, as in a chain
    /// returned by [`Self::pop_all`]. The link out of `last` is overwritten.
    ///
    /// # Panics
    ///
    /// Panics if `first` sits at an address the head cannot encode; see
    /// [`Self::can_hold`].
    #[track_caller]
    pub fn push_chain(&self, first: &'static T, last: &'static T) {
        let () = Self::ALIGNED;
        let first = ref_to_link(first);
        check_addressable(first as usize);
        let backoff = Backoff::new();
        let mut head = Head(self.head.load(Ordering::Relaxed));
        loop {
            last.pool_links().set_next(head.ptr());
            match self.head.compare_exchange_weak(
                head.0,
                head.advance(first).0,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    head = Head(actual);
                    backoff.spin();
                }
            }
        }
    }

    /// Pops the most recently pushed object, or `None` if the list is empty.
    pub fn pop(&self) -> Option<&'static T> {
        let backoff = Backoff::new();
        let mut head = Head(self.head.load(Ordering::Acquire));
        loop {
            // Nodes are never freed, so a node popped by a racing thread can
            // still be read. The tag makes the exchange below fail in that case.
            let top = unsafe { link_to_ref(head.ptr::<T>()) }?;
            let next = top.pool_links().next();
            match self.head.compare_exchange_weak(
                head.0,
                head.advance(next).0,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(actual) => {
                    head = Head(actual);
                    backoff.spin();
                }
            }
        }
    }

    /// Returns the member after `node` in a chain detached by
    /// [`Self::pop_all`].
    #[inline]
    pub fn successor(node: &T) -> Option<&'static T> {
        unsafe { link_to_ref(node.pool_links().next()) }
    }

    /// Detaches every member at once and returns the first of them.
    ///
    /// The rest of the chain is reachable through [`Self::successor`].
    pub fn pop_all(&self) -> Option<&'static T> {
        let backoff = Backoff::new();
        let mut head = Head(self.head.load(Ordering::Acquire));
        loop {
            let top = unsafe { link_to_ref(head.ptr::<T>()) }?;
            match self.head.compare_exchange_weak(
                head.0,
                head.advance(ptr::null_mut::<T>()).0,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(actual) => {
                    head = Head(actual);
                    backoff.spin();
                }
            }
        }
    }
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("head", &Head(self.head.load(Ordering::Relaxed)))
            .finish()
    }
}
