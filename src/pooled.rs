use core::{
    fmt,
    ptr::{self, NonNull},
    sync::atomic::{AtomicBool, AtomicPtr, Ordering},
};

/// A trait implemented by every type that can live in a [`Pool`](crate::Pool).
///
/// Pooled objects are never destroyed. They are handed out as `&'static Self`,
/// so any state that changes while the object is in use has to sit behind
/// interior mutability.
pub trait Pooled: Sized + Sync + 'static {
    /// Returns the link header embedded in this object.
    ///
    /// Must return the same header every time it is called on the same
    /// object.
    fn pool_links(&self) -> &PoolLinks<Self>;

    /// Brings the object back to a reusable state.
    ///
    /// The pool never calls this: objects are recycled exactly as they were
    /// released. Callers that need a clean object invoke it themselves after
    /// `acquire` or before `release`. By default, this method does nothing.
    #[inline(always)]
    fn soft_reset(&self) {}

    /// Returns `true` while the object is handed out by `acquire`.
    #[inline(always)]
    fn is_in_use(&self) -> bool {
        self.pool_links().is_in_use()
    }
}

/// Link header a [`Pooled`] type embeds to take part in a pool.
///
/// The free-list link and the registry link are separate fields, so an object
/// can sit on the free-list while staying threaded through the registry.
pub struct PoolLinks<T> {
    /// Successor on the free-list, or in a chain detached by `extract`.
    next: AtomicPtr<T>,
    /// Successor in the registry. Written once, under the registry lock.
    registry_next: AtomicPtr<T>,
    in_use: AtomicBool,
}

impl<T> PoolLinks<T> {
    /// Creates an unlinked header.
    pub const fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            registry_next: AtomicPtr::new(ptr::null_mut()),
            in_use: AtomicBool::new(false),
        }
    }

    /// Returns `true` while the owning object is handed out by `acquire`.
    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_in_use(&self) {
        self.in_use.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn reset_in_use(&self) {
        self.in_use.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn next(&self) -> *mut T {
        self.next.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_next(&self, next: *mut T) {
        self.next.store(next, Ordering::Release);
    }

    #[inline]
    pub(crate) fn registry_next(&self) -> *mut T {
        self.registry_next.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_registry_next(&self, next: *mut T) {
        self.registry_next.store(next, Ordering::Release);
    }
}

impl<T> Default for PoolLinks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PoolLinks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLinks")
            .field("next", &self.next.load(Ordering::Relaxed))
            .field("registry_next", &self.registry_next.load(Ordering::Relaxed))
            .field("in_use", &self.is_in_use())
            .finish()
    }
}

/// Turns a link read from a [`PoolLinks`] header back into a reference.
///
/// # Safety
///
/// `ptr` must be null or point to a pooled object that is never freed.
#[inline(always)]
pub(crate) unsafe fn link_to_ref<T>(ptr: *mut T) -> Option<&'static T> {
    NonNull::new(ptr).map(|p| unsafe { &*p.as_ptr() })
}

#[inline(always)]
pub(crate) fn ref_to_link<T>(obj: &'static T) -> *mut T {
    obj as *const T as *mut T
}
