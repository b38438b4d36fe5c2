use crate::{
    backend::Backend,
    free_list::FreeList,
    pooled::{link_to_ref, ref_to_link, Pooled},
    spin_lock::SpinLock,
};
use core::{
    fmt, ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

/// Everything one pool of `T` owns: the free-list, the registry of every
/// object ever constructed, and the lock serializing registry appends.
///
/// Construction is `const`, so a state can live in a `static` without any
/// initialisation order concerns. States are never torn down.
pub struct PoolState<T> {
    lock: SpinLock,
    free: FreeList<T>,
    registry_head: AtomicPtr<T>,
    /// Only read and written while `lock` is held.
    registry_tail: AtomicPtr<T>,
}

impl<T> PoolState<T> {
    /// Creates a state with an empty free-list and an empty registry.
    pub const fn new() -> Self {
        PoolState {
            lock: SpinLock::new(),
            free: FreeList::new(),
            registry_head: AtomicPtr::new(ptr::null_mut()),
            registry_tail: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// The free-list of objects ready to be acquired.
    #[inline(always)]
    pub fn free_list(&self) -> &FreeList<T> {
        &self.free
    }
}

impl<T: Pooled> PoolState<T> {
    /// Appends a freshly constructed object to the registry.
    pub(crate) fn register(&self, obj: &'static T) {
        let link = ref_to_link(obj);
        let _guard = self.lock.lock();
        let tail = self.registry_tail.load(Ordering::Relaxed);
        match unsafe { link_to_ref(tail) } {
            Some(tail) => tail.pool_links().set_registry_next(link),
            None => self.registry_head.store(link, Ordering::Release),
        }
        self.registry_tail.store(link, Ordering::Relaxed);
    }

    /// The first object ever registered.
    #[inline]
    pub(crate) fn registry_first(&self) -> Option<&'static T> {
        unsafe { link_to_ref(self.registry_head.load(Ordering::Acquire)) }
    }
}

impl<T> Default for PoolState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PoolState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("lock", &self.lock)
            .field("free", &self.free)
            .field("registry_head", &self.registry_head.load(Ordering::Relaxed))
            .finish()
    }
}

/// Selects the [`PoolState`] a [`Pool`](crate::Pool) operates on, and the
/// [`Backend`] that feeds it.
///
/// The usual way to get an implementation is
/// [`singleton_pool!`](crate::singleton_pool). Implementing it by hand allows
/// pools whose state lives somewhere else entirely, for example inside a
/// larger allocator structure.
pub trait PoolStateAccessor<T> {
    /// Supplies memory for new objects and declares the initialisation hook.
    type Backend: Backend;

    /// Returns the state. Must return the same state on every call.
    fn pool_state() -> &'static PoolState<T>;

    /// Runs the backend's [`INIT_HOOK`](Backend::INIT_HOOK) if the calling
    /// thread may not have run it yet.
    ///
    /// Called before every pool operation. The default runs the hook each
    /// time; `singleton_pool!` overrides it with a per-thread marker.
    #[inline(always)]
    fn ensure_init() {
        if let Some(hook) = <Self::Backend as Backend>::INIT_HOOK {
            hook();
        }
    }
}
