use crate::{
    backend::Backend,
    free_list::FreeList,
    pooled::{link_to_ref, Pooled},
    state::{PoolState, PoolStateAccessor},
};
use core::{alloc::Layout, fmt, iter::FusedIterator, marker::PhantomData};

/// A pool of `T` objects that are recycled and never freed.
///
/// `Pool` is never instantiated; its associated functions operate on the
/// [`PoolState`] chosen by `S` and draw fresh memory from `S::Backend`. By
/// default `S` is `T` itself, which picks up the singleton declared with
/// `singleton_pool!(T, B)`.
///
/// Objects are handed out as `&'static T`. [`Pool::acquire`] and
/// [`Pool::release`] recycle single objects through the free-list.
/// [`Pool::extract`] and [`Pool::restore`] move the whole free-list out and
/// back for batch processing. [`Pool::iterate`] walks every object ever
/// constructed. Objects obtained through one pair of operations must not be
/// returned through the other.
pub struct Pool<T, S = T> {
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<T, S> Pool<T, S>
where
    T: Pooled,
    S: PoolStateAccessor<T>,
{
    #[inline(always)]
    fn state() -> &'static PoolState<T> {
        S::ensure_init();
        S::pool_state()
    }

    /// Acquires an object, constructing it with `make` if the pool has none
    /// left.
    ///
    /// A recycled object is returned exactly as it was released; only its
    /// in-use flag changes and `make` is not called. When the backend cannot
    /// supply memory this reports a fatal error through [`Backend::error`].
    /// The backend's initialisation hook has run on this thread before any
    /// memory is requested.
    pub fn acquire_with<F>(make: F) -> &'static T
    where
        F: FnOnce() -> T,
    {
        let state = Self::state();
        if let Some(obj) = state.free_list().pop() {
            obj.pool_links().set_in_use();
            return obj;
        }

        let obj = Self::construct(make);
        state.register(obj);
        crate::tracing::log_constructed(obj);
        obj.pool_links().set_in_use();
        obj
    }

    #[cold]
    fn construct<F>(make: F) -> &'static T
    where
        F: FnOnce() -> T,
    {
        let layout = Layout::new::<T>();
        let mem = match <S::Backend as Backend>::alloc_meta_data(layout) {
            Ok(mem) => mem.cast::<T>(),
            Err(err) => <S::Backend as Backend>::error(format_args!(
                "failed to initialise pooled allocator state: {err}"
            )),
        };
        // Safety: the backend hands out writable, suitably aligned memory
        // for `layout` that is never freed.
        let obj: &'static T = unsafe {
            mem.as_ptr().write(make());
            &*mem.as_ptr()
        };
        if !FreeList::can_hold(obj) {
            <S::Backend as Backend>::error(format_args!(
                "pooled allocator state at {:p} is outside the addressable range",
                obj
            ));
        }
        obj
    }

    /// Returns an object previously obtained from [`Self::acquire_with`] or
    /// [`Self::acquire`] to the pool.
    ///
    /// Nothing is dropped or reset; the next `acquire` sees the object as it
    /// is now. Do not pass objects obtained from [`Self::extract`].
    #[inline]
    pub fn release(obj: &'static T) {
        obj.pool_links().reset_in_use();
        Self::state().free_list().push(obj);
    }

    /// Walks a detached chain of free objects.
    ///
    /// `extract(None)` detaches the entire free-list and returns its first
    /// member; the free-list is left empty, so the detached objects cannot be
    /// acquired while the caller inspects them. `extract(Some(obj))` returns
    /// the member after `obj` in that chain. Return the chain with
    /// [`Self::restore`].
    #[inline]
    pub fn extract(obj: Option<&'static T>) -> Option<&'static T> {
        match obj {
            None => Self::state().free_list().pop_all(),
            Some(obj) => FreeList::successor(obj),
        }
    }

    /// Detaches the entire free-list and returns an iterator over it.
    ///
    /// Equivalent to walking [`Self::extract`] from `None`.
    pub fn extract_all() -> Chain<T> {
        Chain {
            next: Self::extract(None),
        }
    }

    /// Returns a chain previously detached by [`Self::extract`] to the
    /// free-list in one step.
    ///
    /// `last` must be reachable from `first` in the detached chain. Objects
    /// left out stay registered but cannot be acquired again until restored.
    /// Do not pass objects obtained from [`Self::acquire`].
    #[inline]
    pub fn restore(first: &'static T, last: &'static T) {
        Self::state().free_list().push_chain(first, last);
    }

    /// Walks every object ever constructed by this pool, in construction
    /// order.
    ///
    /// `iterate(None)` returns the first object constructed, and
    /// `iterate(Some(obj))` the one constructed after `obj`. The walk is not
    /// synchronized with [`Self::acquire`]; only use it while no thread can be
    /// constructing new objects, e.g. during shutdown accounting.
    #[inline]
    pub fn iterate(obj: Option<&'static T>) -> Option<&'static T> {
        match obj {
            None => Self::state().registry_first(),
            Some(obj) => unsafe { link_to_ref(obj.pool_links().registry_next()) },
        }
    }

    /// Returns an iterator over every object ever constructed, in
    /// construction order.
    ///
    /// Carries the same restrictions as [`Self::iterate`].
    pub fn iter() -> Registry<T> {
        Registry {
            next: Self::iterate(None),
        }
    }
}

impl<T, S> Pool<T, S>
where
    T: Pooled + Default,
    S: PoolStateAccessor<T>,
{
    /// Acquires an object, constructing it with [`Default`] if the pool has
    /// none left.
    ///
    /// See [`Self::acquire_with`].
    #[inline]
    pub fn acquire() -> &'static T {
        Self::acquire_with(T::default)
    }
}

impl<T, S> fmt::Debug for Pool<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("pooled_type", &core::any::type_name::<T>())
            .finish()
    }
}

/// Iterator over a chain of objects detached by [`Pool::extract_all`].
pub struct Chain<T: 'static> {
    next: Option<&'static T>,
}

impl<T: Pooled> Chain<T> {
    /// The first object of the remaining chain, without advancing.
    #[inline]
    pub fn first(&self) -> Option<&'static T> {
        self.next
    }
}

impl<T: Pooled> Iterator for Chain<T> {
    type Item = &'static T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let obj = self.next?;
        self.next = FreeList::successor(obj);
        Some(obj)
    }
}

impl<T: Pooled> FusedIterator for Chain<T> {}

impl<T: 'static> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("next", &self.next.map(|obj| obj as *const T))
            .finish()
    }
}

/// Iterator over every object a pool ever constructed, from [`Pool::iter`].
pub struct Registry<T: 'static> {
    next: Option<&'static T>,
}

impl<T: Pooled> Iterator for Registry<T> {
    type Item = &'static T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let obj = self.next?;
        self.next = unsafe { link_to_ref(obj.pool_links().registry_next()) };
        Some(obj)
    }
}

impl<T: Pooled> FusedIterator for Registry<T> {}

impl<T: 'static> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("next", &self.next.map(|obj| obj as *const T))
            .finish()
    }
}
