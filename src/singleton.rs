//! Process-wide pool states with a per-thread initialisation gate.

use crate::backend::Backend;
use std::{cell::Cell, thread::LocalKey};

/// Runs `B::INIT_HOOK` unless this thread has already run it.
///
/// Each thread keeps its own marker, so the hook can run once per thread and
/// concurrently on several threads. When `B` declares no hook, this is empty.
#[doc(hidden)]
#[inline(always)]
pub fn ensure_init<B: Backend>(initialized: &'static LocalKey<Cell<bool>>) {
    let Some(hook) = B::INIT_HOOK else {
        return;
    };
    // A destroyed marker (thread teardown) counts as unset.
    if !initialized.try_with(Cell::get).unwrap_or(false) {
        run_init_hook::<B>(hook, initialized);
    }
}

#[cold]
#[inline(never)]
fn run_init_hook<B: Backend>(hook: fn(), initialized: &'static LocalKey<Cell<bool>>) {
    crate::tracing::log_init_hook::<B>();
    hook();
    let _ = initialized.try_with(|marker| marker.set(true));
}

/// Declares a process-wide [`PoolState`](crate::PoolState) for a pooled type.
///
/// The state is a `static` that is never dropped. The backend named here is
/// the one the pool draws memory from, and every access goes through a
/// per-thread gate that runs its [`INIT_HOOK`](crate::Backend::INIT_HOOK) on
/// the thread's first access.
///
/// Two forms are accepted:
///
/// ```ignore
/// // The default singleton of `Meta`, used by `Pool<Meta>`.
/// singleton_pool!(Meta, Backend);
///
/// // A separate pool of `Meta`, used by `Pool<Meta, Scratch>`.
/// singleton_pool!(pub struct Scratch: Meta, Backend);
/// ```
///
/// Each invocation creates its own state, so two invocations for the same
/// type give two independent pools.
#[macro_export]
macro_rules! singleton_pool {
    (@impl $accessor:ty, $t:ty, $backend:ty) => {
        impl $crate::PoolStateAccessor<$t> for $accessor {
            type Backend = $backend;

            #[inline(always)]
            fn pool_state() -> &'static $crate::PoolState<$t> {
                static STATE: $crate::PoolState<$t> = $crate::PoolState::new();
                &STATE
            }

            #[inline(always)]
            fn ensure_init() {
                $crate::__private::thread_local! {
                    static INITIALIZED: $crate::__private::Cell<bool> =
                        const { $crate::__private::Cell::new(false) };
                }
                $crate::singleton::ensure_init::<$backend>(&INITIALIZED);
            }
        }
    };
    ($(#[$attr:meta])* $vis:vis struct $name:ident : $t:ty, $backend:ty $(;)?) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        $crate::singleton_pool!(@impl $name, $t, $backend);
    };
    ($t:ty, $backend:ty $(,)?) => {
        $crate::singleton_pool!(@impl $t, $t, $backend);
    };
}
