//! Structured logging hooks.
//!
//! With the `tracing` feature enabled these forward to the `tracing` crate.
//! Without it they compile to nothing, which keeps the pool free of any
//! allocation of its own on the paths that bootstrap an allocator.

#[cfg(feature = "tracing")]
mod internal {
    use core::fmt;

    /// Log a fresh object taken from the backend and added to the registry.
    #[inline]
    pub(crate) fn log_constructed<T>(addr: *const T) {
        tracing::trace!(
            pooled_type = core::any::type_name::<T>(),
            addr = ?addr,
            "constructed"
        );
    }

    /// Log the per-thread initialisation hook running.
    #[inline]
    #[allow(dead_code)]
    pub(crate) fn log_init_hook<B>() {
        tracing::debug!(backend = core::any::type_name::<B>(), "init_hook");
    }

    /// Log an unrecoverable error right before the backend halts.
    #[inline]
    #[allow(dead_code)]
    pub(crate) fn fatal(message: fmt::Arguments<'_>) {
        tracing::error!(%message, "fatal");
    }
}

#[cfg(not(feature = "tracing"))]
mod internal {
    use core::fmt;

    #[inline(always)]
    pub(crate) fn log_constructed<T>(_addr: *const T) {}

    #[inline(always)]
    #[allow(dead_code)]
    pub(crate) fn log_init_hook<B>() {}

    #[inline(always)]
    #[allow(dead_code)]
    pub(crate) fn fatal(_message: fmt::Arguments<'_>) {}
}

pub(crate) use internal::*;
