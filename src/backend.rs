use core::{alloc::Layout, fmt, ptr::NonNull};

/// Why a [`Backend`] could not supply memory for a new pooled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SupplyError {
    /// The supplier has no memory left for a block of this shape.
    #[error("out of memory allocating {size} bytes aligned to {align}")]
    OutOfMemory {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },
    /// The supplier is not ready to hand out memory yet.
    #[error("meta-data supplier is unavailable")]
    Unavailable,
}

impl SupplyError {
    /// Shorthand for [`SupplyError::OutOfMemory`] describing `layout`.
    pub fn out_of_memory(layout: Layout) -> Self {
        SupplyError::OutOfMemory {
            size: layout.size(),
            align: layout.align(),
        }
    }
}

/// The platform a pool draws on: where fresh memory comes from, how fatal
/// errors are reported, and what must run before a thread first uses a pool.
///
/// # Safety
///
/// Memory returned by [`Backend::alloc_meta_data`] must be valid for reads and
/// writes of `layout`, suitably aligned, and must never be freed, unmapped or
/// handed out again. Pools turn it into `&'static` references.
pub unsafe trait Backend: 'static {
    /// Hook run at least once per thread before that thread first touches a
    /// singleton pool backed by this platform.
    ///
    /// Several threads may run it at the same time, and any thread may run
    /// it more than once, so it must be idempotent. Leave it `None` when no
    /// setup is needed and the check compiles away.
    const INIT_HOOK: Option<fn()> = None;

    /// Supplies fresh, uninitialised memory for one pooled object.
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>, SupplyError>;

    /// Reports an unrecoverable error and halts.
    fn error(message: fmt::Arguments<'_>) -> !;
}

/// A [`Backend`] drawing on the global allocator of the hosting program.
///
/// Supplied memory is leaked on purpose; pooled objects live for the rest of
/// the process. Fatal errors are written to stderr before the process aborts.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapBackend;

#[cfg(feature = "std")]
unsafe impl Backend for HeapBackend {
    fn alloc_meta_data(layout: Layout) -> Result<NonNull<u8>, SupplyError> {
        // Pooled types always embed their links, so they are never zero-sized.
        if layout.size() == 0 {
            return Err(SupplyError::out_of_memory(layout));
        }
        let ptr = unsafe { std::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(SupplyError::out_of_memory(layout))
    }

    fn error(message: fmt::Arguments<'_>) -> ! {
        crate::tracing::fatal(message);
        std::eprintln!("{message}");
        std::process::abort()
    }
}
