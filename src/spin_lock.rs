use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use crossbeam_utils::Backoff;

/// A minimal spin lock over a single atomic flag.
///
/// Waiters busy-retry and never yield to the scheduler. The lock guards no
/// data of its own: it serializes whatever the holder does while the
/// [`SpinLockGuard`] is alive.
pub struct SpinLock {
    locked: AtomicBool,
}

impl SpinLock {
    /// Creates an unlocked spin lock.
    pub const fn new() -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning until it is free.
    ///
    /// The lock is released when the returned guard is dropped, including
    /// during unwinding.
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_> {
        let backoff = Backoff::new();
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }
            // Wait for the holder to let go before trying the RMW again.
            while self.is_locked() {
                backoff.spin();
            }
        }
    }

    /// Attempts to acquire the lock without spinning.
    ///
    /// Only fails if another guard holds the lock.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinLockGuard { lock: self })
    }

    /// Returns `true` if some guard currently holds the lock.
    ///
    /// The answer may be stale by the time it is observed.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Scoped ownership of a [`SpinLock`]; unlocks on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SpinLockGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinLockGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
