#[cfg(feature = "parking-lot")]
pub(crate) use parking_lot::Mutex;
#[cfg(not(feature = "parking-lot"))]
pub(crate) use std::sync::Mutex;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// The guarded data in this crate is a plain counter map that is never left
/// half-written, so a poisoned lock is still safe to use.
#[cfg(not(feature = "parking-lot"))]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(feature = "parking-lot")]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> parking_lot::MutexGuard<'_, T> {
    mutex.lock()
}
