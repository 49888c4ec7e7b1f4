use std::sync::{Mutex, MutexGuard, PoisonError};

mod dyn_error;

#[doc(inline)]
pub use dyn_error::DynError;

/// Lock `mutex` and ignore poisoning. None of the guarded values can be left
/// in an inconsistent state by a panic.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
