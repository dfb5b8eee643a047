//! Thread-local storage for the running worker
//!
//! Each worker thread records itself here so task entry functions and
//! the finish path can find their owning worker without threading a
//! handle through the trampoline.

use crate::worker::Worker;
use std::cell::Cell;

thread_local! {
    static CURRENT_WORKER: Cell<*const Worker> = const { Cell::new(std::ptr::null()) };
}

/// Record the worker running on this OS thread.
pub(crate) fn set_current_worker(worker: &Worker) {
    CURRENT_WORKER.with(|cell| cell.set(worker as *const Worker));
}

/// Get the worker running on this OS thread, if any.
///
/// The returned reference is valid because a worker is owned by its
/// thread (via `Arc`) and outlives everything scheduled on it.
#[inline]
pub fn current_worker() -> Option<&'static Worker> {
    let ptr = CURRENT_WORKER.with(|cell| cell.get());
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { &*ptr })
    }
}

/// Check whether this OS thread is a worker thread.
#[inline]
pub fn is_worker_thread() -> bool {
    CURRENT_WORKER.with(|cell| !cell.get().is_null())
}
