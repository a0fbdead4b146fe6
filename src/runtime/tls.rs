//! Thread local storage for the scheduler.

use std::cell::RefCell;

/// Cache padded to avoid potential performance hit due to false sharing.
#[repr(align(128))]
struct Cell(RefCell<Option<super::Scheduler>>);

thread_local! {
    /// Each thread gets its own independent scheduler.
    static SCHEDULER: Cell = Cell(RefCell::new(None));
}

/// Installs a fresh scheduler for the current thread, dropping any previous
/// one along with its remaining tasks.
pub(super) fn install(scheduler: super::Scheduler) {
    SCHEDULER.with(|tls| {
        let mut cell = tls.0.borrow_mut();
        if let Some(previous) = cell.as_ref() {
            assert!(
                !previous.in_task,
                "weft::initialize called from inside a task"
            );
        }
        *cell = Some(scheduler);
    });
}

/// Borrows the current thread's scheduler for the duration of the closure.
///
/// The borrow must not be held across a context switch: callers extract the
/// raw pointers they need and drop the borrow before jumping.
pub(super) fn scheduler<T>(f: impl FnOnce(&mut super::Scheduler) -> T) -> T {
    SCHEDULER.with(|tls| {
        let mut cell = tls.0.borrow_mut();
        let scheduler = cell
            .as_mut()
            .expect("no scheduler on this thread, call weft::initialize first");
        f(scheduler)
    })
}
