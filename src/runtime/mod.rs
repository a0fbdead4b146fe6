//! Fiber bookkeeping and the round-robin dispatcher.
//!
//! One [`Scheduler`] lives in thread local storage. The orchestrating caller
//! (whoever ran [`initialize`]) and each task own one logical thread of
//! control; [`context_switch::jump`] moves the CPU between them, so exactly
//! one of them is ever executing.

use std::any::Any;
use std::num::NonZeroUsize;
use std::{mem, panic};

mod context_switch;
mod stack;
mod tls;

use context_switch::Continuation;
use stack::{Stack, StackError};

/// Maximum number of concurrently live tasks.
pub const MAX_TASKS: usize = 128;

/// Usable stack memory per task, in bytes.
///
/// Rounded up to whole pages. An extra guard page below the stack turns an
/// overflow into a fault instead of silent corruption.
pub const STACK_SIZE: usize = 64 * 1024;

/// Prepares the current thread for spawning tasks.
///
/// Call once before any other operation. Calling again before any spawn is
/// harmless; calling with unfinished tasks discards them and unmaps their
/// stacks.
///
/// # Panics
/// If called from inside a task: the running task's stack can't be discarded
/// out from under it.
pub fn initialize() {
    tls::install(Scheduler::new());
}

/// Registers `entry` to run concurrently on its own stack.
///
/// The task doesn't run yet: it's appended after all live tasks and first
/// runs when the round-robin cycle reaches it, during some later
/// [`yield_now`] or [`join_all`]. Works from the orchestrating caller and
/// from inside a task.
///
/// # Errors
/// [`SpawnError`](crate::SpawnError) variants, all of which leave the task
/// table untouched.
///
/// # Examples
/// ```
/// weft::initialize();
///
/// weft::spawn(|| println!("hello from a fiber")).unwrap();
///
/// weft::join_all();
/// ```
pub fn spawn(entry: impl FnOnce() + 'static) -> Result<(), crate::SpawnError> {
    if tls::scheduler(|s| s.tasks.len()) == MAX_TASKS {
        return Err(crate::SpawnError::TooManyTasks);
    }

    let usable_pages = NonZeroUsize::new(STACK_SIZE.div_ceil(stack::page_size())).unwrap();
    let stack = Stack::new(NonZeroUsize::MIN, usable_pages).map_err(|error| match error {
        StackError::Map(e) => crate::SpawnError::StackAllocation(e),
        StackError::Guard(e) => crate::SpawnError::StackProtection(e),
    })?;

    let continuation = unsafe { context_switch::prepare_stack(stack.base(), task_trampoline) };

    tls::scheduler(|s| {
        tracing::trace!(task = s.tasks.len(), stack_size = STACK_SIZE, "spawned");
        s.tasks.push(Task {
            entry: Some(Box::new(entry)),
            continuation,
            stack,
            finished: false,
        });
    });

    Ok(())
}

/// Entered by the first jump to a spawned task's continuation.
extern "C" fn task_trampoline() -> ! {
    let entry = tls::scheduler(|s| s.running().entry.take());
    let entry = entry.expect("task entered twice");

    // unwinding into the synthetic frame below would be undefined behavior
    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| entry()));

    tls::scheduler(|s| {
        s.running().finished = true;
        if let Err(payload) = result {
            s.panic = Some(payload);
        }
    });

    // nobody resumes a finished task, its continuation goes to a throwaway
    let mut retired = mem::MaybeUninit::uninit();
    let main = tls::scheduler(|s| s.main.as_ptr());
    unsafe { context_switch::jump(retired.as_mut_ptr(), main) };
    unreachable!()
}

/// Cooperatively gives up the CPU.
///
/// From inside a task: suspends the task and returns control to the
/// orchestrating caller; the call returns when the round-robin cycle next
/// reaches the task.
///
/// From the orchestrating caller: performs one dispatch step, resuming the
/// next task in round-robin order until it yields or finishes. Returns
/// immediately if there are no tasks.
pub fn yield_now() {
    if tls::scheduler(|s| s.in_task) {
        let (from, to) = tls::scheduler(|s| {
            let from = &mut s.running().continuation as *mut Continuation;
            let to = s.main.as_ptr();
            (from, to)
        });
        // borrow released above, the next borrow happens after resumption
        unsafe { context_switch::jump(from, to) };
    } else {
        dispatch();
    }
}

/// One dispatch step: advance the round-robin cursor, run that task until it
/// yields or finishes, then settle the bookkeeping.
fn dispatch() {
    let pointers = tls::scheduler(|s| {
        if s.tasks.is_empty() {
            return None;
        }

        let next = match s.running_task {
            None => 0,
            Some(index) => (index + 1) % s.tasks.len(),
        };
        s.running_task = Some(next);
        s.in_task = true;

        let from = s.main.as_mut_ptr();
        let to = &s.tasks[next].continuation as *const Continuation;
        Some((from, to))
    });

    let Some((from, to)) = pointers else { return };
    unsafe { context_switch::jump(from, to) };

    // the task yielded or finished
    let panicked = tls::scheduler(|s| {
        s.in_task = false;

        let index = s.running_task.expect("dispatch returned without a task");
        if s.tasks[index].finished {
            // swap-remove keeps live tasks compacted; the displaced task
            // inherits an index the cursor has already advanced past
            let task = s.tasks.swap_remove(index);
            tracing::trace!(
                task = index,
                stack = ?task.stack.base(),
                remaining = s.tasks.len(),
                "finished"
            );
            drop(task); // unmaps the stack
        } else {
            tracing::trace!(task = index, "yielded");
        }

        s.panic.take()
    });

    if let Some(payload) = panicked {
        panic::resume_unwind(payload);
    }
}

/// Blocks until every task has finished.
///
/// From the orchestrating caller, dispatches tasks until none remain. From
/// inside a task, dispatches (by yielding) until the calling task is the
/// only one left; a task can't wait for itself to finish.
///
/// Returns immediately when there's nothing to wait for. Never returns early:
/// a task that neither yields nor returns makes this loop forever, which is
/// the documented price of cooperative scheduling.
pub fn join_all() {
    let lower_bound = usize::from(tls::scheduler(|s| s.in_task));

    while tls::scheduler(|s| s.tasks.len()) > lower_bound {
        yield_now();
    }
}

/// Number of live tasks on this thread's scheduler.
pub fn active_tasks() -> usize {
    tls::scheduler(|s| s.tasks.len())
}

/// Scheduler state for one thread: the task table plus dispatch bookkeeping.
struct Scheduler {
    /// Live tasks, compacted: every slot holds a task that hasn't been
    /// reclaimed yet. Capacity is reserved once so slots never reallocate.
    tasks: Vec<Task>,

    /// Slot of the task currently (or most recently) dispatched.
    /// `None` until the first dispatch.
    running_task: Option<usize>,

    /// Whether control is inside a task, as opposed to the orchestrating
    /// caller. Decides which way [`yield_now`] switches.
    in_task: bool,

    /// The orchestrating caller's continuation. Written by every dispatch
    /// switch before any task could read it.
    main: mem::MaybeUninit<Continuation>,

    /// Payload of a task that panicked, rethrown by the dispatcher once the
    /// task's slot has been reclaimed.
    panic: Option<Box<dyn Any + Send>>,
}

impl Scheduler {
    fn new() -> Self {
        Scheduler {
            tasks: Vec::with_capacity(MAX_TASKS),
            running_task: None,
            in_task: false,
            main: mem::MaybeUninit::uninit(),
            panic: None,
        }
    }

    fn running(&mut self) -> &mut Task {
        let index = self.running_task.expect("no task is running");
        &mut self.tasks[index]
    }
}

struct Task {
    /// Taken by the trampoline on the task's first run.
    entry: Option<Box<dyn FnOnce()>>,

    /// Where the task resumes: primed at the trampoline before the first
    /// run, then wherever the task last yielded.
    continuation: Continuation,

    /// Exclusively owned; unmapped when the task's slot is reclaimed.
    stack: Stack,

    /// Set once the entry function has returned (or panicked). The
    /// dispatcher reclaims the slot the moment it observes this.
    finished: bool,
}
