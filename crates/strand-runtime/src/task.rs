//! Stackful cooperative tasks
//!
//! One task per connection. A task owns its stack and its entry
//! closure; the owning worker destroys it in a single step at the
//! scheduler boundary once the entry function has returned.

use crate::arch::{self, SavedRegs};
use crate::stack::Stack;
use crate::tls;
use crate::worker::Worker;

use strand_core::EngineResult;

use std::os::unix::io::RawFd;
use std::ptr::NonNull;
use std::time::Instant;

/// Direction a parked task is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Read,
    Write,
}

/// One in-flight connection's execution context
pub struct Task {
    /// Saved machine context; entered by the scheduler, saved on yield
    pub(crate) regs: SavedRegs,

    /// Private stack; freed together with the task
    stack: Stack,

    /// fd this task is parked on, -1 while runnable
    pub(crate) fd: RawFd,

    /// Direction of the park
    pub(crate) wait_kind: WaitKind,

    /// Optional wake deadline for timed receives
    pub(crate) deadline: Option<Instant>,

    /// Set by the finish path when the entry function has returned
    pub(crate) finished: bool,

    /// Entry closure, taken exactly once by the trampoline path
    entry: Option<Box<dyn FnOnce(&Worker)>>,
}

impl Task {
    /// Allocate a task with a private stack and a context that enters
    /// `entry` on first switch.
    ///
    /// The returned pointer is owned by the calling worker; it must be
    /// released with [`Task::destroy`].
    pub(crate) fn create(
        entry: Box<dyn FnOnce(&Worker)>,
        stack_size: usize,
    ) -> EngineResult<NonNull<Task>> {
        let stack = Stack::allocate(stack_size)?;

        let mut task = Box::new(Task {
            regs: SavedRegs::default(),
            stack,
            fd: -1,
            wait_kind: WaitKind::Read,
            deadline: None,
            finished: false,
            entry: Some(entry),
        });

        let arg = &mut *task as *mut Task as usize;
        let stack_top = task.stack.top();
        unsafe {
            arch::init_context(&mut task.regs, stack_top, task_entry as usize, arg);
        }

        Ok(unsafe { NonNull::new_unchecked(Box::into_raw(task)) })
    }

    /// Free the task record and its stack.
    ///
    /// # Safety
    ///
    /// `ptr` must have come from [`Task::create`] and must not be
    /// referenced afterwards. The task must not be the one currently
    /// executing on its stack.
    pub(crate) unsafe fn destroy(ptr: NonNull<Task>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

/// First Rust frame of every task, entered via the arch trampoline.
///
/// Runs the entry closure, then hands control back to the scheduler
/// through the worker's finish path. The closure's heap allocation is
/// released by the call itself; nothing is allocated or freed between
/// marking the task finished and the final context switch.
pub(crate) extern "C" fn task_entry(task_ptr: usize) {
    let task = task_ptr as *mut Task;
    let worker = tls::current_worker().expect("task started outside a worker thread");

    let entry = unsafe { (*task).entry.take().expect("task entered twice") };
    entry(worker);

    worker.finish_current();
}
