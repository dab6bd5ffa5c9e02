//! Thread control blocks.

use crate::arch::Arch;
use crate::mem::Stack;
use crate::sched::queue::Linked;

/// Lifecycle of a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Slot is on the free list awaiting a spawn.
    Free,
    /// Slot is on the ready list awaiting dispatch.
    Ready,
    /// Slot is the current thread.
    Running,
    /// Slot is parked on a mutex wait list.
    Blocked,
}

/// One pool slot: saved context, stack, pending entry point, and the
/// intrusive link that threads it onto whichever queue currently owns it.
pub(crate) struct Tcb<A: Arch> {
    pub(crate) context: A::SavedContext,
    pub(crate) stack: Option<Stack>,
    pub(crate) entry: Option<fn(i32)>,
    pub(crate) arg: i32,
    pub(crate) state: ThreadState,
    pub(crate) next: Option<usize>,
}

impl<A: Arch> Tcb<A> {
    /// A worker slot backed by its own stack. Starts free; `entry` and
    /// `arg` are filled in at spawn time.
    pub(crate) fn new_worker(stack: Stack) -> Self {
        Self {
            context: A::SavedContext::default(),
            stack: Some(stack),
            entry: None,
            arg: 0,
            state: ThreadState::Free,
            next: None,
        }
    }

    /// The bootstrap slot. It runs on the stack that entered the kernel,
    /// so it owns no pool stack, and it is never on the free list.
    pub(crate) fn bootstrap() -> Self {
        Self {
            context: A::SavedContext::default(),
            stack: None,
            entry: None,
            arg: 0,
            state: ThreadState::Running,
            next: None,
        }
    }
}

impl<A: Arch> Linked for Tcb<A> {
    fn next_slot(&self) -> Option<usize> {
        self.next
    }

    fn set_next_slot(&mut self, next: Option<usize>) {
        self.next = next;
    }
}
