//! Timer tick and edge-triggered interrupt integration.
//!
//! Interrupt handlers are ordinary kernel entry points here: a tick counts
//! and then applies the configured [`TickPolicy`], an edge event spawns a
//! handler thread. The free functions at the bottom are the actual ISR
//! bodies; they act on whichever kernel was published with
//! [`Kernel::register_global`] and do nothing before that.

use crate::arch::Arch;
use crate::kernel::Kernel;

/// What a timer tick does after bumping the tick counter.
///
/// Deliberately not `PartialEq`: comparing the `Spawn` variant would
/// compare function pointers, which is unreliable across codegen units.
#[derive(Debug, Clone, Copy)]
pub enum TickPolicy {
    /// Yield the interrupted thread, round robin.
    Reschedule,
    /// Spawn `entry(arg)` as a fresh thread each tick.
    Spawn { entry: fn(i32), arg: i32 },
}

impl<A: Arch> Kernel<A> {
    /// Timer tick entry point: count the tick, then apply the policy.
    ///
    /// Under [`TickPolicy::Spawn`] pool exhaustion is fatal, exactly as it
    /// is for any other spawn.
    pub fn timer_tick(&self) {
        let n = self.bump_tick();
        log::trace!("kernel: tick {}", n);
        match self.current_tick_policy() {
            TickPolicy::Reschedule => self.yield_now(),
            TickPolicy::Spawn { entry, arg } => self.spawn(entry, arg),
        }
    }

    /// Edge-triggered interrupt entry point: spawn a handler thread.
    ///
    /// The handler goes to the head of the ready queue and runs at the
    /// interrupted thread's next yield.
    pub fn edge_trigger(&self, entry: fn(i32), arg: i32) {
        self.spawn(entry, arg);
    }
}

/// Timer ISR body. A no-op until a kernel is registered.
pub fn timer_isr() {
    if let Some(kernel) = Kernel::global() {
        kernel.timer_tick();
    }
}

/// Edge-interrupt ISR body. A no-op until a kernel is registered.
pub fn edge_isr(entry: fn(i32), arg: i32) {
    if let Some(kernel) = Kernel::global() {
        kernel.edge_trigger(entry, arg);
    }
}
