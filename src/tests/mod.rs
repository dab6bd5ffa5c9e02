//! In-crate test suite, run on a hosted target.
//!
//! Context switching is real here: the host implementation of the switch
//! primitive works in user mode, so worker threads genuinely run on their
//! own stacks.

mod helpers;
mod property;
