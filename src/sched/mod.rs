//! Scheduling data structures.
//!
//! One intrusive list type serves every thread-lifecycle queue in the
//! kernel: the free list, the ready list, and each mutex's wait list.

pub mod queue;

pub use queue::Queue;
