//! Error types for kernel operations.

use core::fmt;

/// Result type for fallible kernel operations.
pub type KernelResult<T> = Result<T, SpawnError>;

/// Errors that can occur during thread spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// Every pool slot is in use.
    PoolExhausted,
    /// The allocator could not provide a stack.
    OutOfMemory,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::PoolExhausted => write!(f, "thread pool exhausted"),
            SpawnError::OutOfMemory => write!(f, "out of memory for thread stack"),
        }
    }
}
