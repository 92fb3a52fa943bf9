use std::fmt;

/// Error conditions the search core can raise.
///
/// Only [`GemError::ArchiveIo`] is fatal. Every other variant is handled
/// locally by the workspace that raised it and folded into the read's
/// [`crate::search::SearchStatus`] instead of aborting the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GemError {
    /// Malformed read: characters outside the allowed `{A,C,G,T,N}` alphabet.
    InvalidInput(String),
    /// The reference archive could not service a `text`/`rank`/`locate` request.
    ArchiveIo(String),
    /// Region count exceeded the configured cap; caller should degrade to
    /// fixed partitioning rather than treat this as a failure.
    OutOfBudget { region_count: usize, cap: usize },
    /// A GPU buffer `submit`/`wait` failed; caller should retry once then
    /// fall back to the CPU BPM path.
    GpuTransient(String),
    /// The per-read watchdog cancelled this read.
    Timeout,
}

impl fmt::Display for GemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GemError::InvalidInput(msg) => write!(f, "invalid read input: {}", msg),
            GemError::ArchiveIo(msg) => write!(f, "archive I/O error: {}", msg),
            GemError::OutOfBudget { region_count, cap } => write!(
                f,
                "region budget exceeded: {} regions against a cap of {}",
                region_count, cap
            ),
            GemError::GpuTransient(msg) => write!(f, "GPU buffer transient failure: {}", msg),
            GemError::Timeout => write!(f, "read processing cancelled by watchdog timeout"),
        }
    }
}

impl std::error::Error for GemError {}
