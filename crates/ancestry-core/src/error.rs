//! Engine-level error type, wrapping [`ancestry_foundation::FoundationError`]
//! per the taxonomy in spec §7.

use ancestry_foundation::FoundationError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("foundation error: {0}")]
    Foundation(#[from] FoundationError),

    /// Persistence failure (§7: bubbles to the orchestrator, which marks the
    /// job failed while preserving partial state already written).
    #[error("repository error: {0}")]
    Repository(String),

    /// An uncaught fault in the orchestrator itself; never propagated past
    /// `run_job`, which converts it into a `Failed` job status instead.
    #[error("engine fault: {0}")]
    EngineFault(String),

    /// The job was cancelled by an external signal (§5).
    #[error("job cancelled: {0}")]
    Cancelled(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
