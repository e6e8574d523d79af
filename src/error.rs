use thiserror::Error;

/// Errors produced by the tracking core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("cost matrix is {rows}x{cols}; rectangular matrices need extend_cost")]
    NonSquareCost { rows: usize, cols: usize },

    #[error("linear assignment solver failed: {0}")]
    Assignment(String),

    /// Association kept failing; the frames were processed with every
    /// affected stage left unmatched.
    #[error("linear assignment failed in {frames} consecutive frames")]
    PersistentSolverFailure { frames: u32 },
}
