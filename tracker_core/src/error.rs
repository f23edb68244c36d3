//! Error types for the LAP tracker.

use crate::types::SpotId;
use thiserror::Error;

/// Result type alias for the tracker library
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors raised by the tracker, its cost builders and its result graph.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("invalid tracker settings: {0}")]
    InvalidSettings(String),

    #[error("the spot collection is empty")]
    EmptyInput,

    #[error("spot {0} appears more than once in the collection")]
    DuplicateSpot(SpotId),

    #[error("spot {id} has {actual} coordinates, expected {expected}")]
    DimensionMismatch {
        id: SpotId,
        expected: usize,
        actual: usize,
    },

    #[error("there are no track segments to link")]
    NoTrackSegments,

    #[error("inconsistent cost matrix: {0}")]
    InconsistentCostMatrix(String),

    #[error("spot {0} is not a vertex of the result graph")]
    UnknownVertex(SpotId),

    #[error("refusing self-loop on spot {0}")]
    SelfLoop(SpotId),

    #[error("edge {source_id} -> {target_id} already exists")]
    DuplicateEdge { source_id: SpotId, target_id: SpotId },

    #[error("could not build the worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn settings<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn cost_matrix<S: Into<String>>(msg: S) -> Self {
        Self::InconsistentCostMatrix(msg.into())
    }
}

/// Failures of an assignment solver on one cost matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("cost matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("cost matrix entry ({row}, {col}) is NaN")]
    NotANumber { row: usize, col: usize },

    #[error("cost matrix entry ({row}, {col}) is negative infinity")]
    NegativeInfinity { row: usize, col: usize },

    #[error("cost matrix of size {size} cannot be scaled to integer weights without overflow")]
    Overflow { size: usize },

    #[error("solver returned an incomplete assignment ({assigned} of {size} rows)")]
    Incomplete { assigned: usize, size: usize },
}
