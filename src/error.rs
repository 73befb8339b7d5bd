use thiserror::Error;

/// Errors raised while configuring or running a piecewise layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PiecewiseError {
    #[error("No implementation for position type: {0}")]
    PosTypeNotImplemented(String),

    #[error("No implementation for pooling type: {0}")]
    PoolTypeNotImplemented(String),

    #[error("Batch mismatch: data has {data} samples but positions have {positions}")]
    BatchMismatch { data: usize, positions: usize },

    #[error("Piece count mismatch: expected {expected} pieces, positions decode to {actual}")]
    PieceCountMismatch { expected: usize, actual: usize },

    #[error("Input rank too low: expected at least {expected} dims, got {actual}")]
    RankTooLow { expected: usize, actual: usize },

    #[error("Inner layer returned shape {actual:?}, piece axes must be reduced to size 1")]
    PieceOutputShape { actual: Vec<usize> },

    #[error("Empty piece {start}..{end} in sample {sample} and the inner layer defines no empty output")]
    EmptyPiece {
        sample: usize,
        start: usize,
        end: usize,
    },

    #[error("Cannot infer output shape {0:?} for an input without pieces")]
    UnresolvedShape(Vec<Option<usize>>),
}
