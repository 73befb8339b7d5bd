//! Piecewise wrappers for burn layers.
//!
//! A sequence (or grid) is cut into pieces at per-sample boundary positions,
//! an inner layer or pooling is applied to each piece on its own, and the
//! results are stacked into a tensor with a fixed number of pieces.
//!
//! ```ignore
//! let piecewise = PiecewiseConfig::new().init(Pooling::Max);
//! // data: [batch, len, features], positions: [batch, pieces]
//! let pooled = piecewise.forward(data, positions)?;
//! ```

pub mod error;
pub mod modules;
pub mod positions;
pub mod shape;
pub mod utils;

pub use error::PiecewiseError;
pub use modules::layer::PieceLayer;
pub use modules::piecewise::{
    Piecewise, Piecewise2d, Piecewise2dConfig, PiecewiseConfig, PiecewisePool,
    PiecewisePoolConfig,
};
pub use modules::pool::{GridPooling, PoolRegistry, PoolType, Pooling};
pub use positions::{PosType, PositionInput};
