mod pool;
mod segment;
mod wrapper;
mod wrapper2d;

pub use pool::{PiecewisePool, PiecewisePoolConfig};
pub use wrapper::{Piecewise, PiecewiseConfig};
pub use wrapper2d::{Piecewise2d, Piecewise2dConfig};
