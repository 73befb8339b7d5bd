pub mod chain;
pub mod layer;
pub mod lazy;
pub mod piecewise;
pub mod pool;
pub mod projection;
pub mod recurrent;
