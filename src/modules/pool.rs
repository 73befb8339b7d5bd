use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use burn::tensor::{backend::Backend, Shape, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::PiecewiseError;
use crate::modules::layer::PieceLayer;
use crate::shape::{self, SymbolicShape};

/// Custom pooling over a piece flattened to `[1, piece_len, features]`,
/// returning `[1, features]`.
pub type PoolFn<B> = Arc<dyn Fn(Tensor<B, 3>) -> Tensor<B, 2> + Send + Sync>;

/// Pooling kind as stored in configs. Any name other than `max` and
/// `average` refers to a pooling registered in a [`PoolRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PoolType {
    Max,
    Average,
    Custom(String),
}

impl PoolType {
    pub const MAX: &'static str = "max";
    pub const AVERAGE: &'static str = "average";

    pub fn custom(name: impl Into<String>) -> Self {
        PoolType::Custom(name.into())
    }

    /// Resolves the pooling, looking custom names up in `registry`.
    pub fn resolve<B: Backend>(
        &self,
        registry: &PoolRegistry<B>,
    ) -> Result<Pooling<B>, PiecewiseError> {
        match self {
            PoolType::Max => Ok(Pooling::Max),
            PoolType::Average => Ok(Pooling::Average),
            PoolType::Custom(name) => registry
                .get(name)
                .map(Pooling::Custom)
                .ok_or_else(|| PiecewiseError::PoolTypeNotImplemented(name.clone())),
        }
    }
}

impl From<String> for PoolType {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::MAX => PoolType::Max,
            Self::AVERAGE => PoolType::Average,
            _ => PoolType::Custom(value),
        }
    }
}

impl From<&str> for PoolType {
    fn from(value: &str) -> Self {
        PoolType::from(value.to_string())
    }
}

impl From<PoolType> for String {
    fn from(value: PoolType) -> Self {
        match value {
            PoolType::Max => PoolType::MAX.to_string(),
            PoolType::Average => PoolType::AVERAGE.to_string(),
            PoolType::Custom(name) => name,
        }
    }
}

/// Named custom poolings, consulted when a layer resolves its [`PoolType`].
pub struct PoolRegistry<B: Backend> {
    pools: HashMap<String, PoolFn<B>>,
}

impl<B: Backend> PoolRegistry<B> {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    pub fn with<F>(mut self, name: impl Into<String>, pool: F) -> Self
    where
        F: Fn(Tensor<B, 3>) -> Tensor<B, 2> + Send + Sync + 'static,
    {
        self.register(name, pool);
        self
    }

    pub fn register<F>(&mut self, name: impl Into<String>, pool: F)
    where
        F: Fn(Tensor<B, 3>) -> Tensor<B, 2> + Send + Sync + 'static,
    {
        self.pools.insert(name.into(), Arc::new(pool));
    }

    pub fn get(&self, name: &str) -> Option<PoolFn<B>> {
        self.pools.get(name).cloned()
    }
}

impl<B: Backend> Default for PoolRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Clone for PoolRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            pools: self.pools.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for PoolRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.pools.keys()).finish()
    }
}

/// Pooling over the piece axis (axis 1).
pub enum Pooling<B: Backend> {
    Max,
    Average,
    Custom(PoolFn<B>),
}

impl<B: Backend> Pooling<B> {
    fn reduce<const D: usize>(&self, piece: Tensor<B, D>, axes: &[usize]) -> Tensor<B, D> {
        match self {
            Pooling::Max => axes.iter().fold(piece, |x, axis| x.max_dim(*axis)),
            Pooling::Average => axes.iter().fold(piece, |x, axis| x.mean_dim(*axis)),
            Pooling::Custom(pool) => {
                let dims = piece.dims();
                let span: usize = axes.iter().map(|axis| dims[*axis]).product();
                let features: usize = dims
                    .iter()
                    .enumerate()
                    .filter(|(axis, _)| *axis != 0 && !axes.contains(axis))
                    .map(|(_, dim)| *dim)
                    .product();

                let pooled = pool(piece.reshape([1, span, features]));
                pooled.reshape(Shape::new(reduced_dims(dims, axes)))
            }
        }
    }
}

/// Dims of a keep-dim reduction over `axes` with a singleton batch.
fn reduced_dims<const D: usize>(dims: [usize; D], axes: &[usize]) -> [usize; D] {
    let mut dims = dims;
    dims[0] = 1;
    for axis in axes {
        dims[*axis] = 1;
    }
    dims
}

impl<B: Backend> Clone for Pooling<B> {
    fn clone(&self) -> Self {
        match self {
            Pooling::Max => Pooling::Max,
            Pooling::Average => Pooling::Average,
            Pooling::Custom(pool) => Pooling::Custom(pool.clone()),
        }
    }
}

impl<B: Backend> fmt::Debug for Pooling<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pooling::Max => f.write_str("Max"),
            Pooling::Average => f.write_str("Average"),
            Pooling::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl<B: Backend, const D: usize> PieceLayer<B, D> for Pooling<B> {
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D> {
        self.reduce(piece, &[1])
    }

    // Empty pieces pool to zeros.
    fn forward_empty(
        &self,
        dims: [usize; D],
        device: &B::Device,
        _training: bool,
    ) -> Option<Tensor<B, D>> {
        Some(Tensor::zeros_device(reduced_dims(dims, &[1]), device))
    }

    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        shape::reduced(input_shape, &[1])
    }
}

/// Pooling over a 2-D box (axes 1 and 2).
#[derive(Clone, Debug)]
pub struct GridPooling<B: Backend> {
    pooling: Pooling<B>,
}

impl<B: Backend> GridPooling<B> {
    pub fn new(pooling: Pooling<B>) -> Self {
        Self { pooling }
    }
}

impl<B: Backend, const D: usize> PieceLayer<B, D> for GridPooling<B> {
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D> {
        self.pooling.reduce(piece, &[1, 2])
    }

    fn forward_empty(
        &self,
        dims: [usize; D],
        device: &B::Device,
        _training: bool,
    ) -> Option<Tensor<B, D>> {
        Some(Tensor::zeros_device(reduced_dims(dims, &[1, 2]), device))
    }

    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        shape::reduced(input_shape, &[1, 2])
    }
}
