use burn::config::Config;
use burn::tensor::{backend::Backend, Tensor};

use crate::error::PiecewiseError;
use crate::modules::pool::{PoolRegistry, PoolType};
use crate::positions::{PosType, PositionInput};
use crate::shape::SymbolicShape;

use super::segment::segment_1d;

/// Pools a fixed number of pieces out of every sequence.
///
/// Empty pieces pool to zeros. The pooling is resolved on every call, so a
/// custom pooling missing from the registry surfaces as
/// [`PiecewiseError::PoolTypeNotImplemented`] on the first forward.
#[derive(Debug, Clone)]
pub struct PiecewisePool<B: Backend> {
    piece_num: usize,
    pool_type: PoolType,
    pos_type: PosType,
    registry: PoolRegistry<B>,
}

impl<B: Backend> PiecewisePool<B> {
    pub fn piece_num(&self) -> usize {
        self.piece_num
    }

    pub fn pool_type(&self) -> &PoolType {
        &self.pool_type
    }

    pub fn config(&self) -> PiecewisePoolConfig {
        PiecewisePoolConfig::new(self.piece_num)
            .with_pool_type(self.pool_type.clone())
            .with_pos_type(self.pos_type)
    }

    /// `[batch, len, ...]` with positions `[batch, width]` to
    /// `[batch, piece_num, ...]`.
    pub fn forward<const D: usize>(
        &self,
        data: Tensor<B, D>,
        positions: impl PositionInput<B>,
    ) -> Result<Tensor<B, D>, PiecewiseError> {
        let pooling = self.pool_type.resolve(&self.registry)?;

        let positions = positions.into_int();
        let [_, width] = positions.dims();
        let pieces = self.pos_type.piece_count(width);
        if pieces != self.piece_num {
            return Err(PiecewiseError::PieceCountMismatch {
                expected: self.piece_num,
                actual: pieces,
            });
        }

        segment_1d(&pooling, self.pos_type, data, positions, false)
    }

    pub fn output_shape(&self, data_shape: &[Option<usize>]) -> SymbolicShape {
        [data_shape.first().copied().flatten(), Some(self.piece_num)]
            .into_iter()
            .chain(data_shape.get(2..).unwrap_or_default().iter().copied())
            .collect()
    }
}

#[derive(Config, Debug)]
pub struct PiecewisePoolConfig {
    piece_num: usize,

    #[config(default = "PoolType::Max")]
    pool_type: PoolType,

    #[config(default = "PosType::Segments")]
    pos_type: PosType,
}

impl PiecewisePoolConfig {
    pub fn init<B: Backend>(&self) -> PiecewisePool<B> {
        self.init_with(PoolRegistry::new())
    }

    /// Builds the layer with custom poolings available by name.
    pub fn init_with<B: Backend>(&self, registry: PoolRegistry<B>) -> PiecewisePool<B> {
        PiecewisePool {
            piece_num: self.piece_num,
            pool_type: self.pool_type.clone(),
            pos_type: self.pos_type,
            registry,
        }
    }
}
