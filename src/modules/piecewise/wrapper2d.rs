use burn::config::Config;
use burn::tensor::{backend::Backend, Tensor};

use crate::error::PiecewiseError;
use crate::modules::layer::PieceLayer;
use crate::positions::{PosType, PositionInput};
use crate::shape::SymbolicShape;

use super::segment::{output_shape_2d, segment_2d};

/// Applies an inner layer to every box of a grid.
///
/// Data `[batch, rows, cols, ...]` is cut along both spatial axes; box `(r, c)`
/// covers `rows[r-1]..rows[r]` by `cols[c-1]..cols[c]`. The output is
/// `[batch, row pieces, col pieces, ...]`.
#[derive(Debug, Clone)]
pub struct Piecewise2d<L> {
    layer: L,
    pos_type: PosType,
}

impl<L> Piecewise2d<L> {
    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn pos_type(&self) -> PosType {
        self.pos_type
    }

    pub fn config(&self) -> Piecewise2dConfig {
        Piecewise2dConfig::new().with_pos_type(self.pos_type)
    }

    pub fn forward<B, const D: usize>(
        &self,
        data: Tensor<B, D>,
        rows: impl PositionInput<B>,
        cols: impl PositionInput<B>,
    ) -> Result<Tensor<B, D>, PiecewiseError>
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        self.forward_training(data, rows, cols, false)
    }

    pub fn forward_training<B, const D: usize>(
        &self,
        data: Tensor<B, D>,
        rows: impl PositionInput<B>,
        cols: impl PositionInput<B>,
        training: bool,
    ) -> Result<Tensor<B, D>, PiecewiseError>
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        segment_2d(
            &self.layer,
            self.pos_type,
            data,
            rows.into_int(),
            cols.into_int(),
            training,
        )
    }

    pub fn output_shape<B, const D: usize>(
        &self,
        data_shape: &[Option<usize>],
        rows_shape: &[Option<usize>],
        cols_shape: &[Option<usize>],
    ) -> SymbolicShape
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        output_shape_2d::<B, L, D>(
            &self.layer,
            self.pos_type,
            data_shape,
            rows_shape,
            cols_shape,
        )
    }
}

#[derive(Config, Debug)]
pub struct Piecewise2dConfig {
    #[config(default = "PosType::Segments")]
    pos_type: PosType,
}

impl Piecewise2dConfig {
    pub fn init<L>(&self, layer: L) -> Piecewise2d<L> {
        Piecewise2d {
            layer,
            pos_type: self.pos_type,
        }
    }
}
