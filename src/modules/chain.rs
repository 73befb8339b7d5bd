use burn::tensor::{backend::Backend, Tensor};

use crate::modules::layer::PieceLayer;
use crate::shape::{self, SymbolicShape};

/// Applies `first`, then `second`, to every piece.
#[derive(Debug, Clone)]
pub struct Chain<F, S> {
    first: F,
    second: S,
}

impl<F, S> Chain<F, S> {
    pub fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &F {
        &self.first
    }

    pub fn second(&self) -> &S {
        &self.second
    }
}

impl<B, F, S, const D: usize> PieceLayer<B, D> for Chain<F, S>
where
    B: Backend,
    F: PieceLayer<B, D>,
    S: PieceLayer<B, D>,
{
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D> {
        self.second.forward(self.first.forward(piece))
    }

    fn forward_training(&self, piece: Tensor<B, D>, training: bool) -> Tensor<B, D> {
        let x = self.first.forward_training(piece, training);
        self.second.forward_training(x, training)
    }

    fn forward_empty(
        &self,
        dims: [usize; D],
        device: &B::Device,
        training: bool,
    ) -> Option<Tensor<B, D>> {
        if let Some(x) = self.first.forward_empty(dims, device, training) {
            return Some(self.second.forward_training(x, training));
        }

        // The first layer keeps the piece empty, let the second one decide.
        let inner = shape::resolve(&self.first.output_shape(&shape::known(&dims)))?;
        let inner: [usize; D] = inner.try_into().ok()?;
        self.second.forward_empty(inner, device, training)
    }

    fn build(&self, input_dims: [usize; D]) {
        self.first.build(input_dims);
        if let Some(inner) = shape::resolve(&self.first.output_shape(&shape::known(&input_dims))) {
            if let Ok(inner) = inner.try_into() {
                self.second.build(inner);
            }
        }
    }

    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        self.second
            .output_shape(&self.first.output_shape(input_shape))
    }
}
