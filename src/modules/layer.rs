use burn::tensor::{backend::Backend, Tensor};

use crate::shape::SymbolicShape;

/// A layer applied independently to every piece of a piecewise input.
///
/// The piece keeps a singleton batch axis. Layers used directly under a
/// piecewise wrapper reduce the piece axes to size 1 and keep the rank, the
/// same way `max_dim` and `mean_dim` do.
pub trait PieceLayer<B: Backend, const D: usize> {
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D>;

    /// Forward with an explicit training mode. Layers without a training
    /// mode ignore the flag.
    fn forward_training(&self, piece: Tensor<B, D>, training: bool) -> Tensor<B, D> {
        let _ = training;
        self.forward(piece)
    }

    /// Output for an empty piece of the given shape, if the layer defines one.
    fn forward_empty(
        &self,
        dims: [usize; D],
        device: &B::Device,
        training: bool,
    ) -> Option<Tensor<B, D>> {
        let _ = (dims, device, training);
        None
    }

    /// Called with the full input shape before any piece is processed.
    fn build(&self, input_dims: [usize; D]) {
        let _ = input_dims;
    }

    /// Output shape for the given input shape, keeping the batch axis.
    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape;
}
