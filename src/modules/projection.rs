use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::layer::PieceLayer;
use crate::shape::SymbolicShape;

/// Linear projection of the last axis, applied at every step of a piece.
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    linear: Linear<B>,
    d_output: usize,
}

impl<B: Backend, const D: usize> PieceLayer<B, D> for Projection<B> {
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D> {
        self.linear.forward(piece)
    }

    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        let mut shape = input_shape.to_vec();
        if let Some(last) = shape.last_mut() {
            *last = Some(self.d_output);
        }
        shape
    }
}

#[derive(Config, Debug)]
pub struct ProjectionConfig {
    d_input: usize,
    d_output: usize,

    #[config(default = true)]
    bias: bool,
}

impl ProjectionConfig {
    pub fn init<B: Backend>(&self) -> Projection<B> {
        Projection {
            linear: LinearConfig::new(self.d_input, self.d_output)
                .with_bias(self.bias)
                .init(),
            d_output: self.d_output,
        }
    }
}
