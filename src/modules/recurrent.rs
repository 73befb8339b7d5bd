use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Lstm, LstmConfig};
use burn::tensor::{backend::Backend, Tensor};

use crate::modules::layer::PieceLayer;
use crate::shape::SymbolicShape;

/// Encodes a piece with an LSTM and keeps the last hidden state.
#[derive(Module, Debug)]
pub struct RecurrentEncoder<B: Backend> {
    lstm: Lstm<B>,
    dropout: Dropout,
    d_hidden: usize,
}

impl<B: Backend> RecurrentEncoder<B> {
    /// `[batch, seq, d_input]` to `[batch, 1, d_hidden]`. An empty sequence
    /// encodes to zeros.
    pub fn encode(&self, x: Tensor<B, 3>, training: bool) -> Tensor<B, 3> {
        let [batch, d_seq, _] = x.dims();
        if d_seq == 0 {
            return Tensor::zeros_device([batch, 1, self.d_hidden], &x.device());
        }

        let (_, hidden_state) = self.lstm.forward(x, None);

        let last_hidden_state = {
            let [batch, d_seq, d_hidden] = hidden_state.dims();
            hidden_state.slice([0..batch, d_seq - 1..d_seq, 0..d_hidden])
        };

        if training {
            self.dropout.forward(last_hidden_state)
        } else {
            last_hidden_state
        }
    }
}

impl<B: Backend> PieceLayer<B, 3> for RecurrentEncoder<B> {
    fn forward(&self, piece: Tensor<B, 3>) -> Tensor<B, 3> {
        self.encode(piece, false)
    }

    fn forward_training(&self, piece: Tensor<B, 3>, training: bool) -> Tensor<B, 3> {
        self.encode(piece, training)
    }

    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        vec![input_shape[0], Some(1), Some(self.d_hidden)]
    }
}

#[derive(Config, Debug)]
pub struct RecurrentEncoderConfig {
    d_input: usize,
    d_hidden: usize,

    #[config(default = true)]
    bias: bool,

    #[config(default = 0.0)]
    dropout: f64,
}

impl RecurrentEncoderConfig {
    pub fn init<B: Backend>(&self) -> RecurrentEncoder<B> {
        RecurrentEncoder {
            lstm: LstmConfig::new(self.d_input, self.d_hidden, self.bias).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            d_hidden: self.d_hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn keeps_last_hidden_state() {
        let encoder = RecurrentEncoderConfig::new(4, 3).init::<TestBackend>();
        let piece = Tensor::<TestBackend, 3>::from_floats([[[1.0, 3.0, 2.0, 5.0], [7.0, 4.0, 2.0, 3.0]]]);

        let output = encoder.forward(piece);

        assert_eq!(output.dims(), [1, 1, 3]);
        assert_eq!(
            encoder.output_shape(&[None, None, Some(4)]),
            vec![None, Some(1), Some(3)]
        );
    }

    #[test]
    fn empty_sequence_encodes_to_zeros() {
        let device = Default::default();
        let encoder = RecurrentEncoderConfig::new(4, 3).init::<TestBackend>();
        let piece = Tensor::<TestBackend, 3>::zeros_device([1, 0, 4], &device);

        let output = encoder.encode(piece, false);

        assert_eq!(output.dims(), [1, 1, 3]);
        assert_eq!(output.into_data().value, vec![0.0; 3]);
    }
}
