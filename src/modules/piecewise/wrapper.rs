use burn::config::Config;
use burn::tensor::{backend::Backend, Tensor};

use crate::error::PiecewiseError;
use crate::modules::layer::PieceLayer;
use crate::positions::{PosType, PositionInput};
use crate::shape::SymbolicShape;

use super::segment::{output_shape_1d, segment_1d};

/// Applies an inner layer to every piece of a sequence.
///
/// For data `[batch, len, ...]` and positions `[batch, width]` the output is
/// `[batch, pieces, ...]` where the trailing dims come from the inner layer.
/// The inner layer is shared by every piece and every sample.
#[derive(Debug, Clone)]
pub struct Piecewise<L> {
    layer: L,
    pos_type: PosType,
}

impl<L> Piecewise<L> {
    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn into_layer(self) -> L {
        self.layer
    }

    pub fn pos_type(&self) -> PosType {
        self.pos_type
    }

    pub fn config(&self) -> PiecewiseConfig {
        PiecewiseConfig::new().with_pos_type(self.pos_type)
    }

    pub fn forward<B, const D: usize>(
        &self,
        data: Tensor<B, D>,
        positions: impl PositionInput<B>,
    ) -> Result<Tensor<B, D>, PiecewiseError>
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        self.forward_training(data, positions, false)
    }

    /// Same as [`forward`](Self::forward), passing `training` to the inner layer.
    pub fn forward_training<B, const D: usize>(
        &self,
        data: Tensor<B, D>,
        positions: impl PositionInput<B>,
        training: bool,
    ) -> Result<Tensor<B, D>, PiecewiseError>
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        segment_1d(
            &self.layer,
            self.pos_type,
            data,
            positions.into_int(),
            training,
        )
    }

    pub fn output_shape<B, const D: usize>(
        &self,
        data_shape: &[Option<usize>],
        positions_shape: &[Option<usize>],
    ) -> SymbolicShape
    where
        B: Backend,
        L: PieceLayer<B, D>,
    {
        output_shape_1d::<B, L, D>(&self.layer, self.pos_type, data_shape, positions_shape)
    }
}

#[derive(Config, Debug)]
pub struct PiecewiseConfig {
    #[config(default = "PosType::Segments")]
    pos_type: PosType,
}

impl PiecewiseConfig {
    pub fn init<L>(&self, layer: L) -> Piecewise<L> {
        Piecewise {
            layer,
            pos_type: self.pos_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::chain::Chain;
    use crate::modules::lazy::LazyLayer;
    use crate::modules::pool::Pooling;
    use crate::modules::projection::ProjectionConfig;
    use crate::modules::recurrent::{RecurrentEncoder, RecurrentEncoderConfig};
    use crate::utils::temp_file;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Module;
    use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
    use burn::tensor::{Data, Int};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn sequences() -> Tensor<TestBackend, 3> {
        Tensor::from_floats([[
            [1.0, 3.0, 2.0, 5.0],
            [7.0, 4.0, 2.0, 3.0],
            [0.0, 1.0, 2.0, 2.0],
            [4.0, 7.0, 2.0, 5.0],
        ]])
    }

    #[test]
    fn max_pool_segments() {
        let piecewise = PiecewiseConfig::new().init(Pooling::<TestBackend>::Max);
        let data = Tensor::<TestBackend, 2>::from_floats([[1.0, 3.0, 5.0, 2.0], [1.0, 3.0, 5.0, 2.0]]);
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[2, 4], [3, 4]]);

        let output = piecewise.forward(data, positions).unwrap();

        output
            .into_data()
            .assert_approx_eq(&Data::from([[3.0, 5.0], [5.0, 2.0]]), 3);
    }

    #[test]
    fn average_pool_pairs() {
        let piecewise = PiecewiseConfig::new()
            .with_pos_type(PosType::Pairs)
            .init(Pooling::<TestBackend>::Average);
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[1, 3, 0, 4]]);

        let output = piecewise.forward(sequences(), positions).unwrap();

        output.into_data().assert_approx_eq(
            &Data::from([[[3.5, 2.5, 2.0, 2.5], [3.0, 3.75, 2.0, 3.75]]]),
            3,
        );
    }

    #[test]
    fn lstm_pieces() {
        let piecewise = PiecewiseConfig::new().init(RecurrentEncoderConfig::new(4, 3).init::<TestBackend>());
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 4]]);

        let output = piecewise.forward(sequences(), positions).unwrap();

        assert_eq!(output.dims(), [1, 3, 3]);
    }

    #[test]
    fn empty_piece_without_empty_output_fails() {
        let piecewise = PiecewiseConfig::new().init(RecurrentEncoderConfig::new(4, 3).init::<TestBackend>());
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[2, 2, 4]]);

        let err = piecewise.forward(sequences(), positions).unwrap_err();

        assert_eq!(
            err,
            PiecewiseError::EmptyPiece {
                sample: 0,
                start: 2,
                end: 2
            }
        );
    }

    #[test]
    fn unreduced_output_is_rejected() {
        let piecewise = PiecewiseConfig::new().init(ProjectionConfig::new(4, 2).init::<TestBackend>());
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[2, 4]]);

        let err = piecewise.forward(sequences(), positions).unwrap_err();

        assert_eq!(
            err,
            PiecewiseError::PieceOutputShape {
                actual: vec![1, 2, 2]
            }
        );
    }

    #[test]
    fn batch_mismatch_is_rejected() {
        let piecewise = PiecewiseConfig::new().init(Pooling::<TestBackend>::Max);
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[2, 4], [1, 4]]);

        let err = piecewise.forward(sequences(), positions).unwrap_err();

        assert_eq!(err, PiecewiseError::BatchMismatch { data: 1, positions: 2 });
    }

    #[test]
    fn lazy_layer_is_shared_by_all_pieces() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let layer = LazyLayer::new(move |dims: &[usize]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Chain::new(
                ProjectionConfig::new(dims[2], 2).init::<TestBackend>(),
                Pooling::<TestBackend>::Max,
            )
        });
        let piecewise = PiecewiseConfig::new().init(layer);
        let data = Tensor::cat(vec![sequences(), sequences()], 0);
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 4], [2, 3, 4]]);

        let output = piecewise.forward(data, positions).unwrap();

        assert_eq!(output.dims(), [2, 3, 2]);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn output_shape_uses_declared_width() {
        let piecewise = PiecewiseConfig::new()
            .with_pos_type(PosType::Pairs)
            .init(RecurrentEncoderConfig::new(4, 3).init::<TestBackend>());

        let shape = piecewise.output_shape::<TestBackend, 3>(&[None, None, Some(4)], &[None, Some(6)]);

        assert_eq!(shape, vec![None, Some(3), Some(3)]);
    }

    #[test]
    fn shape_inference_before_first_forward() {
        let layer = LazyLayer::new(|dims: &[usize]| {
            Chain::new(
                ProjectionConfig::new(dims[2], 2).init::<TestBackend>(),
                Pooling::<TestBackend>::Max,
            )
        });
        let piecewise = PiecewiseConfig::new().init(layer);

        let shape = piecewise.output_shape::<TestBackend, 3>(&[None, None, None], &[None, Some(3)]);
        assert_eq!(shape, vec![None, Some(3), Some(2)]);
        assert!(!piecewise.layer().is_built());

        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 4]]);
        let output = piecewise.forward(sequences(), positions).unwrap();

        assert_eq!(output.dims(), [1, 3, 2]);
    }

    #[test]
    fn dropout_only_applies_when_training() {
        let layer = LazyLayer::new(|dims: &[usize]| {
            Chain::new(
                RecurrentEncoderConfig::new(dims[2], 3)
                    .with_dropout(0.9)
                    .init::<TestBackend>(),
                Pooling::<TestBackend>::Max,
            )
        });
        let piecewise = PiecewiseConfig::new().init(layer);
        let positions = || Tensor::<TestBackend, 2, Int>::from_ints([[1, 2, 4]]);

        let eval = piecewise.forward(sequences(), positions()).unwrap();
        let again = piecewise.forward(sequences(), positions()).unwrap();
        let train = piecewise
            .forward_training(sequences(), positions(), true)
            .unwrap();

        assert_eq!(eval.dims(), [1, 3, 3]);
        assert_eq!(train.dims(), [1, 3, 3]);
        let eval = eval.into_data().value;
        assert_eq!(eval, again.into_data().value);
        assert_ne!(eval, train.into_data().value);
    }

    #[test]
    fn zero_pieces_use_inferred_shape() {
        let piecewise = PiecewiseConfig::new().init(Pooling::<TestBackend>::Max);
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[0; 0]]);

        let output = piecewise.forward(sequences(), positions).unwrap();

        assert_eq!(output.dims(), [1, 0, 4]);
    }

    #[test]
    fn gradients_reach_the_input() {
        let piecewise = PiecewiseConfig::new().init(Pooling::<TestBackend>::Average);
        let data = Tensor::<TestBackend, 2>::from_floats([[1.0, 3.0, 5.0, 2.0]]).require_grad();
        let positions = Tensor::<TestBackend, 2, Int>::from_ints([[1, 4]]);

        let output = piecewise.forward(data.clone(), positions).unwrap();
        let grads = output.sum().backward();
        let grad = data.grad(&grads).unwrap();

        grad.into_data().assert_approx_eq(
            &Data::from([[1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]]),
            3,
        );
    }

    #[test]
    fn save_and_load_reproduce_outputs() {
        let config = PiecewiseConfig::new().with_pos_type(PosType::Pairs);
        let encoder_config = RecurrentEncoderConfig::new(4, 3);
        let piecewise = config.init(encoder_config.init::<TestBackend>());
        let positions = || Tensor::<TestBackend, 2, Int>::from_ints([[0, 2, 1, 4]]);
        let expected = piecewise.forward(sequences(), positions()).unwrap();

        let config_path = temp_file("piecewise_save_load_config");
        let encoder_path = temp_file("piecewise_save_load_encoder");
        let config_path = config_path.to_str().unwrap();
        let encoder_path = encoder_path.to_str().unwrap();
        piecewise.config().save(config_path).unwrap();
        encoder_config.save(encoder_path).unwrap();

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let bytes = recorder
            .record(piecewise.into_layer().into_record(), ())
            .unwrap();

        let config = PiecewiseConfig::load(config_path).unwrap();
        let encoder: RecurrentEncoder<TestBackend> = RecurrentEncoderConfig::load(encoder_path)
            .unwrap()
            .init();
        let encoder = encoder.load_record(recorder.load(bytes).unwrap());
        let restored = config.init(encoder);

        assert_eq!(restored.pos_type(), PosType::Pairs);
        restored
            .forward(sequences(), positions())
            .unwrap()
            .into_data()
            .assert_approx_eq(&expected.into_data(), 5);
    }

    #[test]
    fn unknown_pos_type_fails_to_load() {
        let path = temp_file("piecewise_unknown_pos_type");
        let path = path.to_str().unwrap();
        std::fs::write(path, r#"{"pos_type":"whatever"}"#).unwrap();

        assert!(PiecewiseConfig::load(path).is_err());
    }
}
