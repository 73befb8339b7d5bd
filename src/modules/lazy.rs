use core::fmt;

use burn::tensor::{backend::Backend, Tensor};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::modules::layer::PieceLayer;
use crate::shape::SymbolicShape;

type Builder<L> = Box<dyn Fn(&[usize]) -> L + Send + Sync>;

/// An inner layer built on first use from the shape of the input it wraps.
///
/// The shared layer is built exactly once; every later piece and sample
/// reuses it, so all pieces share one set of parameters.
pub struct LazyLayer<L> {
    layer: OnceCell<L>,
    builder: Builder<L>,
}

impl<L> LazyLayer<L> {
    pub fn new<F>(builder: F) -> Self
    where
        F: Fn(&[usize]) -> L + Send + Sync + 'static,
    {
        Self {
            layer: OnceCell::new(),
            builder: Box::new(builder),
        }
    }

    pub fn is_built(&self) -> bool {
        self.layer.get().is_some()
    }

    /// The built layer, if any piece has been processed yet.
    pub fn get(&self) -> Option<&L> {
        self.layer.get()
    }

    fn get_or_build(&self, dims: &[usize]) -> &L {
        self.layer.get_or_init(|| {
            debug!(?dims, "building lazy piece layer");
            (self.builder)(dims)
        })
    }
}

impl<L: fmt::Debug> fmt::Debug for LazyLayer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLayer")
            .field("layer", &self.layer.get())
            .finish()
    }
}

impl<B, L, const D: usize> PieceLayer<B, D> for LazyLayer<L>
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    fn forward(&self, piece: Tensor<B, D>) -> Tensor<B, D> {
        self.get_or_build(&piece.dims()).forward(piece)
    }

    fn forward_training(&self, piece: Tensor<B, D>, training: bool) -> Tensor<B, D> {
        self.get_or_build(&piece.dims())
            .forward_training(piece, training)
    }

    fn forward_empty(
        &self,
        dims: [usize; D],
        device: &B::Device,
        training: bool,
    ) -> Option<Tensor<B, D>> {
        self.get_or_build(&dims)
            .forward_empty(dims, device, training)
    }

    fn build(&self, input_dims: [usize; D]) {
        self.get_or_build(&input_dims).build(input_dims);
    }

    // Before the first forward, inference runs on a scratch layer so the
    // shared one is still built from real input dims. Unknown dims are seen
    // by the builder as 1.
    fn output_shape(&self, input_shape: &[Option<usize>]) -> SymbolicShape {
        match self.layer.get() {
            Some(layer) => layer.output_shape(input_shape),
            None => {
                let dims: Vec<usize> = input_shape.iter().map(|dim| dim.unwrap_or(1)).collect();
                (self.builder)(&dims).output_shape(input_shape)
            }
        }
    }
}
