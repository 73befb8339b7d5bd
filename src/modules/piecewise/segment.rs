//! Per-sample, per-piece application of an inner layer.
//!
//! Every piece is sliced out on its own, run through the shared inner layer
//! and concatenated back along the piece axes. Samples are handled one after
//! the other, nothing is carried from one piece to the next.

use core::ops::Range;

use burn::tensor::{backend::Backend, Int, Tensor};
use tracing::{debug, trace};

use crate::error::PiecewiseError;
use crate::modules::layer::PieceLayer;
use crate::positions::{PosType, Positions};
use crate::shape::{self, SymbolicShape};
use crate::utils::{piece_dims, piece_range, slice_piece};

pub(crate) fn segment_1d<B, L, const D: usize>(
    layer: &L,
    pos_type: PosType,
    data: Tensor<B, D>,
    positions: Tensor<B, 2, Int>,
    training: bool,
) -> Result<Tensor<B, D>, PiecewiseError>
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    check_rank(D, 2)?;
    let positions = Positions::from_tensor(positions);
    let dims = data.dims();
    let (batch, len) = (dims[0], dims[1]);
    check_batch(batch, positions.batch())?;

    let pieces = pos_type.piece_count(positions.width());
    debug!(batch, pieces, %pos_type, "applying layer piecewise");

    if batch == 0 || pieces == 0 {
        let shape = output_shape_1d::<B, L, D>(
            layer,
            pos_type,
            &shape::known(&dims),
            &[Some(batch), Some(positions.width())],
        );
        return zeros(shape, &data.device());
    }

    layer.build(dims);
    let device = data.device();

    let samples = (0..batch)
        .map(|sample| -> Result<Tensor<B, D>, PiecewiseError> {
            let outputs = pos_type
                .intervals(positions.sample(sample))
                .into_iter()
                .map(|(start, end)| {
                    let range = piece_range(start, end, len);
                    trace!(sample, start = range.start, end = range.end, "applying layer to piece");
                    apply_piece(layer, &data, sample, &[(1, range)], training, &device)
                })
                .collect::<Result<Vec<_>, PiecewiseError>>()?;

            Ok(Tensor::cat(outputs, 1))
        })
        .collect::<Result<Vec<_>, PiecewiseError>>()?;

    Ok(Tensor::cat(samples, 0))
}

pub(crate) fn segment_2d<B, L, const D: usize>(
    layer: &L,
    pos_type: PosType,
    data: Tensor<B, D>,
    rows: Tensor<B, 2, Int>,
    cols: Tensor<B, 2, Int>,
    training: bool,
) -> Result<Tensor<B, D>, PiecewiseError>
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    check_rank(D, 3)?;
    let rows = Positions::from_tensor(rows);
    let cols = Positions::from_tensor(cols);
    let dims = data.dims();
    let (batch, height, width) = (dims[0], dims[1], dims[2]);
    check_batch(batch, rows.batch())?;
    check_batch(batch, cols.batch())?;

    let row_pieces = pos_type.piece_count(rows.width());
    let col_pieces = pos_type.piece_count(cols.width());
    debug!(batch, row_pieces, col_pieces, %pos_type, "applying layer piecewise over grid");

    if batch == 0 || row_pieces == 0 || col_pieces == 0 {
        let shape = output_shape_2d::<B, L, D>(
            layer,
            pos_type,
            &shape::known(&dims),
            &[Some(batch), Some(rows.width())],
            &[Some(batch), Some(cols.width())],
        );
        return zeros(shape, &data.device());
    }

    layer.build(dims);
    let device = data.device();

    let samples = (0..batch)
        .map(|sample| -> Result<Tensor<B, D>, PiecewiseError> {
            let col_intervals = pos_type.intervals(cols.sample(sample));

            let row_outputs = pos_type
                .intervals(rows.sample(sample))
                .into_iter()
                .map(|(row_start, row_end)| -> Result<Tensor<B, D>, PiecewiseError> {
                    let row_range = piece_range(row_start, row_end, height);

                    let outputs = col_intervals
                        .iter()
                        .map(|(col_start, col_end)| {
                            let col_range = piece_range(*col_start, *col_end, width);
                            trace!(
                                sample,
                                rows = ?row_range,
                                cols = ?col_range,
                                "applying layer to box"
                            );
                            apply_piece(
                                layer,
                                &data,
                                sample,
                                &[(1, row_range.clone()), (2, col_range)],
                                training,
                                &device,
                            )
                        })
                        .collect::<Result<Vec<_>, PiecewiseError>>()?;

                    Ok(Tensor::cat(outputs, 2))
                })
                .collect::<Result<Vec<_>, PiecewiseError>>()?;

            Ok(Tensor::cat(row_outputs, 1))
        })
        .collect::<Result<Vec<_>, PiecewiseError>>()?;

    Ok(Tensor::cat(samples, 0))
}

/// `(batch, pieces) + trailing dims of the inner layer output`.
pub(crate) fn output_shape_1d<B, L, const D: usize>(
    layer: &L,
    pos_type: PosType,
    data_shape: &[Option<usize>],
    positions_shape: &[Option<usize>],
) -> SymbolicShape
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    let child = layer.output_shape(data_shape);
    let pieces = declared_pieces(pos_type, positions_shape);

    [data_shape.first().copied().flatten(), pieces]
        .into_iter()
        .chain(child.get(2..).unwrap_or_default().iter().copied())
        .collect()
}

/// `(batch, row pieces, col pieces) + trailing dims of the inner layer output`.
pub(crate) fn output_shape_2d<B, L, const D: usize>(
    layer: &L,
    pos_type: PosType,
    data_shape: &[Option<usize>],
    rows_shape: &[Option<usize>],
    cols_shape: &[Option<usize>],
) -> SymbolicShape
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    let child = layer.output_shape(data_shape);
    let rows = declared_pieces(pos_type, rows_shape);
    let cols = declared_pieces(pos_type, cols_shape);

    [data_shape.first().copied().flatten(), rows, cols]
        .into_iter()
        .chain(child.get(3..).unwrap_or_default().iter().copied())
        .collect()
}

fn declared_pieces(pos_type: PosType, positions_shape: &[Option<usize>]) -> Option<usize> {
    positions_shape
        .get(1)
        .copied()
        .flatten()
        .map(|width| pos_type.piece_count(width))
}

fn apply_piece<B, L, const D: usize>(
    layer: &L,
    data: &Tensor<B, D>,
    sample: usize,
    axes: &[(usize, Range<usize>)],
    training: bool,
    device: &B::Device,
) -> Result<Tensor<B, D>, PiecewiseError>
where
    B: Backend,
    L: PieceLayer<B, D>,
{
    let output = match axes.iter().find(|(_, range)| range.is_empty()) {
        Some((_, empty)) => layer
            .forward_empty(piece_dims(data.dims(), axes), device, training)
            .ok_or(PiecewiseError::EmptyPiece {
                sample,
                start: empty.start,
                end: empty.end,
            })?,
        None => layer.forward_training(slice_piece(data, sample, axes), training),
    };

    let dims = output.dims();
    if dims[0] != 1 || axes.iter().any(|(axis, _)| dims[*axis] != 1) {
        return Err(PiecewiseError::PieceOutputShape {
            actual: dims.to_vec(),
        });
    }

    Ok(output)
}

fn zeros<B: Backend, const D: usize>(
    shape: SymbolicShape,
    device: &B::Device,
) -> Result<Tensor<B, D>, PiecewiseError> {
    let dims: Option<[usize; D]> = shape::resolve(&shape).and_then(|dims| dims.try_into().ok());

    match dims {
        Some(dims) => Ok(Tensor::zeros_device(dims, device)),
        None => Err(PiecewiseError::UnresolvedShape(shape)),
    }
}

fn check_rank(actual: usize, expected: usize) -> Result<(), PiecewiseError> {
    if actual < expected {
        return Err(PiecewiseError::RankTooLow { expected, actual });
    }
    Ok(())
}

fn check_batch(data: usize, positions: usize) -> Result<(), PiecewiseError> {
    if data != positions {
        return Err(PiecewiseError::BatchMismatch { data, positions });
    }
    Ok(())
}
