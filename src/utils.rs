use core::ops::Range;

use burn::tensor::{backend::Backend, Tensor};

/// Normalizes a raw bound the way Python slicing does: negative values count
/// from the end, everything is clamped to `0..=len`.
pub fn normalize_bound(bound: i64, len: usize) -> usize {
    let len_i64 = len as i64;
    let bound = if bound < 0 { len_i64 + bound } else { bound };
    bound.clamp(0, len_i64) as usize
}

/// Range covered by `start..end` along an axis of size `len`. Reversed or
/// coinciding bounds give an empty range.
pub fn piece_range(start: i64, end: i64, len: usize) -> Range<usize> {
    let start = normalize_bound(start, len);
    let end = normalize_bound(end, len);
    if start >= end {
        start..start
    } else {
        start..end
    }
}

/// Slices one sample out of `x`, restricting each `(axis, range)` pair and
/// keeping every other axis whole. The sample axis stays as a singleton.
pub fn slice_piece<B: Backend, const D: usize>(
    x: &Tensor<B, D>,
    sample: usize,
    axes: &[(usize, Range<usize>)],
) -> Tensor<B, D> {
    let mut ranges = x.dims().map(|x| 0..x);
    ranges[0] = sample..sample + 1;
    for (axis, range) in axes {
        ranges[*axis] = range.clone();
    }
    x.clone().slice(ranges)
}

/// Shape of the piece that `slice_piece` would produce, valid for empty
/// ranges too.
pub fn piece_dims<const D: usize>(dims: [usize; D], axes: &[(usize, Range<usize>)]) -> [usize; D] {
    let mut dims = dims;
    dims[0] = 1;
    for (axis, range) in axes {
        dims[*axis] = range.len();
    }
    dims
}

/// Per-process path in the temp dir, so concurrent test runs do not share files.
#[cfg(test)]
pub(crate) fn temp_file(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("{}_{}.json", name, std::process::id()))
}
