//! Symbolic shapes used for output shape inference.
//!
//! A dimension is `None` when it is unknown ahead of execution, typically the
//! batch size or the sequence length.

pub type SymbolicShape = Vec<Option<usize>>;

/// Lifts a concrete shape into a symbolic one.
pub fn known(dims: &[usize]) -> SymbolicShape {
    dims.iter().copied().map(Some).collect()
}

/// Returns the concrete shape when every dimension is known.
pub fn resolve(shape: &[Option<usize>]) -> Option<Vec<usize>> {
    shape.iter().copied().collect()
}

/// Replaces the dimensions at `axes` with size 1, the keep-dim reduction rule.
pub fn reduced(shape: &[Option<usize>], axes: &[usize]) -> SymbolicShape {
    shape
        .iter()
        .enumerate()
        .map(|(i, dim)| if axes.contains(&i) { Some(1) } else { *dim })
        .collect()
}
