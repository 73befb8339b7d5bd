//! Boundary encodings and the host-side view of position tensors.

use core::fmt;
use core::str::FromStr;

use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::PiecewiseError;

/// How a position array encodes piece boundaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PosType {
    /// Exclusive end offsets, with an implicit leading zero.
    #[default]
    Segments,
    /// Interleaved `(start, end)` pairs.
    Pairs,
}

impl PosType {
    pub const SEGMENTS: &'static str = "segments";
    pub const PAIRS: &'static str = "pairs";

    /// Stride through the bound array between consecutive pieces.
    pub fn step(&self) -> usize {
        match self {
            PosType::Segments => 1,
            PosType::Pairs => 2,
        }
    }

    /// Number of pieces a position array of the given width decodes to.
    pub fn piece_count(&self, width: usize) -> usize {
        width / self.step()
    }

    /// Decodes one sample's raw positions into `(start, end)` bounds.
    pub fn intervals(&self, positions: &[i64]) -> Vec<(i64, i64)> {
        let bounds: Vec<i64> = match self {
            PosType::Segments => core::iter::once(0).chain(positions.iter().copied()).collect(),
            PosType::Pairs => positions.to_vec(),
        };

        (1..bounds.len())
            .step_by(self.step())
            .map(|i| (bounds[i - 1], bounds[i]))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PosType::Segments => Self::SEGMENTS,
            PosType::Pairs => Self::PAIRS,
        }
    }
}

impl fmt::Display for PosType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PosType {
    type Err = PiecewiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::SEGMENTS => Ok(PosType::Segments),
            Self::PAIRS => Ok(PosType::Pairs),
            other => Err(PiecewiseError::PosTypeNotImplemented(other.to_string())),
        }
    }
}

impl TryFrom<String> for PosType {
    type Error = PiecewiseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PosType> for String {
    fn from(value: PosType) -> Self {
        value.as_str().to_string()
    }
}

/// Position tensors accepted by the piecewise layers. Float positions are
/// cast to integers.
pub trait PositionInput<B: Backend> {
    fn into_int(self) -> Tensor<B, 2, Int>;
}

impl<B: Backend> PositionInput<B> for Tensor<B, 2, Int> {
    fn into_int(self) -> Tensor<B, 2, Int> {
        self
    }
}

impl<B: Backend> PositionInput<B> for Tensor<B, 2> {
    fn into_int(self) -> Tensor<B, 2, Int> {
        self.int()
    }
}

/// Position values copied to the host, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Positions {
    batch: usize,
    width: usize,
    values: Vec<i64>,
}

impl Positions {
    pub fn from_tensor<B: Backend>(positions: Tensor<B, 2, Int>) -> Self {
        let [batch, width] = positions.dims();
        let values = positions.into_data().convert::<i64>().value;

        Self {
            batch,
            width,
            values,
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn sample(&self, index: usize) -> &[i64] {
        &self.values[index * self.width..(index + 1) * self.width]
    }
}
