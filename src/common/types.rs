//! Common types used throughout min_dispersion_primitives

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Stacked derivative state: [level 0 (dims 1..d), level 1 (dims 1..d), ...]
pub type StateVector = DVector<f64>;

/// Constant highest-derivative input, one entry per dimension
pub type ControlVector = DVector<f64>;

/// Index of a cell in the start-state grid, one entry per free grid axis
pub type GridIndex = Vec<usize>;

/// Position of a candidate in the (duration, control) sample grid.
///
/// The derived ordering is lexicographic on (duration, control), which is the
/// tie-break order used by the dispersion selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateIndex {
    pub duration_index: usize,
    pub control_index: usize,
}

impl CandidateIndex {
    pub fn new(duration_index: usize, control_index: usize) -> Self {
        Self {
            duration_index,
            control_index,
        }
    }
}

impl From<(usize, usize)> for CandidateIndex {
    fn from(tuple: (usize, usize)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

/// Time-sampled trajectory for inspection.
///
/// Each matrix has one row per spatial dimension and one column per sample time.
#[derive(Debug, Clone)]
pub struct SampledStates {
    pub times: Vec<f64>,
    pub position: DMatrix<f64>,
    pub velocity: DMatrix<f64>,
    pub acceleration: DMatrix<f64>,
    pub jerk: Option<DMatrix<f64>>,
}

impl SampledStates {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Evenly spaced samples over `[lo, hi]`; a single sample sits at `lo`.
pub fn linspace(lo: f64, hi: f64, num: usize) -> Vec<f64> {
    (0..num)
        .map(|i| {
            if num > 1 {
                lo + (hi - lo) * i as f64 / (num - 1) as f64
            } else {
                lo
            }
        })
        .collect()
}

/// Serde adapter for floats that may be infinite.
///
/// JSON has no literal for non-finite numbers and serde_json writes them as
/// `null`, which then fails to load. Finite values stay plain numbers;
/// non-finite ones are written as the strings `"inf"`, `"-inf"` or `"NaN"`.
pub mod non_finite_f64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn to_repr(value: f64) -> Repr {
        if value.is_finite() {
            Repr::Number(value)
        } else {
            Repr::Text(value.to_string())
        }
    }

    fn from_repr<E: Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.parse::<f64>() {
                Ok(v) if !v.is_finite() => Ok(v),
                _ => Err(E::custom(format!(
                    "expected a number, inf, -inf or NaN, got {:?}",
                    text
                ))),
            },
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        to_repr(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    /// Same encoding, element-wise over a vector
    pub mod vec {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::{from_repr, to_repr, Repr};

        pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(values.iter().map(|v| to_repr(*v)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<Repr>::deserialize(deserializer)?
                .into_iter()
                .map(from_repr)
                .collect()
        }
    }
}
