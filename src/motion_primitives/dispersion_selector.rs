//! Greedy min-dispersion selection
//!
//! Approximates the size-k subset of the candidate grid that minimizes the
//! largest distance from any candidate to its nearest chosen representative.
//! The first pick is the candidate closest to the start state in the full
//! state space; every later pick is the candidate currently worst served by
//! the chosen set under the configured metric.
//!
//! Ties are broken toward the lowest (duration index, control index) so the
//! selection is reproducible.

use std::cmp::Reverse;

use nalgebra::DMatrix;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::common::error::{MotionPrimitiveError, PrimitiveResult};
use crate::common::types::{CandidateIndex, StateVector};

use super::candidate_generator::{CandidateSample, CandidateSet};
use super::config::{DispersionConfig, DistanceMetric};

/// Persisted form of one selected candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSample {
    pub duration_index: usize,
    pub control_index: usize,
    pub duration: f64,
    pub control: Vec<f64>,
    pub end_state: Vec<f64>,
}

impl SelectedSample {
    pub fn index(&self) -> CandidateIndex {
        CandidateIndex::new(self.duration_index, self.control_index)
    }
}

impl From<CandidateSample> for SelectedSample {
    fn from(sample: CandidateSample) -> Self {
        Self {
            duration_index: sample.index.duration_index,
            control_index: sample.index.control_index,
            duration: sample.duration,
            control: sample.control.as_slice().to_vec(),
            end_state: sample.end_state.as_slice().to_vec(),
        }
    }
}

/// Ordered min-dispersion subset for one start state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSet {
    /// Selection order; element 0 is the candidate nearest the start state
    pub samples: Vec<SelectedSample>,
    /// coverage[i]: largest candidate distance to the first i + 1 selections
    pub coverage: Vec<f64>,
}

impl SelectedSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn indices(&self) -> Vec<CandidateIndex> {
        self.samples.iter().map(SelectedSample::index).collect()
    }

    /// Dispersion of the full selection
    pub fn dispersion(&self) -> Option<f64> {
        self.coverage.last().copied()
    }
}

/// Greedy farthest-point selector
#[derive(Debug, Clone)]
pub struct DispersionSelector {
    num_output_mps: usize,
    num_dims: usize,
    metric: DistanceMetric,
}

impl DispersionSelector {
    pub fn new(config: &DispersionConfig) -> PrimitiveResult<Self> {
        config.validate()?;
        Ok(Self {
            num_output_mps: config.num_output_mps,
            num_dims: config.num_dims,
            metric: config.distance_metric,
        })
    }

    pub fn num_output_mps(&self) -> usize {
        self.num_output_mps
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of leading state components the metric looks at
    fn metric_rows(&self, state_dim: usize) -> usize {
        match self.metric {
            DistanceMetric::FullState => state_dim,
            DistanceMetric::PositionOnly => self.num_dims.min(state_dim),
        }
    }

    /// Full-state distance between column `a` of `points` and `state`,
    /// whatever the coverage metric.
    fn full_state_distance(points: &DMatrix<f64>, a: usize, state: &[f64]) -> f64 {
        let column = points.column(a);
        (0..points.nrows())
            .map(|r| (column[r] - state[r]).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn distance_between(&self, points: &DMatrix<f64>, a: usize, b: usize) -> f64 {
        let rows = self.metric_rows(points.nrows());
        let (ca, cb) = (points.column(a), points.column(b));
        (0..rows)
            .map(|r| (ca[r] - cb[r]).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Pick `num_output_mps` candidates greedily.
    pub fn select(&self, candidates: &CandidateSet) -> PrimitiveResult<SelectedSet> {
        let num_candidates = candidates.len();
        if self.num_output_mps >= num_candidates {
            return Err(MotionPrimitiveError::ConfigurationError(format!(
                "num_output_mps ({}) must be smaller than the candidate count ({})",
                self.num_output_mps, num_candidates
            )));
        }

        let points = candidates.end_states();
        let non_finite = (0..num_candidates)
            .find(|&i| points.column(i).iter().any(|v| !v.is_finite()));
        if let Some(flat) = non_finite {
            return Err(MotionPrimitiveError::numeric(format!(
                "non-finite end state for candidate {:?}",
                candidates.candidate_index(flat)
            )));
        }

        let seed = self.nearest_to_start(points, candidates.start_state())?;

        let mut selected = vec![seed];
        let mut consumed = vec![false; num_candidates];
        consumed[seed] = true;
        let mut min_dist: Vec<f64> = (0..num_candidates)
            .map(|i| self.distance_between(points, i, seed))
            .collect();
        let mut coverage = vec![max_score(&min_dist)];

        for _ in 1..self.num_output_mps {
            // Iterating in flat order and keying on Reverse(index) picks the
            // lowest (duration, control) index among equal scores.
            let next = (0..num_candidates)
                .filter(|&i| !consumed[i])
                .max_by_key(|&i| (OrderedFloat(min_dist[i]), Reverse(i)))
                .ok_or_else(|| {
                    MotionPrimitiveError::ConfigurationError(
                        "ran out of unselected candidates".to_string(),
                    )
                })?;

            consumed[next] = true;
            selected.push(next);
            for (i, d) in min_dist.iter_mut().enumerate() {
                let to_next = self.distance_between(points, i, next);
                if to_next < *d {
                    *d = to_next;
                }
            }
            coverage.push(max_score(&min_dist));
        }

        if let Some(bad) = coverage.iter().find(|c| !c.is_finite()) {
            return Err(MotionPrimitiveError::numeric(format!(
                "non-finite coverage radius {}",
                bad
            )));
        }

        Ok(SelectedSet {
            samples: selected
                .into_iter()
                .map(|flat| candidates.sample(candidates.candidate_index(flat)).into())
                .collect(),
            coverage,
        })
    }

    /// Flat index of the candidate closest to the start state over the full
    /// state space. The coverage metric only applies to later picks.
    fn nearest_to_start(&self, points: &DMatrix<f64>, start: &StateVector) -> PrimitiveResult<usize> {
        let distances: Vec<f64> = (0..points.ncols())
            .map(|i| Self::full_state_distance(points, i, start.as_slice()))
            .collect();
        if let Some(d) = distances.iter().find(|d| !d.is_finite()) {
            return Err(MotionPrimitiveError::numeric(format!(
                "non-finite distance {} to start state",
                d
            )));
        }

        distances
            .iter()
            .enumerate()
            .min_by_key(|&(i, d)| (OrderedFloat(*d), i))
            .map(|(i, _)| i)
            .ok_or_else(|| MotionPrimitiveError::ConfigurationError("no candidates".to_string()))
    }
}

fn max_score(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(0.0, f64::max)
}

/// Largest distance from any candidate to its nearest point in `chosen`.
///
/// Recomputed from scratch; used to check a selection independently of the
/// incremental bookkeeping in [`DispersionSelector::select`].
pub fn dispersion_of(
    candidates: &CandidateSet,
    chosen: &[CandidateIndex],
    metric: DistanceMetric,
    num_dims: usize,
) -> f64 {
    let points = candidates.end_states();
    let rows = match metric {
        DistanceMetric::FullState => points.nrows(),
        DistanceMetric::PositionOnly => num_dims.min(points.nrows()),
    };
    let chosen: Vec<usize> = chosen.iter().map(|&c| candidates.flat_index(c)).collect();

    (0..points.ncols())
        .map(|i| {
            chosen
                .iter()
                .map(|&c| {
                    let diff = points.column(i).rows(0, rows) - points.column(c).rows(0, rows);
                    diff.norm()
                })
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion_primitives::candidate_generator::CandidateGenerator;
    use nalgebra::DVector;
    use std::collections::HashSet;

    fn scenario_config() -> DispersionConfig {
        DispersionConfig::new(2, 1)
            .with_controls(3)
            .with_durations(0.0, 0.5, 3)
            .with_output_mps(3)
    }

    fn run(config: &DispersionConfig, start: &StateVector) -> (CandidateSet, SelectedSet) {
        let generator = CandidateGenerator::new(config).unwrap();
        let selector = DispersionSelector::new(config).unwrap();
        let candidates = generator.generate(start).unwrap();
        let selected = selector.select(&candidates).unwrap();
        (candidates, selected)
    }

    #[test]
    fn test_double_integrator_scenario() {
        let (_, selected) = run(&scenario_config(), &DVector::zeros(2));

        assert_eq!(
            selected.indices(),
            vec![
                CandidateIndex::new(0, 0),
                CandidateIndex::new(2, 0),
                CandidateIndex::new(2, 2),
            ]
        );
        assert_eq!(selected.samples[0].duration, 0.0);
        assert_eq!(selected.samples[1].control, vec![-1.0]);
        assert_eq!(selected.samples[2].end_state, vec![0.125, 0.5]);
    }

    #[test]
    fn test_all_zero_durations_use_tie_break() {
        let config = scenario_config().with_durations(0.0, 0.0, 1).with_output_mps(2);
        let (candidates, selected) = run(&config, &DVector::zeros(2));

        assert_eq!(candidates.len(), 3);
        assert_eq!(
            selected.indices(),
            vec![CandidateIndex::new(0, 0), CandidateIndex::new(0, 1)]
        );
        assert_eq!(selected.dispersion(), Some(0.0));
        for sample in &selected.samples {
            assert_eq!(sample.end_state, vec![0.0, 0.0]);
        }
    }

    #[test]
    fn test_size_and_distinct_indices() {
        let config = DispersionConfig::new(3, 2)
            .with_controls(5)
            .with_durations(0.0, 0.5, 6)
            .with_output_mps(40);
        let start = DVector::from_vec(vec![0.0, 0.0, 0.5, -0.5, 0.2, 0.0]);
        let (_, selected) = run(&config, &start);

        assert_eq!(selected.len(), 40);
        let unique: HashSet<CandidateIndex> = selected.indices().into_iter().collect();
        assert_eq!(unique.len(), 40);
    }

    #[test]
    fn test_seed_is_global_nearest() {
        let config = DispersionConfig::new(3, 2)
            .with_controls(4)
            .with_durations(0.05, 0.5, 5)
            .with_output_mps(8);
        let start = DVector::from_vec(vec![0.0, 0.0, 1.0, 0.25, -0.5, 0.75]);
        let (candidates, selected) = run(&config, &start);

        let best = candidates
            .iter()
            .map(|s| (s.end_state - &start).norm())
            .fold(f64::INFINITY, f64::min);
        let seed = &selected.samples[0];
        let seed_distance = (DVector::from_vec(seed.end_state.clone()) - &start).norm();
        assert!((seed_distance - best).abs() < 1e-12);
    }

    #[test]
    fn test_coverage_is_monotonic() {
        let config = DispersionConfig::new(2, 2)
            .with_controls(5)
            .with_durations(0.0, 1.0, 5)
            .with_output_mps(30);
        let start = DVector::from_vec(vec![0.0, 0.0, 0.3, -0.6]);
        let (candidates, selected) = run(&config, &start);

        assert_eq!(selected.coverage.len(), 30);
        for pair in selected.coverage.windows(2) {
            assert!(pair[1] <= pair[0]);
        }

        // Incremental bookkeeping agrees with a from-scratch recomputation
        let indices = selected.indices();
        for i in 1..=indices.len() {
            let scratch = dispersion_of(&candidates, &indices[..i], DistanceMetric::FullState, 2);
            assert!((scratch - selected.coverage[i - 1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_each_pick_is_farthest_point() {
        let config = DispersionConfig::new(2, 1)
            .with_controls(7)
            .with_durations(0.0, 1.0, 7)
            .with_output_mps(10);
        let (candidates, selected) = run(&config, &DVector::from_vec(vec![0.0, 0.4]));
        let indices = selected.indices();

        for i in 1..indices.len() {
            let chosen = &indices[..i];
            let pick = candidates.flat_index(indices[i]);
            let points = candidates.end_states();
            let score = |c: usize| {
                chosen
                    .iter()
                    .map(|&s| (points.column(c) - points.column(candidates.flat_index(s))).norm())
                    .fold(f64::INFINITY, f64::min)
            };
            let best = (0..candidates.len())
                .filter(|&c| !chosen.iter().any(|&s| candidates.flat_index(s) == c))
                .map(score)
                .fold(0.0, f64::max);
            assert!((score(pick) - best).abs() < 1e-12);
        }
    }

    #[test]
    fn test_position_only_metric() {
        let config = scenario_config().with_distance_metric(DistanceMetric::PositionOnly);
        let (candidates, selected) = run(&config, &DVector::zeros(2));

        assert_eq!(selected.len(), 3);
        assert_eq!(selected.samples[0].duration_index, 0);
        let scratch = dispersion_of(
            &candidates,
            &selected.indices(),
            DistanceMetric::PositionOnly,
            1,
        );
        assert!((scratch - selected.dispersion().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_position_only_seed_uses_full_state() {
        // From [0, 1] the smallest position change is u = -1, but u = 0
        // keeps the velocity and is closer in the full state.
        let config = DispersionConfig::new(2, 1)
            .with_controls(3)
            .with_durations(0.5, 1.0, 2)
            .with_output_mps(2)
            .with_distance_metric(DistanceMetric::PositionOnly);
        let start = DVector::from_vec(vec![0.0, 1.0]);
        let (_, selected) = run(&config, &start);

        assert_eq!(selected.samples[0].index(), CandidateIndex::new(0, 1));
        assert_eq!(selected.samples[0].end_state, vec![0.5, 1.0]);
    }

    #[test]
    fn test_non_finite_bound_is_numeric_degeneracy() {
        let config = scenario_config().with_max_state_derivs(vec![1.0, 1.0, f64::INFINITY]);
        let generator = CandidateGenerator::new(&config).unwrap();
        let selector = DispersionSelector::new(&config).unwrap();
        let candidates = generator.generate(&DVector::zeros(2)).unwrap();

        assert!(matches!(
            selector.select(&candidates),
            Err(MotionPrimitiveError::NumericDegeneracy { .. })
        ));
    }

    #[test]
    fn test_non_finite_start_is_numeric_degeneracy() {
        let config = scenario_config();
        let generator = CandidateGenerator::new(&config).unwrap();
        let selector = DispersionSelector::new(&config).unwrap();
        let candidates = generator
            .generate(&DVector::from_vec(vec![0.0, f64::NAN]))
            .unwrap();

        assert!(matches!(
            selector.select(&candidates),
            Err(MotionPrimitiveError::NumericDegeneracy { .. })
        ));
    }

    #[test]
    fn test_rejects_k_not_below_candidate_count() {
        let config = scenario_config();
        let generator = CandidateGenerator::new(&config).unwrap();
        let candidates = generator.generate(&DVector::zeros(2)).unwrap();

        let selector = DispersionSelector {
            num_output_mps: 9,
            num_dims: 1,
            metric: DistanceMetric::FullState,
        };
        assert!(matches!(
            selector.select(&candidates),
            Err(MotionPrimitiveError::ConfigurationError(_))
        ));
    }
}
