//! Candidate end states for one start state
//!
//! Every combination of a sampled duration and a sampled constant control is
//! pushed through the integrator chain, giving the discretized reachable set
//! the dispersion selector picks from.

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::common::error::{MotionPrimitiveError, PrimitiveResult};
use crate::common::types::{linspace, CandidateIndex, ControlVector, StateVector};

use super::config::DispersionConfig;
use super::motion_model::IntegratorChain;

/// One (duration, control) candidate and the end state it reaches
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSample {
    pub index: CandidateIndex,
    pub duration: f64,
    pub control: ControlVector,
    pub end_state: StateVector,
}

/// All candidates for one start state.
///
/// Column `duration_index * num_controls + control_index` of `end_states`
/// is the end state of that candidate.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    start_state: StateVector,
    end_states: DMatrix<f64>,
    durations: Vec<f64>,
    controls: Vec<ControlVector>,
}

impl CandidateSet {
    pub fn start_state(&self) -> &StateVector {
        &self.start_state
    }

    pub fn end_states(&self) -> &DMatrix<f64> {
        &self.end_states
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn controls(&self) -> &[ControlVector] {
        &self.controls
    }

    pub fn num_durations(&self) -> usize {
        self.durations.len()
    }

    pub fn num_controls(&self) -> usize {
        self.controls.len()
    }

    pub fn len(&self) -> usize {
        self.end_states.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat column of a (duration, control) pair
    pub fn flat_index(&self, index: CandidateIndex) -> usize {
        index.duration_index * self.num_controls() + index.control_index
    }

    /// (duration, control) pair of a flat column
    pub fn candidate_index(&self, flat: usize) -> CandidateIndex {
        CandidateIndex::new(flat / self.num_controls(), flat % self.num_controls())
    }

    pub fn sample(&self, index: CandidateIndex) -> CandidateSample {
        let flat = self.flat_index(index);
        CandidateSample {
            index,
            duration: self.durations[index.duration_index],
            control: self.controls[index.control_index].clone(),
            end_state: self.end_states.column(flat).clone_owned(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = CandidateSample> + '_ {
        (0..self.len()).map(move |flat| self.sample(self.candidate_index(flat)))
    }
}

/// Builds the candidate grid from a validated configuration
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    model: IntegratorChain,
    durations: Vec<f64>,
    controls: Vec<ControlVector>,
    max_u: f64,
}

impl CandidateGenerator {
    pub fn new(config: &DispersionConfig) -> PrimitiveResult<Self> {
        config.validate()?;
        let model = IntegratorChain::new(config.control_space_q, config.num_dims);
        let max_u = config.max_u();

        Ok(Self {
            durations: linspace(config.min_dt, config.max_dt, config.num_dts),
            controls: control_grid(max_u, config.num_u_per_dimension, config.num_dims),
            model,
            max_u,
        })
    }

    pub fn model(&self) -> &IntegratorChain {
        &self.model
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn controls(&self) -> &[ControlVector] {
        &self.controls
    }

    /// Total candidates per start state
    pub fn num_candidates(&self) -> usize {
        self.durations.len() * self.controls.len()
    }

    /// Evaluate every (duration, control) candidate from `start`.
    pub fn generate(&self, start: &StateVector) -> PrimitiveResult<CandidateSet> {
        self.check_start(start)?;
        let end_states = self
            .model
            .compute_end_states(start, &self.durations, &self.controls);

        Ok(CandidateSet {
            start_state: start.clone(),
            end_states,
            durations: self.durations.clone(),
            controls: self.controls.clone(),
        })
    }

    /// Baseline library: `per_axis` evenly spaced controls per axis, all
    /// applied for the same duration `dt`.
    pub fn evenly_spaced(
        &self,
        start: &StateVector,
        dt: f64,
        per_axis: usize,
    ) -> PrimitiveResult<Vec<CandidateSample>> {
        self.check_start(start)?;
        if per_axis == 0 {
            return Err(MotionPrimitiveError::InvalidParameter(
                "per_axis must be at least 1".to_string(),
            ));
        }
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "duration must be finite and non-negative, got {}",
                dt
            )));
        }

        let samples = control_grid(self.max_u, per_axis, self.model.num_dims())
            .into_iter()
            .enumerate()
            .map(|(control_index, control)| CandidateSample {
                index: CandidateIndex::new(0, control_index),
                duration: dt,
                end_state: self.model.compute_end_state(start, &control, dt),
                control,
            })
            .collect();
        Ok(samples)
    }

    fn check_start(&self, start: &StateVector) -> PrimitiveResult<()> {
        if start.len() != self.model.state_dim() {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "start state has {} entries, expected {}",
                start.len(),
                self.model.state_dim()
            )));
        }
        Ok(())
    }
}

/// Cartesian product of per-axis control samples; the first axis varies slowest.
fn control_grid(max_u: f64, per_axis: usize, num_dims: usize) -> Vec<ControlVector> {
    let single_axis = linspace(-max_u, max_u, per_axis);
    (0..num_dims)
        .map(|_| single_axis.iter().copied())
        .multi_cartesian_product()
        .map(DVector::from_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_config() -> DispersionConfig {
        DispersionConfig::new(2, 1)
            .with_controls(3)
            .with_durations(0.0, 0.5, 3)
            .with_output_mps(3)
    }

    #[test]
    fn test_control_grid_order() {
        let grid = control_grid(1.0, 3, 2);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0].as_slice(), &[-1.0, -1.0]);
        assert_eq!(grid[1].as_slice(), &[-1.0, 0.0]);
        assert_eq!(grid[3].as_slice(), &[0.0, -1.0]);
        assert_eq!(grid[8].as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_candidate_count() {
        let config = DispersionConfig::new(3, 2)
            .with_controls(4)
            .with_durations(0.1, 0.5, 5)
            .with_output_mps(10);
        let generator = CandidateGenerator::new(&config).unwrap();
        let start = DVector::zeros(6);
        let set = generator.generate(&start).unwrap();

        assert_eq!(set.len(), 5 * 16);
        assert_eq!(set.num_durations(), 5);
        assert_eq!(set.num_controls(), 16);
        assert_eq!(set.end_states().nrows(), 6);
    }

    #[test]
    fn test_scenario_candidates() {
        let generator = CandidateGenerator::new(&scenario_config()).unwrap();
        let set = generator.generate(&DVector::zeros(2)).unwrap();

        assert_eq!(set.durations(), &[0.0, 0.25, 0.5]);
        let far = set.sample(CandidateIndex::new(2, 0));
        assert_eq!(far.control[0], -1.0);
        assert_eq!(far.end_state.as_slice(), &[-0.125, -0.5]);

        let idle = set.sample(CandidateIndex::new(1, 1));
        assert_eq!(idle.end_state.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_every_candidate_matches_closed_form() {
        let config = DispersionConfig::new(3, 2)
            .with_controls(3)
            .with_durations(0.0, 0.4, 4)
            .with_output_mps(5);
        let generator = CandidateGenerator::new(&config).unwrap();
        let start = DVector::from_vec(vec![0.0, 0.0, 0.3, -0.2, 0.1, 0.5]);
        let set = generator.generate(&start).unwrap();

        for sample in set.iter() {
            let expected = generator
                .model()
                .compute_end_state(&start, &sample.control, sample.duration);
            assert!((sample.end_state - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn test_index_mapping() {
        let generator = CandidateGenerator::new(&scenario_config()).unwrap();
        let set = generator.generate(&DVector::zeros(2)).unwrap();
        for flat in 0..set.len() {
            assert_eq!(set.flat_index(set.candidate_index(flat)), flat);
        }
        assert_eq!(set.candidate_index(5), CandidateIndex::new(1, 2));
    }

    #[test]
    fn test_rejects_wrong_start_length() {
        let generator = CandidateGenerator::new(&scenario_config()).unwrap();
        assert!(matches!(
            generator.generate(&DVector::zeros(3)),
            Err(MotionPrimitiveError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = scenario_config().with_output_mps(9);
        assert!(CandidateGenerator::new(&config).is_err());
    }

    #[test]
    fn test_evenly_spaced() {
        let config = DispersionConfig::new(3, 2);
        let generator = CandidateGenerator::new(&config).unwrap();
        let start = DVector::zeros(6);
        let samples = generator.evenly_spaced(&start, 0.25, 5).unwrap();

        assert_eq!(samples.len(), 25);
        assert!(samples.iter().all(|s| s.duration == 0.25));
        // zero control from rest stays at the origin
        assert!(samples[12].end_state.norm() < 1e-12);
        assert!(generator.evenly_spaced(&start, -1.0, 5).is_err());
        assert!(generator.evenly_spaced(&start, 0.25, 0).is_err());
    }
}
