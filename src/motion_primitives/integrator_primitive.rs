//! Constant-control motion primitive
//!
//! A selected candidate is a trajectory of the integrator chain under one
//! constant input. This type exposes it through the shared
//! [`MotionPrimitive`] interface so planners can treat it like primitives
//! produced by external boundary value solvers.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::common::error::{MotionPrimitiveError, PrimitiveResult};
use crate::common::traits::MotionPrimitive;
use crate::common::types::{linspace, ControlVector, SampledStates, StateVector};

use super::dispersion_selector::SelectedSample;
use super::motion_model::IntegratorChain;

/// Trajectories shorter than this carry no motion and are invalid
const MIN_DURATION: f64 = 1e-10;

/// Upper limit on the samples one `get_sampled_states` call may produce
const MAX_SAMPLED_STATES: usize = 1 << 20;

/// Persistent attributes of a valid primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveRecord {
    pub cost: f64,
    pub start_state: Vec<f64>,
    pub end_state: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct IntegratorPrimitive {
    model: IntegratorChain,
    start_state: StateVector,
    end_state: StateVector,
    control: ControlVector,
    duration: f64,
    is_valid: bool,
}

impl IntegratorPrimitive {
    pub fn new(
        model: IntegratorChain,
        start_state: StateVector,
        control: ControlVector,
        duration: f64,
    ) -> PrimitiveResult<Self> {
        if start_state.len() != model.state_dim() || control.len() != model.num_dims() {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "expected start state of {} and control of {} entries, got {} and {}",
                model.state_dim(),
                model.num_dims(),
                start_state.len(),
                control.len()
            )));
        }
        let end_state = model.compute_end_state(&start_state, &control, duration);
        let is_valid = duration.is_finite()
            && duration >= MIN_DURATION
            && end_state.iter().all(|v| v.is_finite());

        Ok(Self {
            model,
            start_state,
            end_state,
            control,
            duration,
            is_valid,
        })
    }

    /// Primitive for one entry of a selected set.
    pub fn from_selected(
        model: &IntegratorChain,
        start_state: &StateVector,
        sample: &SelectedSample,
    ) -> PrimitiveResult<Self> {
        Self::new(
            model.clone(),
            start_state.clone(),
            DVector::from_vec(sample.control.clone()),
            sample.duration,
        )
    }

    /// Rebuild a primitive from its JSON form; `{}` yields `None`.
    ///
    /// The control is recovered from the highest state level, which changes
    /// linearly in time under a constant input.
    pub fn from_json(
        value: &serde_json::Value,
        model: &IntegratorChain,
    ) -> PrimitiveResult<Option<Self>> {
        let is_empty = value.as_object().map_or(false, |o| o.is_empty());
        if value.is_null() || is_empty {
            return Ok(None);
        }
        let record: PrimitiveRecord = serde_json::from_value(value.clone())?;
        Self::from_record(&record, model).map(Some)
    }

    pub fn from_record(record: &PrimitiveRecord, model: &IntegratorChain) -> PrimitiveResult<Self> {
        let n = model.state_dim();
        let d = model.num_dims();
        if record.start_state.len() != n || record.end_state.len() != n {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "record states must have {} entries",
                n
            )));
        }
        if !(record.cost.is_finite() && record.cost >= MIN_DURATION) {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "record cost {} is not a valid duration",
                record.cost
            )));
        }

        let top = (model.control_space_q() - 1) * d;
        let control = DVector::from_fn(d, |k, _| {
            (record.end_state[top + k] - record.start_state[top + k]) / record.cost
        });
        let mut primitive = Self::new(
            model.clone(),
            DVector::from_vec(record.start_state.clone()),
            control,
            record.cost,
        )?;
        // Keep the stored end state bit-for-bit rather than the re-integrated one
        primitive.end_state = DVector::from_vec(record.end_state.clone());
        Ok(primitive)
    }

    pub fn to_record(&self) -> Option<PrimitiveRecord> {
        if !self.is_valid {
            return None;
        }
        Some(PrimitiveRecord {
            cost: self.cost(),
            start_state: self.start_state.as_slice().to_vec(),
            end_state: self.end_state.as_slice().to_vec(),
        })
    }

    pub fn control(&self) -> &ControlVector {
        &self.control
    }

    /// Move the primitive so it starts at position `start_pt`, keeping every
    /// higher derivative and the relative displacement.
    pub fn translate_start_position(&mut self, start_pt: &[f64]) -> PrimitiveResult<()> {
        let d = self.model.num_dims();
        if start_pt.len() != d {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "position must have {} entries, got {}",
                d,
                start_pt.len()
            )));
        }
        for (k, &p) in start_pt.iter().enumerate() {
            self.end_state[k] += p - self.start_state[k];
            self.start_state[k] = p;
        }
        Ok(())
    }

    /// One row per dimension, one column per stack, for a derivative level;
    /// levels above the control are identically zero.
    fn level_matrix(&self, stacks: &[DVector<f64>], level: usize) -> DMatrix<f64> {
        let d = self.model.num_dims();
        DMatrix::from_fn(d, stacks.len(), |k, c| {
            stacks[c].get(level * d + k).copied().unwrap_or(0.0)
        })
    }
}

impl MotionPrimitive for IntegratorPrimitive {
    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn cost(&self) -> f64 {
        self.duration
    }

    fn start_state(&self) -> &StateVector {
        &self.start_state
    }

    fn end_state(&self) -> &StateVector {
        &self.end_state
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn get_state(&self, t: f64) -> PrimitiveResult<StateVector> {
        if !(t >= 0.0 && t <= self.duration) {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "t = {} outside [0, {}]",
                t, self.duration
            )));
        }
        // Translation only moves position, so the chain from the current
        // start state already passes through the translated end state.
        Ok(self
            .model
            .compute_end_state(&self.start_state, &self.control, t))
    }

    fn get_sampled_states(&self, step_size: f64) -> PrimitiveResult<Option<SampledStates>> {
        if !(step_size > 0.0 && step_size.is_finite()) {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "step_size must be positive, got {}",
                step_size
            )));
        }
        if !self.is_valid {
            return Ok(None);
        }

        let steps = (self.duration / step_size).ceil();
        if !(steps < MAX_SAMPLED_STATES as f64) {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "step_size {} yields more than {} samples over {} s",
                step_size, MAX_SAMPLED_STATES, self.duration
            )));
        }
        let num = steps as usize + 1;
        let times = linspace(0.0, self.duration, num);
        let stacks: Vec<DVector<f64>> = times
            .iter()
            .map(|&t| {
                self.model
                    .derivative_stack(&self.start_state, &self.control, t)
            })
            .collect();
        let jerk = if self.model.control_space_q() >= 3 {
            Some(self.level_matrix(&stacks, 3))
        } else {
            None
        };

        Ok(Some(SampledStates {
            position: self.level_matrix(&stacks, 0),
            velocity: self.level_matrix(&stacks, 1),
            acceleration: self.level_matrix(&stacks, 2),
            jerk,
            times,
        }))
    }

    fn to_json(&self) -> serde_json::Value {
        match self.to_record().map(serde_json::to_value) {
            Some(Ok(value)) => value,
            _ => serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}
