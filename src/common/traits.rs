//! Common traits defining interfaces for motion primitive generation

use nalgebra::DMatrix;

use crate::common::error::PrimitiveResult;
use crate::common::types::*;

/// Trait for robot motion models
pub trait MotionModel {
    /// State type
    type State;
    /// Control type
    type Control;

    /// Propagate state forward in time
    fn propagate(&self, state: &Self::State, control: &Self::Control, dt: f64) -> Self::State;

    /// Compute Jacobian with respect to state
    fn jacobian_state(&self, state: &Self::State, control: &Self::Control, dt: f64)
        -> DMatrix<f64>;
}

/// Boundary contract shared by every motion primitive representation.
///
/// Implementations built on external boundary value solvers only need to
/// honor this interface to be stored next to the dispersion library.
pub trait MotionPrimitive {
    /// Whether a feasible trajectory exists
    fn is_valid(&self) -> bool;

    /// Scalar cost (trajectory time for the built-in primitives)
    fn cost(&self) -> f64;

    fn start_state(&self) -> &StateVector;

    fn end_state(&self) -> &StateVector;

    /// Trajectory duration [s]
    fn duration(&self) -> f64;

    /// Full state at time `t`, valid for `t` in `[0, duration]`
    fn get_state(&self, t: f64) -> PrimitiveResult<StateVector>;

    /// Sample the trajectory every `step_size` seconds; `None` if invalid
    fn get_sampled_states(&self, step_size: f64) -> PrimitiveResult<Option<SampledStates>>;

    /// Serialize the persistent attributes; invalid primitives become `{}`
    fn to_json(&self) -> serde_json::Value;
}
