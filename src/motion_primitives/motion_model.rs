//! Chain-of-integrators motion model
//!
//! The q-th derivative of position is the control input and every lower
//! derivative integrates the level above it. For a constant input the exact
//! solution is a Taylor polynomial in the elapsed time, so end states are
//! evaluated in closed form from a precomputed inverse-factorial table.

use nalgebra::{DMatrix, DVector};

use crate::common::traits::MotionModel;
use crate::common::types::{ControlVector, StateVector};

/// Closed-form integrator chain dynamics for `num_dims` decoupled axes
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorChain {
    control_space_q: usize,
    num_dims: usize,
    /// 1/i! for i in 0..=q
    inv_factorials: Vec<f64>,
}

impl IntegratorChain {
    pub fn new(control_space_q: usize, num_dims: usize) -> Self {
        let mut inv_factorials = Vec::with_capacity(control_space_q + 1);
        let mut factorial = 1.0;
        for i in 0..=control_space_q {
            if i > 0 {
                factorial *= i as f64;
            }
            inv_factorials.push(1.0 / factorial);
        }

        Self {
            control_space_q,
            num_dims,
            inv_factorials,
        }
    }

    pub fn control_space_q(&self) -> usize {
        self.control_space_q
    }

    pub fn num_dims(&self) -> usize {
        self.num_dims
    }

    /// Length of the stacked state vector
    pub fn state_dim(&self) -> usize {
        self.control_space_q * self.num_dims
    }

    /// dt^i / i! for i in 0..=q
    fn taylor_weights(&self, dt: f64) -> Vec<f64> {
        let mut weights = Vec::with_capacity(self.control_space_q + 1);
        let mut power = 1.0;
        for i in 0..=self.control_space_q {
            if i > 0 {
                power *= dt;
            }
            weights.push(power * self.inv_factorials[i]);
        }
        weights
    }

    /// Control-free part of the end state: the start state coasted for `dt`.
    fn drift(&self, start: &StateVector, weights: &[f64]) -> StateVector {
        let q = self.control_space_q;
        let d = self.num_dims;
        let mut end = DVector::zeros(self.state_dim());

        for j in 0..q {
            for k in 0..d {
                end[j * d + k] = (j..q).map(|i| start[i * d + k] * weights[i - j]).sum();
            }
        }
        end
    }

    /// Exact end state after applying constant control `u` for `dt` seconds.
    ///
    /// # Panics
    /// If `start` does not have `q * d` entries or `u` does not have `d` entries.
    pub fn compute_end_state(&self, start: &StateVector, u: &ControlVector, dt: f64) -> StateVector {
        let q = self.control_space_q;
        let d = self.num_dims;
        let weights = self.taylor_weights(dt);
        let mut end = self.drift(start, &weights);

        for j in 0..q {
            let gain = weights[q - j];
            for k in 0..d {
                end[j * d + k] += u[k] * gain;
            }
        }
        end
    }

    /// End states for every (duration, control) pair.
    ///
    /// Column `dt_index * controls.len() + u_index` holds the end state reached
    /// with `durations[dt_index]` and `controls[u_index]`. The drift term is
    /// evaluated once per duration and shared by all controls.
    pub fn compute_end_states(
        &self,
        start: &StateVector,
        durations: &[f64],
        controls: &[ControlVector],
    ) -> DMatrix<f64> {
        let q = self.control_space_q;
        let d = self.num_dims;
        let num_controls = controls.len();
        let mut end_states = DMatrix::zeros(self.state_dim(), durations.len() * num_controls);

        for (dt_index, &dt) in durations.iter().enumerate() {
            let weights = self.taylor_weights(dt);
            let drift = self.drift(start, &weights);

            for (u_index, u) in controls.iter().enumerate() {
                let mut column = end_states.column_mut(dt_index * num_controls + u_index);
                for j in 0..q {
                    let gain = weights[q - j];
                    for k in 0..d {
                        column[j * d + k] = drift[j * d + k] + u[k] * gain;
                    }
                }
            }
        }
        end_states
    }

    /// Derivative stack at time `t`: levels 0..q-1 of the state followed by
    /// the control at level q, `(q + 1) * d` entries.
    pub fn derivative_stack(&self, start: &StateVector, u: &ControlVector, t: f64) -> DVector<f64> {
        let state = self.compute_end_state(start, u, t);
        let n = self.state_dim();
        let d = self.num_dims;
        DVector::from_fn(n + d, |i, _| if i < n { state[i] } else { u[i - n] })
    }

    /// State transition matrix e^{A dt} of the chain.
    pub fn transition_matrix(&self, dt: f64) -> DMatrix<f64> {
        let q = self.control_space_q;
        let d = self.num_dims;
        let weights = self.taylor_weights(dt);
        let mut phi = DMatrix::zeros(self.state_dim(), self.state_dim());

        for j in 0..q {
            for i in j..q {
                for k in 0..d {
                    phi[(j * d + k, i * d + k)] = weights[i - j];
                }
            }
        }
        phi
    }

    /// Control input matrix of the discretized chain, `n x d`.
    pub fn control_matrix(&self, dt: f64) -> DMatrix<f64> {
        let q = self.control_space_q;
        let d = self.num_dims;
        let weights = self.taylor_weights(dt);
        let mut gamma = DMatrix::zeros(self.state_dim(), d);

        for j in 0..q {
            for k in 0..d {
                gamma[(j * d + k, k)] = weights[q - j];
            }
        }
        gamma
    }
}

impl MotionModel for IntegratorChain {
    type State = StateVector;
    type Control = ControlVector;

    fn propagate(&self, state: &StateVector, control: &ControlVector, dt: f64) -> StateVector {
        self.compute_end_state(state, control, dt)
    }

    fn jacobian_state(&self, _state: &StateVector, _control: &ControlVector, dt: f64) -> DMatrix<f64> {
        self.transition_matrix(dt)
    }
}
