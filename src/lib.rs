//! min_dispersion_primitives - motion primitive libraries by dispersion minimization
//!
//! This crate precomputes, for a chain-of-integrators robot model, lookup
//! tables of short constant-control trajectories that cover the reachable
//! set with low dispersion.

// Core modules
pub mod common;

// Algorithm modules
pub mod motion_primitives;

// Re-export common types for convenience
pub use common::{CandidateIndex, ControlVector, GridIndex, SampledStates, StateVector};
pub use common::{MotionModel, MotionPrimitive};
pub use common::{MotionPrimitiveError, PrimitiveResult};
