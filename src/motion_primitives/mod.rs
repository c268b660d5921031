//! Min-Dispersion Motion Primitive Module
//!
//! This module builds lookup tables of motion primitives for a
//! chain-of-integrators robot. For each start state on a grid it samples
//! constant-control trajectories and keeps a small subset that covers the
//! reachable set with low dispersion.
//!
//! # Components
//!
//! - `config`: Library configuration and validation
//! - `motion_model`: Closed-form integrator chain dynamics
//! - `candidate_generator`: (duration, control) candidate grid per start state
//! - `dispersion_selector`: Greedy farthest-point selection
//! - `integrator_primitive`: Constant-control primitive behind the shared interface
//! - `lookup_table`: Start-state grid sweep and persistence
//!
//! # Example
//!
//! ```no_run
//! use min_dispersion_primitives::motion_primitives::{
//!     default_artifact_path, DispersionConfig, LookupTableBuilder,
//! };
//!
//! let config = DispersionConfig::new(2, 2).with_controls(5).with_output_mps(9);
//! let builder = LookupTableBuilder::new(config.clone()).unwrap();
//! let table = builder.build();
//! table.save(default_artifact_path("data", &config)).unwrap();
//! ```
//!
//! # References
//!
//! - Jarin-Lipschitz et al., "Dispersion-Minimizing Motion Primitives for Search-Based Motion Planning"
//! - Liu et al., "Search-based Motion Planning for Aggressive Flight in SE(3)"

pub mod config;
pub mod motion_model;
pub mod candidate_generator;
pub mod dispersion_selector;
pub mod integrator_primitive;
pub mod lookup_table;

// Re-exports
pub use config::{DispersionConfig, DistanceMetric};
pub use motion_model::IntegratorChain;
pub use candidate_generator::{CandidateGenerator, CandidateSample, CandidateSet};
pub use dispersion_selector::{dispersion_of, DispersionSelector, SelectedSample, SelectedSet};
pub use integrator_primitive::{IntegratorPrimitive, PrimitiveRecord};
pub use lookup_table::{
    default_artifact_path, CellFailure, GridAxis, LookupEntry, LookupTable, LookupTableBuilder,
    StartStateGrid,
};
