//! Configuration for min-dispersion motion primitive generation

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::{MotionPrimitiveError, PrimitiveResult};

/// Distance used when measuring coverage between candidate end states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance over the whole stacked state vector
    FullState,
    /// Euclidean distance over the position components only
    PositionOnly,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::FullState
    }
}

/// Dispersion library configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersionConfig {
    /// Which derivative of position is the control input (q)
    pub control_space_q: usize,
    /// Dimension of the configuration space (d)
    pub num_dims: usize,
    /// Control samples per axis when building candidates
    pub num_u_per_dimension: usize,
    /// Magnitude bound per derivative level, index q is the control bound.
    /// Infinite bounds are stored as `"inf"`.
    #[serde(with = "crate::common::types::non_finite_f64::vec")]
    pub max_state_derivs: Vec<f64>,
    /// Start-grid points per free (level, dimension) slot
    pub num_state_deriv_pts: usize,
    /// Shortest candidate duration [s]
    pub min_dt: f64,
    /// Longest candidate duration [s]
    pub max_dt: f64,
    /// Number of candidate durations
    pub num_dts: usize,
    /// Number of primitives selected per start state (k)
    pub num_output_mps: usize,
    #[serde(default)]
    pub distance_metric: DistanceMetric,
}

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            control_space_q: 3,
            num_dims: 2,
            num_u_per_dimension: 10,
            max_state_derivs: vec![1.0, 1.0, 1.0, 1.0],
            num_state_deriv_pts: 10,
            min_dt: 0.0,
            max_dt: 0.5,
            num_dts: 10,
            num_output_mps: 25,
            distance_metric: DistanceMetric::FullState,
        }
    }
}

impl DispersionConfig {
    pub fn new(control_space_q: usize, num_dims: usize) -> Self {
        Self {
            control_space_q,
            num_dims,
            max_state_derivs: vec![1.0; control_space_q + 1],
            ..Self::default()
        }
    }

    pub fn with_max_state_derivs(mut self, max_state_derivs: Vec<f64>) -> Self {
        self.max_state_derivs = max_state_derivs;
        self
    }

    pub fn with_controls(mut self, num_u_per_dimension: usize) -> Self {
        self.num_u_per_dimension = num_u_per_dimension;
        self
    }

    pub fn with_durations(mut self, min_dt: f64, max_dt: f64, num_dts: usize) -> Self {
        self.min_dt = min_dt;
        self.max_dt = max_dt;
        self.num_dts = num_dts;
        self
    }

    pub fn with_state_deriv_pts(mut self, num_state_deriv_pts: usize) -> Self {
        self.num_state_deriv_pts = num_state_deriv_pts;
        self
    }

    pub fn with_output_mps(mut self, num_output_mps: usize) -> Self {
        self.num_output_mps = num_output_mps;
        self
    }

    pub fn with_distance_metric(mut self, distance_metric: DistanceMetric) -> Self {
        self.distance_metric = distance_metric;
        self
    }

    /// Length of the stacked state vector (n = q * d)
    pub fn state_dim(&self) -> usize {
        self.control_space_q * self.num_dims
    }

    /// Control bound applied to every axis
    pub fn max_u(&self) -> f64 {
        self.max_state_derivs[self.control_space_q]
    }

    /// Number of control combinations, `None` on overflow
    pub fn num_controls(&self) -> Option<usize> {
        checked_pow(self.num_u_per_dimension, self.num_dims)
    }

    /// Total candidates per start state, `None` on overflow
    pub fn num_candidates(&self) -> Option<usize> {
        self.num_controls()?.checked_mul(self.num_dts)
    }

    /// Number of free start-grid axes: levels 1..q-1 times dimensions
    pub fn num_grid_axes(&self) -> usize {
        self.control_space_q.saturating_sub(1) * self.num_dims
    }

    /// Reject configurations that cannot produce a valid library.
    pub fn validate(&self) -> PrimitiveResult<()> {
        if self.control_space_q == 0 {
            return Err(config_error("control_space_q must be at least 1"));
        }
        if self.num_dims == 0 {
            return Err(config_error("num_dims must be at least 1"));
        }
        if self.max_state_derivs.len() != self.control_space_q + 1 {
            return Err(config_error(format!(
                "max_state_derivs must have {} entries (q + 1), got {}",
                self.control_space_q + 1,
                self.max_state_derivs.len()
            )));
        }
        if let Some(b) = self.max_state_derivs.iter().find(|b| !(**b >= 0.0)) {
            return Err(config_error(format!(
                "max_state_derivs must be non-negative, got {}",
                b
            )));
        }
        if self.num_u_per_dimension == 0 {
            return Err(config_error("num_u_per_dimension must be at least 1"));
        }
        if self.num_state_deriv_pts == 0 {
            return Err(config_error("num_state_deriv_pts must be at least 1"));
        }
        if self.num_dts == 0 {
            return Err(config_error("num_dts must be at least 1"));
        }
        if !self.min_dt.is_finite() || !self.max_dt.is_finite() {
            return Err(config_error("duration range must be finite"));
        }
        if self.min_dt < 0.0 || self.max_dt < self.min_dt {
            return Err(config_error(format!(
                "duration range [{}, {}] must satisfy 0 <= min_dt <= max_dt",
                self.min_dt, self.max_dt
            )));
        }
        if self.num_output_mps == 0 {
            return Err(config_error("num_output_mps must be at least 1"));
        }
        let num_candidates = self
            .num_candidates()
            .ok_or_else(|| config_error("candidate count overflows usize"))?;
        if self.num_output_mps >= num_candidates {
            return Err(config_error(format!(
                "num_output_mps ({}) must be smaller than the candidate count ({})",
                self.num_output_mps, num_candidates
            )));
        }
        if checked_pow(self.num_state_deriv_pts, self.num_grid_axes()).is_none() {
            return Err(config_error("start grid size overflows usize"));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PrimitiveResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> PrimitiveResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> MotionPrimitiveError {
    MotionPrimitiveError::ConfigurationError(msg.into())
}

fn checked_pow(base: usize, exp: usize) -> Option<usize> {
    (0..exp).try_fold(1usize, |acc, _| acc.checked_mul(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DispersionConfig {
        DispersionConfig::new(2, 1)
            .with_controls(3)
            .with_durations(0.0, 0.5, 3)
            .with_output_mps(3)
            .with_state_deriv_pts(3)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = DispersionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.state_dim(), 6);
        assert_eq!(config.num_candidates(), Some(1000));
    }

    #[test]
    fn test_derived_quantities() {
        let config = small_config();
        assert_eq!(config.state_dim(), 2);
        assert_eq!(config.num_controls(), Some(3));
        assert_eq!(config.num_candidates(), Some(9));
        assert_eq!(config.num_grid_axes(), 1);
        assert_eq!(config.max_u(), 1.0);
    }

    #[test]
    fn test_rejects_k_not_below_candidate_count() {
        let config = small_config().with_output_mps(9);
        assert!(matches!(
            config.validate(),
            Err(MotionPrimitiveError::ConfigurationError(_))
        ));
        assert!(small_config().with_output_mps(8).validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_order_or_dims() {
        let mut config = small_config();
        config.control_space_q = 0;
        assert!(config.validate().is_err());

        let mut config = small_config();
        config.num_dims = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_bounds() {
        let config = small_config().with_max_state_derivs(vec![1.0, 1.0]);
        assert!(config.validate().is_err());

        let config = small_config().with_max_state_derivs(vec![1.0, -1.0, 1.0]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_nan_bound() {
        let config = small_config().with_max_state_derivs(vec![1.0, f64::NAN, 1.0]);
        assert!(matches!(
            config.validate(),
            Err(MotionPrimitiveError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_non_finite_bounds_pass_validation() {
        let config = small_config().with_max_state_derivs(vec![1.0, 1.0, f64::INFINITY]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_infinite_bound_survives_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = small_config().with_max_state_derivs(vec![1.0, 1.0, f64::INFINITY]);
        config.to_json_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"inf\""));
        assert!(!text.contains("null"));
        assert_eq!(DispersionConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_nan_bound_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = small_config();
        config.max_state_derivs[2] = f64::NAN;
        config.to_json_file(&path).unwrap();

        assert!(matches!(
            DispersionConfig::from_json_file(&path),
            Err(MotionPrimitiveError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_rejects_bad_durations() {
        assert!(small_config().with_durations(0.5, 0.1, 3).validate().is_err());
        assert!(small_config().with_durations(-0.1, 0.1, 3).validate().is_err());
        assert!(small_config()
            .with_durations(0.0, f64::NAN, 3)
            .validate()
            .is_err());
        assert!(small_config().with_durations(0.0, 0.0, 3).validate().is_ok());
    }

    #[test]
    fn test_rejects_overflowing_candidate_count() {
        let config = DispersionConfig::new(1, 64).with_controls(1000).with_output_mps(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = small_config().with_distance_metric(DistanceMetric::PositionOnly);
        config.to_json_file(&path).unwrap();

        let loaded = DispersionConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_metric_defaults_when_absent() {
        let json = r#"{
            "control_space_q": 2, "num_dims": 1, "num_u_per_dimension": 3,
            "max_state_derivs": [1.0, 1.0, 1.0], "num_state_deriv_pts": 3,
            "min_dt": 0.0, "max_dt": 0.5, "num_dts": 3, "num_output_mps": 3
        }"#;
        let config: DispersionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.distance_metric, DistanceMetric::FullState);
    }
}
