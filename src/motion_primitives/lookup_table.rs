//! Start-state lookup table of min-dispersion primitive sets
//!
//! The builder sweeps a grid of start states (position fixed at zero, every
//! higher derivative below the control sampled), runs candidate generation
//! and dispersion selection per cell, and persists the result as a single
//! JSON artifact. Cells are independent and are computed in parallel.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use nalgebra::DVector;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::error::{MotionPrimitiveError, PrimitiveResult};
use crate::common::types::{linspace, GridIndex, StateVector};

use super::candidate_generator::CandidateGenerator;
use super::config::DispersionConfig;
use super::dispersion_selector::{DispersionSelector, SelectedSet};
use super::integrator_primitive::IntegratorPrimitive;
use super::motion_model::IntegratorChain;

/// One free axis of the start-state grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    /// Derivative level (1..q-1)
    pub level: usize,
    /// Spatial dimension
    pub dim: usize,
    /// Values span [-bound, bound]
    #[serde(with = "crate::common::types::non_finite_f64")]
    pub bound: f64,
    pub num_points: usize,
}

impl GridAxis {
    pub fn values(&self) -> Vec<f64> {
        linspace(-self.bound, self.bound, self.num_points)
    }
}

/// Start-state grid definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartStateGrid {
    pub num_dims: usize,
    pub control_space_q: usize,
    /// Level-major, then dimension; the first axis varies slowest
    pub axes: Vec<GridAxis>,
}

impl StartStateGrid {
    pub fn new(config: &DispersionConfig) -> Self {
        let axes = (1..config.control_space_q)
            .flat_map(|level| {
                (0..config.num_dims).map(move |dim| GridAxis {
                    level,
                    dim,
                    bound: config.max_state_derivs[level],
                    num_points: config.num_state_deriv_pts,
                })
            })
            .collect();

        Self {
            num_dims: config.num_dims,
            control_space_q: config.control_space_q,
            axes,
        }
    }

    pub fn num_cells(&self) -> usize {
        self.axes.iter().map(|a| a.num_points).product()
    }

    /// All grid indices in row-major order
    pub fn indices(&self) -> Vec<GridIndex> {
        if self.axes.is_empty() {
            return vec![Vec::new()];
        }
        self.axes
            .iter()
            .map(|a| 0..a.num_points)
            .multi_cartesian_product()
            .collect()
    }

    /// Start state of a grid cell; position components are zero
    pub fn start_state(&self, index: &[usize]) -> PrimitiveResult<StateVector> {
        if index.len() != self.axes.len() {
            return Err(MotionPrimitiveError::InvalidParameter(format!(
                "grid index {:?} must have {} entries",
                index,
                self.axes.len()
            )));
        }
        let d = self.num_dims;
        let mut state = DVector::zeros(self.control_space_q * d);
        for (axis, &i) in self.axes.iter().zip(index) {
            if i >= axis.num_points {
                return Err(MotionPrimitiveError::InvalidParameter(format!(
                    "grid index {:?} out of range",
                    index
                )));
            }
            state[axis.level * d + axis.dim] = axis.values()[i];
        }
        Ok(state)
    }
}

/// Selected primitives for one start-grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub grid_index: GridIndex,
    pub start_state: Vec<f64>,
    pub primitives: SelectedSet,
}

impl LookupEntry {
    /// Materialize the selected set as primitives starting at this entry's
    /// start state.
    pub fn primitives(&self, model: &IntegratorChain) -> PrimitiveResult<Vec<IntegratorPrimitive>> {
        let start = DVector::from_vec(self.start_state.clone());
        self.primitives
            .samples
            .iter()
            .map(|sample| IntegratorPrimitive::from_selected(model, &start, sample))
            .collect()
    }
}

/// A cell whose computation failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellFailure {
    pub grid_index: GridIndex,
    pub reason: String,
}

/// Persisted library: configuration, grid and per-cell selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTable {
    pub config: DispersionConfig,
    pub grid: StartStateGrid,
    /// Row-major by grid index
    pub entries: Vec<LookupEntry>,
    #[serde(default)]
    pub failed_cells: Vec<CellFailure>,
}

impl LookupTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every grid cell produced a selection
    pub fn is_complete(&self) -> bool {
        self.failed_cells.is_empty() && self.entries.len() == self.grid.num_cells()
    }

    pub fn get(&self, grid_index: &[usize]) -> Option<&LookupEntry> {
        self.entries
            .binary_search_by(|e| e.grid_index.as_slice().cmp(grid_index))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Dynamics rebuilt from the stored configuration
    pub fn model(&self) -> IntegratorChain {
        IntegratorChain::new(self.config.control_space_q, self.config.num_dims)
    }

    /// Entry whose start state is closest to `state` ignoring position,
    /// which the dynamics are invariant to.
    pub fn find_nearest_entry(&self, state: &StateVector) -> Option<&LookupEntry> {
        let d = self.config.num_dims;
        if state.len() != self.config.state_dim() {
            return None;
        }
        self.entries.iter().min_by_key(|e| {
            let dist: f64 = e
                .start_state
                .iter()
                .zip(state.iter())
                .skip(d)
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            OrderedFloat(dist)
        })
    }

    /// Write the table as pretty JSON.
    ///
    /// Data goes to a temporary file next to `path` that is renamed into place
    /// only after a successful flush; on any error it is removed on drop.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PrimitiveResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| MotionPrimitiveError::IoError(e.error))?;

        info!(
            path = %path.display(),
            entries = self.entries.len(),
            failed = self.failed_cells.len(),
            "saved lookup table"
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PrimitiveResult<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let table: LookupTable = serde_json::from_reader(reader)?;
        table.config.validate()?;
        if table.grid != StartStateGrid::new(&table.config) {
            return Err(MotionPrimitiveError::ConfigurationError(
                "stored grid does not match stored configuration".to_string(),
            ));
        }
        table.check_entries()?;
        Ok(table)
    }

    /// Entries must be strictly row-major, sit on the grid, and hold exactly
    /// `num_output_mps` selections each.
    fn check_entries(&self) -> PrimitiveResult<()> {
        let malformed = |index: &[usize], what: String| {
            MotionPrimitiveError::ConfigurationError(format!(
                "stored entry {:?}: {}",
                index, what
            ))
        };
        let k = self.config.num_output_mps;

        for (i, entry) in self.entries.iter().enumerate() {
            let index = entry.grid_index.as_slice();
            if i > 0 && self.entries[i - 1].grid_index.as_slice() >= index {
                return Err(malformed(index, "entries are not in row-major order".to_string()));
            }
            let start = self
                .grid
                .start_state(index)
                .map_err(|e| malformed(index, e.to_string()))?;
            if start.as_slice() != entry.start_state.as_slice() {
                return Err(malformed(index, "start state does not match the grid".to_string()));
            }
            let selected = &entry.primitives;
            if selected.len() != k || selected.coverage.len() != k {
                return Err(malformed(
                    index,
                    format!(
                        "expected {} primitives, found {} with {} coverage radii",
                        k,
                        selected.len(),
                        selected.coverage.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// `root/dimension_{d}/control_space_{q}/lookup_table.json`
pub fn default_artifact_path<P: AsRef<Path>>(root: P, config: &DispersionConfig) -> PathBuf {
    root.as_ref()
        .join(format!("dimension_{}", config.num_dims))
        .join(format!("control_space_{}", config.control_space_q))
        .join("lookup_table.json")
}

/// Sweeps the start-state grid and assembles the lookup table
#[derive(Debug, Clone)]
pub struct LookupTableBuilder {
    config: DispersionConfig,
    grid: StartStateGrid,
    generator: CandidateGenerator,
    selector: DispersionSelector,
}

impl LookupTableBuilder {
    pub fn new(config: DispersionConfig) -> PrimitiveResult<Self> {
        config.validate()?;
        Ok(Self {
            grid: StartStateGrid::new(&config),
            generator: CandidateGenerator::new(&config)?,
            selector: DispersionSelector::new(&config)?,
            config,
        })
    }

    pub fn config(&self) -> &DispersionConfig {
        &self.config
    }

    pub fn grid(&self) -> &StartStateGrid {
        &self.grid
    }

    /// Selection for a single grid cell
    pub fn build_cell(&self, grid_index: &[usize]) -> PrimitiveResult<LookupEntry> {
        let start = self.grid.start_state(grid_index)?;
        let candidates = self
            .generator
            .generate(&start)
            .map_err(|e| e.at_cell(grid_index))?;
        let primitives = self
            .selector
            .select(&candidates)
            .map_err(|e| e.at_cell(grid_index))?;

        Ok(LookupEntry {
            grid_index: grid_index.to_vec(),
            start_state: start.as_slice().to_vec(),
            primitives,
        })
    }

    /// Compute every cell. Failed cells are recorded, not dropped.
    pub fn build(&self) -> LookupTable {
        let indices = self.grid.indices();
        info!(
            q = self.config.control_space_q,
            d = self.config.num_dims,
            cells = indices.len(),
            candidates = self.generator.num_candidates(),
            k = self.config.num_output_mps,
            "building lookup table"
        );

        // Collecting an indexed parallel iterator keeps row-major order, so
        // each result lands in its own slot regardless of completion order.
        let results: Vec<PrimitiveResult<LookupEntry>> = indices
            .par_iter()
            .map(|index| {
                let result = self.build_cell(index);
                debug!(grid_index = ?index, ok = result.is_ok(), "cell done");
                result
            })
            .collect();

        let mut entries = Vec::with_capacity(results.len());
        let mut failed_cells = Vec::new();
        for (index, result) in indices.into_iter().zip(results) {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(grid_index = ?index, error = %e, "cell failed");
                    failed_cells.push(CellFailure {
                        grid_index: index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            entries = entries.len(),
            failed = failed_cells.len(),
            "lookup table built"
        );
        LookupTable {
            config: self.config.clone(),
            grid: self.grid.clone(),
            entries,
            failed_cells,
        }
    }

    /// Build and persist to `path`. The table is returned even when saving
    /// fails so the computed cells are not lost.
    pub fn build_and_save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> (LookupTable, PrimitiveResult<()>) {
        let table = self.build();
        let saved = table.save(path);
        (table, saved)
    }
}
