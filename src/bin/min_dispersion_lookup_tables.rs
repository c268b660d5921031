//! Build min-dispersion lookup tables for a range of (q, d) pairs
//!
//! Usage:
//!   cargo run --release --bin min_dispersion_lookup_tables
//!   cargo run --release --bin min_dispersion_lookup_tables -- --max-control-space 4 --dims 2 3
//!   cargo run --release --bin min_dispersion_lookup_tables -- --config my_config.json

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use min_dispersion_primitives::motion_primitives::{
    default_artifact_path, DispersionConfig, DistanceMetric, LookupTableBuilder,
};

/// Magnitude bounds per derivative level; truncated to q + 1 entries
const MAX_STATE_DERIVS: [f64; 5] = [2.0, 2.0, 1.0, 1.0, 1.0];

#[derive(Parser)]
#[command(name = "min_dispersion_lookup_tables")]
#[command(about = "Precompute min-dispersion motion primitive lookup tables")]
struct Args {
    /// Build control spaces q = 2 .. max_control_space - 1
    #[arg(long, default_value_t = 4)]
    max_control_space: usize,

    /// Spatial dimensions to build tables for
    #[arg(long, num_args = 1.., default_values_t = vec![2, 3])]
    dims: Vec<usize>,

    /// Control samples per axis when building candidates
    #[arg(long, default_value_t = 10)]
    num_u: usize,

    /// Primitives kept per start state (default: 3^d)
    #[arg(long)]
    num_output_mps: Option<usize>,

    /// Start-grid points per free derivative slot
    #[arg(long, default_value_t = 5)]
    state_deriv_pts: usize,

    /// Measure dispersion over position only instead of the full state
    #[arg(long)]
    position_only: bool,

    /// Build a single table from a JSON configuration instead
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for the generated tables
    #[arg(short, long, default_value = "lookup_tables")]
    output_dir: PathBuf,
}

fn configs_from_args(args: &Args) -> Vec<DispersionConfig> {
    let metric = if args.position_only {
        DistanceMetric::PositionOnly
    } else {
        DistanceMetric::FullState
    };

    let mut configs = Vec::new();
    for q in 2..args.max_control_space {
        for &d in &args.dims {
            let bounds = MAX_STATE_DERIVS.iter().copied().take(q + 1).collect();
            let k = args
                .num_output_mps
                .unwrap_or_else(|| 3usize.checked_pow(d as u32).unwrap_or(usize::MAX));
            configs.push(
                DispersionConfig::new(q, d)
                    .with_max_state_derivs(bounds)
                    .with_controls(args.num_u)
                    .with_state_deriv_pts(args.state_deriv_pts)
                    .with_output_mps(k)
                    .with_distance_metric(metric),
            );
        }
    }
    configs
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("min_dispersion_primitives=info")),
        )
        .init();

    let args = Args::parse();

    let configs = match &args.config {
        Some(path) => match DispersionConfig::from_json_file(path) {
            Ok(config) => vec![config],
            Err(e) => {
                tracing::error!(path = %path.display(), "failed to load configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => configs_from_args(&args),
    };

    let mut ok = true;
    for config in configs {
        let (q, d) = (config.control_space_q, config.num_dims);
        let builder = match LookupTableBuilder::new(config.clone()) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::error!(q, d, "skipping configuration: {}", e);
                ok = false;
                continue;
            }
        };

        let path = default_artifact_path(&args.output_dir, &config);
        let (table, saved) = builder.build_and_save(&path);
        if let Err(e) = saved {
            tracing::error!(q, d, path = %path.display(), "failed to save lookup table: {}", e);
            ok = false;
        }
        if !table.is_complete() {
            tracing::error!(q, d, failed = table.failed_cells.len(), "lookup table has failed cells");
            ok = false;
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
