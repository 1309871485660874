//! Jacobian Statistics Binary
//!
//! Loads a BAL (Bundle Adjustment in the Large) file, assembles the Schur-complement
//! Jacobian at the initial estimate and reports its shape, sparsity and evaluation time.
//!
//! # Usage
//! ```bash
//! cargo run --release --bin jacobian_stats -- path/to/problem.txt
//!
//! # With limited points for quick testing:
//! cargo run --release --bin jacobian_stats -- problem.txt -n 1000
//!
//! # Parallel assembly, averaged over 20 evaluations:
//! cargo run --release --bin jacobian_stats -- problem.txt --parallel -i 20
//! ```

use clap::Parser;
use sba_jacobian::{
    BalLoader, ReprojectionResidual, SbaError, SbaResult, SceneCodec, SchurJacobian,
    SchurJacobianConfig, init_logger, scene_from_bal,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Schur Jacobian statistics for BAL datasets
#[derive(Parser)]
#[command(name = "jacobian_stats")]
#[command(about = "Assemble the Schur-complement Jacobian of a BAL dataset")]
struct Args {
    /// BAL file path (required, positional)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Limit number of points (for testing)
    #[arg(short = 'n', long)]
    num_points: Option<usize>,

    /// Number of timed Jacobian evaluations
    #[arg(short, long, default_value_t = 5)]
    iterations: usize,

    /// Assemble views in parallel
    #[arg(short, long)]
    parallel: bool,
}

fn main() -> SbaResult<()> {
    let args = Args::parse();

    init_logger();

    if !args.file.exists() {
        return Err(SbaError::InvalidInput(format!(
            "File not found: {}",
            args.file.display()
        )));
    }

    info!("Loading BAL dataset: {}", args.file.display());
    let start_load = Instant::now();
    let dataset = BalLoader::load(&args.file)?;
    let load_time = start_load.elapsed();

    let (structure, observations) = scene_from_bal(&dataset, args.num_points)?;
    info!("Dataset statistics:");
    info!("  Cameras: {}", dataset.cameras.len());
    info!("  Points used: {}", structure.points.len());
    info!("  Observations used: {}", observations.observation_count());
    info!("  Load time: {:?}", load_time);

    let structure = Arc::new(structure);
    let observations = Arc::new(observations);

    let config = SchurJacobianConfig::new().with_parallel(args.parallel);
    let mut jacobian = SchurJacobian::new(config);
    jacobian.configure(structure.clone(), observations.clone())?;

    let layout = jacobian
        .layout()
        .ok_or_else(|| SbaError::Jacobian("not configured".to_string()))?;
    let parameters = SceneCodec::encode(&structure, layout);

    let mut residual = ReprojectionResidual::new();
    residual.configure(structure, observations)?;
    let rms = residual.rms_error(&parameters)?;

    let iterations = args.iterations.max(1);
    let start = Instant::now();
    let mut result = jacobian.process(&parameters)?;
    for _ in 1..iterations {
        result = jacobian.process(&parameters)?;
    }
    let elapsed = start.elapsed();
    let (left, right) = result;

    let rows = jacobian.output_dimension();
    let left_nnz = left.compute_nnz();
    let right_nnz = right.compute_nnz();
    let density = |nnz: usize, cols: usize| {
        if rows == 0 || cols == 0 {
            0.0
        } else {
            100.0 * nnz as f64 / (rows * cols) as f64
        }
    };

    info!("Jacobian:");
    info!("  Parameters: {}", jacobian.input_dimension());
    info!("  Residuals: {}", rows);
    info!(
        "  Left (points): {}x{}, {} entries ({:.4}%)",
        left.nrows(),
        left.ncols(),
        left_nnz,
        density(left_nnz, left.ncols())
    );
    info!(
        "  Right (views + cameras): {}x{}, {} entries ({:.4}%)",
        right.nrows(),
        right.ncols(),
        right_nnz,
        density(right_nnz, right.ncols())
    );
    info!("  Initial RMS reprojection error: {:.4} px", rms);
    info!(
        "  Evaluation time: {:?} per call over {} calls ({})",
        elapsed / iterations as u32,
        iterations,
        if args.parallel { "parallel" } else { "serial" }
    );

    Ok(())
}
