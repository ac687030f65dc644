// main.rs - runs every normalization check and reports the result
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use normcheck::logging::setup_logging;
use normcheck::{run_all, CheckConfig, Precision};

#[derive(Parser, Debug)]
#[command(name = "normcheck")]
#[command(about = "Cross-check normalization formulas against the libtorch built-ins")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Random seed used by every cell
    #[arg(short = 's', long)]
    seed: Option<i64>,

    /// Epsilon added to the variance
    #[arg(long)]
    eps: Option<f64>,

    /// Maximum accepted absolute difference
    #[arg(short = 't', long)]
    tolerance: Option<f64>,

    /// Tensor precision
    #[arg(long, value_enum)]
    precision: Option<Precision>,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write rotating log files here instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> normcheck::Result<CheckConfig> {
        let mut config = match &self.config {
            Some(path) => CheckConfig::from_json_file(path)?,
            None => CheckConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(eps) = self.eps {
            config.eps = eps;
        }
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(precision) = self.precision {
            config.precision = precision;
        }
        Ok(config)
    }
}

// ============================================================================
// FONCTION PRINCIPALE
// ============================================================================

fn run(args: &Args) -> normcheck::Result<bool> {
    let config = args.resolve_config()?;
    log::info!(
        "🚀 normcheck v{} (seed {}, {:?}, tolerance {:.1e})",
        normcheck::VERSION,
        config.seed,
        config.precision,
        config.tolerance
    );

    let report = run_all(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(report.all_passed())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let _logger = match setup_logging(&args.log_level, args.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("❌ failed to start logger: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            log::warn!("some checks failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("❌ {e}");
            ExitCode::from(2)
        }
    }
}
