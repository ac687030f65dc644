//! # normcheck
//!
//! Textbook normalization formulas recomputed with elementary tensor arithmetic
//! and checked against the libtorch built-ins.
//!
//! ## Features
//!
//! - **Normalization**: batch, layer, instance and group normalization over an explicit axis set
//! - **Weight normalization**: magnitude / direction decomposition of weight matrices
//! - **Reference**: thin wrappers over the framework primitives
//! - **Verification**: independent cells comparing both sides on random tensors
//!
//! ## Usage
//!
//! ```no_run
//! use normcheck::{normalize, ReductionAxes};
//! use tch::{Device, Kind, Tensor};
//!
//! let x = Tensor::randn([2, 3, 4, 4], (Kind::Float, Device::Cpu));
//! let y = normalize(&x, &ReductionAxes::new([0, 2, 3]), 1e-5, None)?;
//! assert_eq!(y.size(), x.size());
//! # Ok::<(), normcheck::NormCheckError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Closed-form normalization formulas
pub mod normalization;

/// Framework built-ins used as the reference side of every check
pub mod reference;

/// Comparison helpers and verification cells
pub mod verification;

/// Run configuration
pub mod config;

/// Logger setup
pub mod logging;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{CheckConfig, Precision};
pub use normalization::{
    batch_norm, batch_norm_eval, decompose_weight, group_norm, instance_norm, layer_norm, moments,
    normalize, weight_norm, Affine, Moments, ReductionAxes, RunningStats, WeightDecomposition,
    DEFAULT_EPS,
};
pub use verification::{compare, run_all, CheckOutcome, CheckReport};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the normcheck library
#[derive(Debug, thiserror::Error)]
pub enum NormCheckError {
    #[error("shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<i64>,
        found: Vec<i64>,
    },

    #[error("axis {axis} out of range for a tensor of rank {rank}")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("axis {0} appears more than once in the reduction set")]
    DuplicateAxis(i64),

    #[error("{what} got an empty tensor of shape {shape:?}")]
    EmptyTensor { what: &'static str, shape: Vec<i64> },

    #[error("reduction axis set is empty")]
    EmptyAxes,

    #[error("{what} needs a tensor of rank >= {min}, got rank {rank}")]
    RankTooSmall {
        what: &'static str,
        rank: usize,
        min: usize,
    },

    #[error("{num_channels} channels cannot be split into {num_groups} groups")]
    InvalidGroups { num_channels: i64, num_groups: i64 },

    #[error("weight slice {0} has zero norm and no direction")]
    DegenerateWeight(i64),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging error: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, NormCheckError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
