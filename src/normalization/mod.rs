pub mod axes;
pub mod batch_norm;
pub mod group_norm;
pub mod instance_norm;
pub mod layer_norm;
pub mod statistics;
pub mod weight_norm;

// Re-export key components for convenience
pub use axes::ReductionAxes;
pub use batch_norm::{batch_norm, batch_norm_eval, RunningStats};
pub use group_norm::group_norm;
pub use instance_norm::instance_norm;
pub use layer_norm::layer_norm;
pub use statistics::{moments, normalize, Affine, Moments, DEFAULT_EPS};
pub use weight_norm::{decompose_weight, weight_norm, WeightDecomposition};
