//! Configuration d'une exécution : défauts, fichier JSON, puis options CLI

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::{Device, Kind};

use crate::normalization::DEFAULT_EPS;
use crate::{NormCheckError, Result};

/// Floating-point precision of the generated tensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn kind(self) -> Kind {
        match self {
            Precision::Single => Kind::Float,
            Precision::Double => Kind::Double,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Seed passed to `tch::manual_seed` before every cell
    pub seed: i64,
    pub eps: f64,
    /// Maximum absolute difference accepted between formula and built-in
    pub tolerance: f64,
    pub precision: Precision,
    /// `(N, C, H, W)` input for batch, instance and group norm
    pub image_shape: Vec<i64>,
    /// `(N, T, D)` input for layer norm
    pub sequence_shape: Vec<i64>,
    /// Number of trailing dims of `sequence_shape` normalized by layer norm
    pub layer_normalized_dims: usize,
    pub num_groups: i64,
    /// `(out_features, in_features)`
    pub weight_shape: Vec<i64>,
    pub momentum: f64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            eps: DEFAULT_EPS,
            tolerance: 1e-5,
            precision: Precision::Single,
            image_shape: vec![2, 3, 4, 4],
            sequence_shape: vec![2, 5, 8],
            layer_normalized_dims: 1,
            num_groups: 3,
            weight_shape: vec![4, 3],
            momentum: 0.1,
        }
    }
}

impl CheckConfig {
    /// Loads a JSON file; missing fields take their default value.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: CheckConfig = serde_json::from_str(&raw)?;
        log::debug!("config loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn options(&self) -> (Kind, Device) {
        (self.precision.kind(), Device::Cpu)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.eps > 0.0) {
            return Err(invalid(format!("eps must be positive, got {}", self.eps)));
        }
        if !(self.tolerance > 0.0) {
            return Err(invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.momentum) {
            return Err(invalid(format!(
                "momentum must lie in [0, 1], got {}",
                self.momentum
            )));
        }
        if self.image_shape.len() < 3 {
            return Err(invalid(format!(
                "image_shape needs (N, C, *spatial), got {:?}",
                self.image_shape
            )));
        }
        if self.layer_normalized_dims == 0
            || self.layer_normalized_dims > self.sequence_shape.len()
        {
            return Err(invalid(format!(
                "layer_normalized_dims {} does not fit sequence_shape {:?}",
                self.layer_normalized_dims, self.sequence_shape
            )));
        }
        if self.num_groups <= 0 || self.image_shape[1] % self.num_groups != 0 {
            return Err(invalid(format!(
                "num_groups {} must divide the {} channels of image_shape",
                self.num_groups, self.image_shape[1]
            )));
        }
        if self.weight_shape.len() != 2 {
            return Err(invalid(format!(
                "weight_shape must be 2-D, got {:?}",
                self.weight_shape
            )));
        }
        let non_positive = self
            .image_shape
            .iter()
            .chain(&self.sequence_shape)
            .chain(&self.weight_shape)
            .any(|&d| d <= 0);
        if non_positive {
            return Err(invalid("every dimension must be positive".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> NormCheckError {
    NormCheckError::Config(message)
}
