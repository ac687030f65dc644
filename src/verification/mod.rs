//! Comparaison formule / primitive du framework et rapport d'exécution

pub mod cells;

use std::fmt;

use serde::Serialize;
use tch::Tensor;

use crate::config::{CheckConfig, Precision};
use crate::{NormCheckError, Result};

pub use cells::{Cell, CELLS};

/// Result of one formula-vs-built-in comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub shape: Vec<i64>,
    pub max_abs_diff: f64,
    pub tolerance: f64,
    pub passed: bool,
}

/// Compares two tensors element-wise; a NaN difference never passes.
pub fn compare(name: &str, ours: &Tensor, theirs: &Tensor, tolerance: f64) -> Result<CheckOutcome> {
    let shape = ours.size();
    if shape != theirs.size() {
        return Err(NormCheckError::ShapeMismatch {
            what: "compared tensors",
            expected: theirs.size(),
            found: shape,
        });
    }

    let max_abs_diff = if ours.numel() == 0 {
        0.0
    } else {
        (ours - theirs).abs().max().double_value(&[])
    };

    Ok(CheckOutcome {
        name: name.to_string(),
        shape,
        max_abs_diff,
        tolerance,
        passed: max_abs_diff <= tolerance,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub generated_at: String,
    pub seed: i64,
    pub precision: Precision,
    pub outcomes: Vec<CheckOutcome>,
}

impl CheckReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<28} {:<16} {:>12} {:>10}  status",
            "check", "shape", "max |diff|", "tol"
        )?;
        for o in &self.outcomes {
            writeln!(
                f,
                "{:<28} {:<16} {:>12.3e} {:>10.1e}  {}",
                o.name,
                format!("{:?}", o.shape),
                o.max_abs_diff,
                o.tolerance,
                if o.passed { "ok" } else { "FAILED" }
            )?;
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} checks, {} failed (seed {}, {:?} precision)",
            self.outcomes.len(),
            failed,
            self.seed,
            self.precision
        )
    }
}

/// Runs every cell of [`CELLS`] with `config`.
pub fn run_all(config: &CheckConfig) -> Result<CheckReport> {
    config.validate()?;

    let mut outcomes = Vec::new();
    for (name, cell) in CELLS {
        log::debug!("running cell {}", name);
        for outcome in cell(config)? {
            if outcome.passed {
                log::info!("✅ {} (max diff {:.3e})", outcome.name, outcome.max_abs_diff);
            } else {
                log::warn!(
                    "❌ {}: max diff {:.3e} > tolerance {:.1e}",
                    outcome.name,
                    outcome.max_abs_diff,
                    outcome.tolerance
                );
            }
            outcomes.push(outcome);
        }
    }

    Ok(CheckReport {
        generated_at: chrono::Local::now().to_rfc3339(),
        seed: config.seed,
        precision: config.precision,
        outcomes,
    })
}
