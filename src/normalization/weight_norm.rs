//! Weight normalization: `w = g * v / ||v||`, one magnitude per output unit.

use tch::Tensor;

use super::axes::ReductionAxes;
use super::statistics::expect_non_empty;
use crate::{NormCheckError, Result};

/// A weight split into per-unit magnitude and unit-norm direction
#[derive(Debug)]
pub struct WeightDecomposition {
    /// L2 norm of every slice along `axis`, reduced dims kept with size 1: `(rows, 1)` for a matrix
    pub magnitude: Tensor,
    /// `weight / magnitude`
    pub direction: Tensor,
    axis: i64,
}

impl WeightDecomposition {
    pub fn axis(&self) -> i64 {
        self.axis
    }

    /// `magnitude * direction`
    pub fn recompose(&self) -> Tensor {
        &self.magnitude * &self.direction
    }

    /// L2 norm of every direction slice; all ones up to rounding.
    pub fn direction_norms(&self) -> Result<Tensor> {
        slice_norm(&self.direction, self.axis)
    }

    /// `x @ w.T + bias` with the recomposed weight
    pub fn linear(&self, x: &Tensor, bias: Option<&Tensor>) -> Result<Tensor> {
        Ok(x.f_linear(&self.recompose(), bias)?)
    }
}

/// Splits `weight` into magnitude and direction along `axis` (0 = per output row).
pub fn decompose_weight(weight: &Tensor, axis: i64) -> Result<WeightDecomposition> {
    let axis = resolve_axis(weight, axis)?;
    expect_non_empty(weight, "weight decomposition")?;
    let magnitude = slice_norm(weight, axis)?;

    let flat = magnitude.reshape([-1]);
    if flat.min().double_value(&[]) <= 0.0 {
        let index = flat.argmin(0, false).int64_value(&[]);
        return Err(NormCheckError::DegenerateWeight(index));
    }

    let direction = weight / &magnitude;
    log::debug!(
        "weight {:?} decomposed along axis {}: magnitude {:?}",
        weight.size(),
        axis,
        magnitude.size()
    );
    Ok(WeightDecomposition {
        magnitude,
        direction,
        axis,
    })
}

/// Forward of a weight-normalized layer: rebuilds `w = g * v / ||v||`.
///
/// `g` has the magnitude shape of `v` along `axis`.
pub fn weight_norm(v: &Tensor, g: &Tensor, axis: i64) -> Result<Tensor> {
    let axis = resolve_axis(v, axis)?;
    expect_non_empty(v, "weight norm")?;
    let norm = slice_norm(v, axis)?;
    if g.size() != norm.size() {
        return Err(NormCheckError::ShapeMismatch {
            what: "weight norm magnitude",
            expected: norm.size(),
            found: g.size(),
        });
    }
    Ok(v * (g / norm))
}

fn resolve_axis(weight: &Tensor, axis: i64) -> Result<i64> {
    let rank = weight.dim();
    if rank == 0 {
        return Err(NormCheckError::RankTooSmall {
            what: "weight decomposition",
            rank,
            min: 1,
        });
    }
    Ok(ReductionAxes::new([axis]).resolve(rank)?[0])
}

/// sqrt(sum(x^2)) over every dim but `axis`, keepdim
fn slice_norm(x: &Tensor, axis: i64) -> Result<Tensor> {
    let others = ReductionAxes::new([axis]).complement(x.dim())?;
    if others.is_empty() {
        return Ok(x.abs());
    }
    Ok(x
        .square()
        .sum_dim_intlist(others.as_slice(), true, x.kind())
        .sqrt())
}
