//! libtorch built-ins, the reference side of every check.
//!
//! Each wrapper calls the fallible `f_*` binding so that a shape error inside
//! the framework surfaces as [`NormCheckError::Torch`](crate::NormCheckError::Torch).

use tch::Tensor;

use crate::normalization::{Affine, RunningStats};
use crate::Result;

// cuDNN is irrelevant on CPU and changes rounding on GPU
const CUDNN: bool = false;

fn weight(affine: Option<&Affine>) -> Option<&Tensor> {
    affine.map(Affine::scale)
}

fn bias(affine: Option<&Affine>) -> Option<&Tensor> {
    affine.map(Affine::shift)
}

/// `torch.batch_norm` in training mode without running buffers
pub fn batch_norm(x: &Tensor, affine: Option<&Affine>, eps: f64) -> Result<Tensor> {
    Ok(x.f_batch_norm(
        weight(affine),
        bias(affine),
        None,
        None,
        true,
        0.0,
        eps,
        CUDNN,
    )?)
}

/// Training-mode batch norm; the framework updates `stats.mean` / `stats.var` in place.
pub fn batch_norm_train(
    x: &Tensor,
    stats: &mut RunningStats,
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    let y = x.f_batch_norm(
        weight(affine),
        bias(affine),
        Some(&stats.mean),
        Some(&stats.var),
        true,
        stats.momentum,
        eps,
        CUDNN,
    )?;
    stats.num_batches_tracked += 1;
    Ok(y)
}

/// Inference-mode batch norm using the running buffers
pub fn batch_norm_eval(
    x: &Tensor,
    stats: &RunningStats,
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    Ok(x.f_batch_norm(
        weight(affine),
        bias(affine),
        Some(&stats.mean),
        Some(&stats.var),
        false,
        stats.momentum,
        eps,
        CUDNN,
    )?)
}

pub fn layer_norm(
    x: &Tensor,
    normalized_shape: &[i64],
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    Ok(x.f_layer_norm(normalized_shape, weight(affine), bias(affine), eps, CUDNN)?)
}

pub fn instance_norm(x: &Tensor, affine: Option<&Affine>, eps: f64) -> Result<Tensor> {
    Ok(x.f_instance_norm(
        weight(affine),
        bias(affine),
        None,
        None,
        true,
        0.0,
        eps,
        CUDNN,
    )?)
}

pub fn group_norm(
    x: &Tensor,
    num_groups: i64,
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    Ok(x.f_group_norm(num_groups, weight(affine), bias(affine), eps, CUDNN)?)
}

/// `torch._weight_norm(v, g, dim)`
pub fn weight_norm(v: &Tensor, g: &Tensor, axis: i64) -> Result<Tensor> {
    Ok(Tensor::f_internal_weight_norm(v, g, axis)?)
}
