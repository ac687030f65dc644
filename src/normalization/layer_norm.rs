use tch::Tensor;

use super::axes::ReductionAxes;
use super::statistics::{moments, Affine};
use crate::{NormCheckError, Result};

/// Layer normalization over the trailing `normalized_shape` dimensions.
///
/// Unlike [`super::normalize`], the affine parameters are element-wise over
/// the normalized dimensions: `affine` has shape `normalized_shape`.
pub fn layer_norm(
    x: &Tensor,
    normalized_shape: &[i64],
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    let sizes = x.size();
    let k = normalized_shape.len();
    if k == 0 {
        return Err(NormCheckError::EmptyAxes);
    }
    if sizes.len() < k || sizes[sizes.len() - k..] != *normalized_shape {
        return Err(NormCheckError::ShapeMismatch {
            what: "layer norm trailing dims",
            expected: normalized_shape.to_vec(),
            found: sizes,
        });
    }

    let stats = moments(x, &ReductionAxes::layer(sizes.len(), k))?;
    let y = stats.standardize(x, eps);
    match affine {
        Some(affine) => {
            affine.expect_shape("layer norm affine", normalized_shape)?;
            Ok(affine.apply(&y, normalized_shape))
        }
        None => Ok(y),
    }
}
