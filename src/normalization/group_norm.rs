use tch::Tensor;

use super::axes::ReductionAxes;
use super::batch_norm::channel_view;
use super::statistics::{expect_non_empty, moments, Affine};
use crate::{NormCheckError, Result};

/// Group normalization.
///
/// The `C` channels are split into `num_groups` contiguous groups; each
/// (sample, group) pair is normalized over its channels and spatial axes.
/// `affine` is per channel, `(C,)`.
pub fn group_norm(
    x: &Tensor,
    num_groups: i64,
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    let sizes = x.size();
    if sizes.len() < 2 {
        return Err(NormCheckError::RankTooSmall {
            what: "group norm",
            rank: sizes.len(),
            min: 2,
        });
    }
    expect_non_empty(x, "group norm")?;
    let (batch, channels) = (sizes[0], sizes[1]);
    if num_groups <= 0 || channels % num_groups != 0 {
        return Err(NormCheckError::InvalidGroups {
            num_channels: channels,
            num_groups,
        });
    }

    // (N, C, *) -> (N, G, C/G * spatial)
    let grouped = x.reshape([batch, num_groups, -1]);
    let stats = moments(&grouped, &ReductionAxes::new([2]))?;
    let y = stats.standardize(&grouped, eps).reshape(sizes.as_slice());

    match affine {
        Some(affine) => {
            affine.expect_shape("group norm affine", &[channels])?;
            Ok(affine.apply(&y, &channel_view(sizes.len(), channels)))
        }
        None => Ok(y),
    }
}
