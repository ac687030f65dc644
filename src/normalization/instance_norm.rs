use tch::Tensor;

use super::axes::ReductionAxes;
use super::batch_norm::channel_view;
use super::statistics::{moments, Affine};
use crate::{NormCheckError, Result};

/// Instance normalization: statistics over the spatial axes of every
/// (sample, channel) pair. `x` is `(N, C, *spatial)`, `affine` is `(C,)`.
pub fn instance_norm(x: &Tensor, affine: Option<&Affine>, eps: f64) -> Result<Tensor> {
    let rank = x.dim();
    if rank < 3 {
        return Err(NormCheckError::RankTooSmall {
            what: "instance norm",
            rank,
            min: 3,
        });
    }

    let stats = moments(x, &ReductionAxes::instance(rank))?;
    let y = stats.standardize(x, eps);
    match affine {
        Some(affine) => {
            let channels = x.size()[1];
            affine.expect_shape("instance norm affine", &[channels])?;
            Ok(affine.apply(&y, &channel_view(rank, channels)))
        }
        None => Ok(y),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tch::{Device, Kind, Tensor};

    use super::*;
    use crate::normalization::DEFAULT_EPS;

    const OPTS: (Kind, Device) = (Kind::Double, Device::Cpu);

    #[test]
    fn test_instance_norm_per_sample_and_channel() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS) * 5.0;
        let y = instance_norm(&x, None, 0.0).unwrap();

        let mean = y.mean_dim(&[2i64, 3][..], false, Kind::Double);
        let var = y.var_dim(&[2i64, 3][..], false, false);
        assert_eq!(mean.size(), vec![2, 3]);
        assert!(mean.abs().max().double_value(&[]) < 1e-10);
        assert!((var - 1.0).abs().max().double_value(&[]) < 1e-10);
    }

    #[test]
    fn test_instance_norm_needs_spatial_axes() {
        let x = Tensor::randn([2, 3], OPTS);
        assert_matches!(
            instance_norm(&x, None, DEFAULT_EPS),
            Err(NormCheckError::RankTooSmall { rank: 2, min: 3, .. })
        );
    }
}
