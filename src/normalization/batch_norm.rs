use tch::{Device, Kind, Tensor};

use super::axes::ReductionAxes;
use super::statistics::{expect_non_empty, moments, normalize, Affine, Moments};
use crate::{NormCheckError, Result};

/// Batch normalization: statistics per channel over batch and spatial axes.
///
/// `x` is `(N, C, *)`; `affine`, when given, is `(C,)`.
pub fn batch_norm(x: &Tensor, affine: Option<&Affine>, eps: f64) -> Result<Tensor> {
    let rank = expect_rank(x)?;
    normalize(x, &ReductionAxes::batch(rank), eps, affine)
}

/// Normalizes with the running buffers instead of the batch statistics (inference mode).
pub fn batch_norm_eval(
    x: &Tensor,
    stats: &RunningStats,
    affine: Option<&Affine>,
    eps: f64,
) -> Result<Tensor> {
    let rank = expect_rank(x)?;
    let channels = x.size()[1];
    stats.expect_channels(channels)?;

    let view = channel_view(rank, channels);
    let running = Moments {
        mean: stats.mean.view(view.as_slice()),
        var: stats.var.view(view.as_slice()),
    };
    let y = running.standardize(x, eps);
    match affine {
        Some(affine) => {
            affine.expect_shape("batch norm affine", &[channels])?;
            Ok(affine.apply(&y, &view))
        }
        None => Ok(y),
    }
}

/// Running mean and variance tracked across training batches
#[derive(Debug)]
pub struct RunningStats {
    pub mean: Tensor,
    pub var: Tensor,
    pub momentum: f64,
    pub num_batches_tracked: i64,
}

impl RunningStats {
    pub fn new(num_channels: i64, momentum: f64, options: (Kind, Device)) -> Self {
        Self {
            mean: Tensor::zeros([num_channels], options),
            var: Tensor::ones([num_channels], options),
            momentum,
            num_batches_tracked: 0,
        }
    }

    pub fn num_channels(&self) -> i64 {
        self.mean.size()[0]
    }

    /// Folds the statistics of `x` into the buffers.
    ///
    /// `running = (1 - momentum) * running + momentum * batch`, where the
    /// variance term is the unbiased batch variance `var * n / (n - 1)`.
    pub fn update(&mut self, x: &Tensor) -> Result<()> {
        let rank = expect_rank(x)?;
        let sizes = x.size();
        self.expect_channels(sizes[1])?;

        let axes = ReductionAxes::batch(rank);
        let Moments { mean, var } = moments(x, &axes)?;
        let n: i64 = sizes.iter().product::<i64>() / sizes[1];
        let correction = if n > 1 { n as f64 / (n - 1) as f64 } else { 1.0 };

        let m = self.momentum;
        self.mean = &self.mean * (1.0 - m) + mean.view([-1]) * m;
        self.var = &self.var * (1.0 - m) + var.view([-1]) * (correction * m);
        self.num_batches_tracked += 1;

        log::debug!(
            "running stats updated: batch #{} (n={}, momentum={})",
            self.num_batches_tracked,
            n,
            m
        );
        Ok(())
    }

    fn expect_channels(&self, channels: i64) -> Result<()> {
        if self.num_channels() != channels {
            return Err(NormCheckError::ShapeMismatch {
                what: "running statistics",
                expected: vec![channels],
                found: self.mean.size(),
            });
        }
        Ok(())
    }
}

fn expect_rank(x: &Tensor) -> Result<usize> {
    let rank = x.dim();
    if rank < 2 {
        return Err(NormCheckError::RankTooSmall {
            what: "batch norm",
            rank,
            min: 2,
        });
    }
    expect_non_empty(x, "batch norm")?;
    Ok(rank)
}

/// `[1, C, 1, ...]` for a tensor of the given rank
pub(crate) fn channel_view(rank: usize, channels: i64) -> Vec<i64> {
    let mut view = vec![1i64; rank];
    view[1] = channels;
    view
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tch::{Device, Kind, Tensor};

    use super::*;
    use crate::normalization::DEFAULT_EPS;

    const OPTS: (Kind, Device) = (Kind::Double, Device::Cpu);

    #[test]
    fn test_batch_norm_per_channel() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS) * 2.0 - 1.0;
        let y = batch_norm(&x, None, DEFAULT_EPS).unwrap();

        assert_eq!(y.size(), vec![2, 3, 4, 4]);
        let mean = y.mean_dim(&[0i64, 2, 3][..], false, Kind::Double);
        assert_eq!(mean.size(), vec![3]);
        assert!(mean.abs().max().double_value(&[]) < 1e-10);
    }

    #[test]
    fn test_batch_norm_rank_one_rejected() {
        let x = Tensor::randn([5], OPTS);
        assert_matches!(
            batch_norm(&x, None, DEFAULT_EPS),
            Err(NormCheckError::RankTooSmall { rank: 1, min: 2, .. })
        );
    }

    #[test]
    fn test_running_stats_update() {
        let x = Tensor::randn([4, 2, 3], OPTS);
        let mut stats = RunningStats::new(2, 0.1, OPTS);
        stats.update(&x).unwrap();

        let batch_mean = x.mean_dim(&[0i64, 2][..], false, Kind::Double);
        let batch_var = x.var_dim(&[0i64, 2][..], true, false);
        assert!(stats.mean.allclose(&(&batch_mean * 0.1), 1e-10, 1e-12, false));
        assert!(stats
            .var
            .allclose(&(batch_var * 0.1 + 0.9), 1e-10, 1e-12, false));
        assert_eq!(stats.num_batches_tracked, 1);
    }

    #[test]
    fn test_eval_with_fresh_stats_is_identity_up_to_eps() {
        let x = Tensor::randn([2, 3, 5], OPTS);
        let stats = RunningStats::new(3, 0.1, OPTS);
        let y = batch_norm_eval(&x, &stats, None, 0.0).unwrap();
        assert!(y.allclose(&x, 1e-12, 1e-12, false));
    }

    #[test]
    fn test_zero_channel_batch_rejected() {
        let x = Tensor::zeros([2, 0, 3], OPTS);
        let mut stats = RunningStats::new(0, 0.1, OPTS);
        assert_matches!(
            stats.update(&x),
            Err(NormCheckError::EmptyTensor { what: "batch norm", .. })
        );
        assert_eq!(stats.num_batches_tracked, 0);
        assert_matches!(
            batch_norm(&Tensor::zeros([0, 3, 4], OPTS), None, DEFAULT_EPS),
            Err(NormCheckError::EmptyTensor { .. })
        );
    }

    #[test]
    fn test_running_stats_channel_mismatch() {
        let x = Tensor::randn([2, 3, 5], OPTS);
        let mut stats = RunningStats::new(4, 0.1, OPTS);
        assert_matches!(
            stats.update(&x),
            Err(NormCheckError::ShapeMismatch { what: "running statistics", .. })
        );
        assert_matches!(
            batch_norm_eval(&x, &stats, None, DEFAULT_EPS),
            Err(NormCheckError::ShapeMismatch { .. })
        );
    }
}
