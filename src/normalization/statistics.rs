//! Statistiques de normalisation : moyenne, variance biaisée et transformation affine

use tch::{Device, Kind, Tensor};

use super::axes::ReductionAxes;
use crate::{NormCheckError, Result};

/// Epsilon added to the variance before the square root
pub const DEFAULT_EPS: f64 = 1e-5;

/// Mean and biased variance, both keeping the reduced dims with size 1
#[derive(Debug)]
pub struct Moments {
    pub mean: Tensor,
    pub var: Tensor,
}

impl Moments {
    /// `(x - mean) / sqrt(var + eps)`
    pub fn standardize(&self, x: &Tensor, eps: f64) -> Tensor {
        (x - &self.mean) / (&self.var + eps).sqrt()
    }
}

/// Per-unit scale (gamma) and shift (beta)
#[derive(Debug)]
pub struct Affine {
    scale: Tensor,
    shift: Tensor,
}

impl Affine {
    pub fn new(scale: Tensor, shift: Tensor) -> Result<Self> {
        if scale.size() != shift.size() {
            return Err(NormCheckError::ShapeMismatch {
                what: "affine shift",
                expected: scale.size(),
                found: shift.size(),
            });
        }
        Ok(Self { scale, shift })
    }

    /// gamma = 1, beta = 0
    pub fn identity(shape: &[i64], options: (Kind, Device)) -> Self {
        Self {
            scale: Tensor::ones(shape, options),
            shift: Tensor::zeros(shape, options),
        }
    }

    /// Random gamma around 1 and beta around 0, so a wrong broadcast shows up in the checks
    pub fn random(shape: &[i64], options: (Kind, Device)) -> Self {
        Self {
            scale: Tensor::randn(shape, options) * 0.5 + 1.0,
            shift: Tensor::randn(shape, options) * 0.5,
        }
    }

    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    pub fn shift(&self) -> &Tensor {
        &self.shift
    }

    pub fn shape(&self) -> Vec<i64> {
        self.scale.size()
    }

    pub(crate) fn expect_shape(&self, what: &'static str, expected: &[i64]) -> Result<()> {
        let found = self.shape();
        if found != expected {
            return Err(NormCheckError::ShapeMismatch {
                what,
                expected: expected.to_vec(),
                found,
            });
        }
        Ok(())
    }

    /// `y * scale + shift` with the parameters viewed as `view`
    pub(crate) fn apply(&self, y: &Tensor, view: &[i64]) -> Tensor {
        y * self.scale.view(view) + self.shift.view(view)
    }
}

/// Rejects tensors with a zero-size dimension; their statistics are undefined.
pub(crate) fn expect_non_empty(x: &Tensor, what: &'static str) -> Result<()> {
    if x.numel() == 0 {
        return Err(NormCheckError::EmptyTensor {
            what,
            shape: x.size(),
        });
    }
    Ok(())
}

/// Computes the mean and the population (divide-by-N) variance over `axes`
pub fn moments(x: &Tensor, axes: &ReductionAxes) -> Result<Moments> {
    expect_non_empty(x, "moments")?;
    let dims = axes.resolve(x.dim())?;
    let mean = x.mean_dim(dims.as_slice(), true, x.kind());
    let var = (x - &mean).square().mean_dim(dims.as_slice(), true, x.kind());
    Ok(Moments { mean, var })
}

/// Normalizes `x` over `axes`, then applies the optional affine transform.
///
/// The affine parameters must have the shape of the non-reduced dimensions,
/// in order: `(C,)` for axes `(0, 2, 3)` of an `(N, C, H, W)` tensor.
pub fn normalize(
    x: &Tensor,
    axes: &ReductionAxes,
    eps: f64,
    affine: Option<&Affine>,
) -> Result<Tensor> {
    let stats = moments(x, axes)?;
    let y = stats.standardize(x, eps);

    let Some(affine) = affine else {
        return Ok(y);
    };

    let sizes = x.size();
    let kept = axes.complement(sizes.len())?;
    let expected: Vec<i64> = kept.iter().map(|&d| sizes[d as usize]).collect();
    affine.expect_shape("affine parameters", &expected)?;

    let view: Vec<i64> = (0..sizes.len() as i64)
        .map(|d| if kept.contains(&d) { sizes[d as usize] } else { 1 })
        .collect();
    log::debug!(
        "normalize: shape={:?} axes={:?} affine view={:?}",
        sizes,
        axes.as_slice(),
        view
    );
    Ok(affine.apply(&y, &view))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tch::{Device, Kind, Tensor};

    use super::*;

    const OPTS: (Kind, Device) = (Kind::Double, Device::Cpu);

    #[test]
    fn test_per_channel_moments_shape() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS);
        let stats = moments(&x, &ReductionAxes::new([0, 2, 3])).unwrap();

        assert_eq!(stats.mean.size(), vec![1, 3, 1, 1]);
        assert_eq!(stats.mean.view([-1]).size(), vec![3]);
        assert_eq!(stats.var.size(), vec![1, 3, 1, 1]);
    }

    #[test]
    fn test_variance_is_biased() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS);
        let stats = moments(&x, &ReductionAxes::new([0, 2, 3])).unwrap();
        let biased = x.var_dim(&[0i64, 2, 3][..], false, true);

        assert!(stats.var.allclose(&biased, 1e-10, 1e-12, false));
    }

    #[test]
    fn test_output_is_standardized() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS) * 3.0 + 7.0;
        let axes = ReductionAxes::new([0, 2, 3]);
        let y = normalize(&x, &axes, 0.0, None).unwrap();

        assert_eq!(y.size(), vec![2, 3, 4, 4]);
        let out = moments(&y, &axes).unwrap();
        assert!(out.mean.abs().max().double_value(&[]) < 1e-5);
        assert!((out.var - 1.0).abs().max().double_value(&[]) < 1e-5);
    }

    #[test]
    fn test_variance_shrinks_by_eps() {
        let x = Tensor::randn([4, 10], OPTS);
        let axes = ReductionAxes::new([-1]);
        let eps = 1e-2;
        let before = moments(&x, &axes).unwrap();
        let after = moments(&normalize(&x, &axes, eps, None).unwrap(), &axes).unwrap();

        let expected = &before.var / (&before.var + eps);
        assert!(after.var.allclose(&expected, 1e-9, 1e-12, false));
    }

    #[test]
    fn test_affine_broadcasts_along_kept_dims() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS);
        let axes = ReductionAxes::new([0, 2, 3]);
        let affine = Affine::new(
            Tensor::from_slice(&[1.0f64, 2.0, 3.0]),
            Tensor::from_slice(&[0.0f64, -1.0, 5.0]),
        )
        .unwrap();

        let plain = normalize(&x, &axes, DEFAULT_EPS, None).unwrap();
        let y = normalize(&x, &axes, DEFAULT_EPS, Some(&affine)).unwrap();

        let out = moments(&y, &axes).unwrap();
        let mean = Vec::<f64>::try_from(out.mean.view([-1])).unwrap();
        assert!((mean[0] - 0.0).abs() < 1e-9);
        assert!((mean[1] + 1.0).abs() < 1e-9);
        assert!((mean[2] - 5.0).abs() < 1e-9);
        assert!(y.allclose(
            &(&plain * affine.scale().view([1, 3, 1, 1]) + affine.shift().view([1, 3, 1, 1])),
            1e-12,
            1e-12,
            false
        ));
    }

    #[test]
    fn test_affine_shape_mismatch() {
        let x = Tensor::randn([2, 3, 4, 4], OPTS);
        let affine = Affine::identity(&[4], OPTS);

        assert_matches!(
            normalize(&x, &ReductionAxes::new([0, 2, 3]), DEFAULT_EPS, Some(&affine)),
            Err(NormCheckError::ShapeMismatch { expected, found, .. })
                if expected == vec![3] && found == vec![4]
        );
        assert_matches!(
            Affine::new(Tensor::ones([3], OPTS), Tensor::zeros([2], OPTS)),
            Err(NormCheckError::ShapeMismatch { what: "affine shift", .. })
        );
    }

    #[test]
    fn test_empty_tensor_rejected() {
        let x = Tensor::zeros([0, 3], OPTS);
        assert_matches!(
            normalize(&x, &ReductionAxes::new([0]), DEFAULT_EPS, None),
            Err(NormCheckError::EmptyTensor { what: "moments", shape }) if shape == vec![0, 3]
        );
    }

    #[test]
    fn test_bad_axes_propagate() {
        let x = Tensor::randn([2, 3], OPTS);
        assert_matches!(
            normalize(&x, &ReductionAxes::new([2]), DEFAULT_EPS, None),
            Err(NormCheckError::AxisOutOfRange { axis: 2, rank: 2 })
        );
    }
}
