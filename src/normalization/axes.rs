//! Reduction axis sets for the normalization variants.

use crate::{NormCheckError, Result};

/// Dimensions over which mean and variance are computed.
///
/// Axes may be negative (counted from the end). They are only checked against
/// a concrete rank in [`ReductionAxes::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionAxes {
    axes: Vec<i64>,
}

impl ReductionAxes {
    pub fn new(axes: impl Into<Vec<i64>>) -> Self {
        Self { axes: axes.into() }
    }

    /// Batch normalization: every axis except the channel axis (1).
    pub fn batch(rank: usize) -> Self {
        let axes = (0..rank as i64).filter(|&d| d != 1).collect::<Vec<_>>();
        Self { axes }
    }

    /// Layer normalization: the `normalized_dims` trailing axes.
    pub fn layer(rank: usize, normalized_dims: usize) -> Self {
        let start = rank.saturating_sub(normalized_dims) as i64;
        Self {
            axes: (start..rank as i64).collect(),
        }
    }

    /// Instance normalization: the spatial axes `2..rank`.
    pub fn instance(rank: usize) -> Self {
        Self {
            axes: (2..rank as i64).collect(),
        }
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.axes
    }

    /// Maps every axis into `[0, rank)` and returns them sorted.
    pub fn resolve(&self, rank: usize) -> Result<Vec<i64>> {
        if self.axes.is_empty() {
            return Err(NormCheckError::EmptyAxes);
        }

        let mut resolved = Vec::with_capacity(self.axes.len());
        for &axis in &self.axes {
            let dim = if axis < 0 { axis + rank as i64 } else { axis };
            if dim < 0 || dim >= rank as i64 {
                return Err(NormCheckError::AxisOutOfRange { axis, rank });
            }
            if resolved.contains(&dim) {
                return Err(NormCheckError::DuplicateAxis(axis));
            }
            resolved.push(dim);
        }
        resolved.sort_unstable();
        Ok(resolved)
    }

    /// The dimensions left untouched by the reduction, in order.
    pub fn complement(&self, rank: usize) -> Result<Vec<i64>> {
        let reduced = self.resolve(rank)?;
        Ok((0..rank as i64).filter(|d| !reduced.contains(d)).collect())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_variant_axes() {
        assert_eq!(ReductionAxes::batch(4).as_slice(), &[0, 2, 3]);
        assert_eq!(ReductionAxes::batch(2).as_slice(), &[0]);
        assert_eq!(ReductionAxes::layer(3, 1).as_slice(), &[2]);
        assert_eq!(ReductionAxes::layer(4, 3).as_slice(), &[1, 2, 3]);
        assert_eq!(ReductionAxes::instance(4).as_slice(), &[2, 3]);
    }

    #[test]
    fn test_resolve_negative_axes() {
        let axes = ReductionAxes::new([-1, 0, -2]);
        assert_eq!(axes.resolve(4).unwrap(), vec![0, 2, 3]);
        assert_eq!(axes.complement(4).unwrap(), vec![1]);
    }

    #[test]
    fn test_resolve_rejects_bad_axes() {
        assert_matches!(
            ReductionAxes::new([0, 4]).resolve(4),
            Err(NormCheckError::AxisOutOfRange { axis: 4, rank: 4 })
        );
        assert_matches!(
            ReductionAxes::new([-5]).resolve(4),
            Err(NormCheckError::AxisOutOfRange { axis: -5, .. })
        );
        assert_matches!(
            ReductionAxes::new([1, -3]).resolve(4),
            Err(NormCheckError::DuplicateAxis(-3))
        );
        assert_matches!(
            ReductionAxes::new(Vec::<i64>::new()).resolve(4),
            Err(NormCheckError::EmptyAxes)
        );
    }
}
