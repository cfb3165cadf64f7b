//! Weighted distortion between an original example and a candidate
use crate::error::{AttackError, Result};
use crate::AdvFloat;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

pub trait DistortionNorm {
    /// Distance between `original` and `perturbed`, `>= 0` and `0` when they are equal.
    ///
    /// # Errors
    /// On a length mismatch between the two vectors and the norm's weights
    fn norm(
        &self,
        original: ArrayView1<AdvFloat>,
        perturbed: ArrayView1<AdvFloat>,
    ) -> Result<AdvFloat>;

    /// Norm of every row of `perturbed` against `original`
    ///
    /// # Errors
    /// On a length mismatch
    fn norm_batch(
        &self,
        original: ArrayView1<AdvFloat>,
        perturbed: ArrayView2<AdvFloat>,
    ) -> Result<Array1<AdvFloat>> {
        perturbed
            .axis_iter(Axis(0))
            .map(|row| self.norm(original, row))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum NormType {
    L1,
    L2,
    LInf,
}

/// p-norm whose per-feature terms are scaled by checkability and importance.
///
/// The weight of feature `i` is `check_i^beta * importance_i^alpha`. A checkability of
/// 0 lets the feature change for free, 1 penalizes it fully.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CheckAndImportanceNorm {
    weights: Array1<AdvFloat>,
    norm_type: NormType,
}

impl CheckAndImportanceNorm {
    /// # Errors
    /// If the vectors differ in length, a checkability lies outside `[0, 1]`, or an
    /// importance is negative or not finite
    pub fn new(
        check: ArrayView1<AdvFloat>,
        importance: ArrayView1<AdvFloat>,
        alpha: AdvFloat,
        beta: AdvFloat,
        norm_type: NormType,
    ) -> Result<Self> {
        if check.len() != importance.len() {
            return Err(AttackError::shape_mismatch(&[check.len()], &[importance.len()]));
        }
        if !check.iter().all(|c| (0. ..=1.).contains(c)) {
            return Err(AttackError::InvalidConfig(
                "checkability weights must lie in [0, 1]".to_string(),
            ));
        }
        if !importance.iter().all(|&w| w.is_finite() && w >= 0.) {
            return Err(AttackError::InvalidConfig(
                "importance weights must be finite and non-negative".to_string(),
            ));
        }
        let weights = Zip::from(&check)
            .and(&importance)
            .map_collect(|&c, &w| c.powf(beta) * w.powf(alpha));
        Ok(Self { weights, norm_type })
    }

    /// Unweighted p-norm over `dim` features
    pub fn uniform(dim: usize, norm_type: NormType) -> Self {
        Self {
            weights: Array1::ones(dim),
            norm_type,
        }
    }

    pub fn weights(&self) -> ArrayView1<AdvFloat> {
        self.weights.view()
    }

    pub const fn norm_type(&self) -> NormType {
        self.norm_type
    }
}

impl DistortionNorm for CheckAndImportanceNorm {
    fn norm(
        &self,
        original: ArrayView1<AdvFloat>,
        perturbed: ArrayView1<AdvFloat>,
    ) -> Result<AdvFloat> {
        if original.len() != self.weights.len() || perturbed.len() != self.weights.len() {
            return Err(AttackError::shape_mismatch(
                &[self.weights.len()],
                &[original.len(), perturbed.len()],
            ));
        }
        let terms = Zip::from(&original)
            .and(&perturbed)
            .and(&self.weights)
            .map_collect(|&x, &y, &w| (w, (y - x).abs()));
        Ok(match self.norm_type {
            NormType::L1 => terms.iter().map(|&(w, d)| w * d).sum(),
            NormType::L2 => terms.iter().map(|&(w, d)| w * d * d).sum::<AdvFloat>().sqrt(),
            NormType::LInf => terms.iter().map(|&(w, d)| w * d).fold(0., AdvFloat::max),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn weighted(norm_type: NormType) -> CheckAndImportanceNorm {
        CheckAndImportanceNorm::new(
            array![1., 0., 1.].view(),
            array![2., 5., 1.].view(),
            1.,
            1.,
            norm_type,
        )
        .unwrap()
    }

    #[test]
    fn unchecked_features_are_free() {
        let norm = weighted(NormType::L1);
        let x = array![0., 0., 0.];
        assert_eq!(norm.norm(x.view(), array![0., 100., 0.].view()).unwrap(), 0.);
        assert_eq!(norm.norm(x.view(), array![1., 100., -3.].view()).unwrap(), 5.);
    }

    #[test]
    fn norm_types() {
        let x = array![0., 0., 0.];
        let y = array![1., 7., -2.];
        assert_eq!(weighted(NormType::L1).norm(x.view(), y.view()).unwrap(), 4.);
        assert_eq!(weighted(NormType::L2).norm(x.view(), y.view()).unwrap(), 6f64.sqrt());
        assert_eq!(weighted(NormType::LInf).norm(x.view(), y.view()).unwrap(), 2.);
    }

    #[test]
    fn rejects_bad_weights() {
        let ones = array![1., 1.];
        assert!(CheckAndImportanceNorm::new(array![1.5, 0.].view(), ones.view(), 1., 1., NormType::L2).is_err());
        assert!(CheckAndImportanceNorm::new(ones.view(), array![-1., 0.].view(), 1., 1., NormType::L2).is_err());
        assert!(CheckAndImportanceNorm::new(ones.view(), array![1.].view(), 1., 1., NormType::L2).is_err());
    }

    #[test]
    fn rejects_length_mismatch() {
        let norm = CheckAndImportanceNorm::uniform(2, NormType::L2);
        assert!(norm.norm(array![0., 0.].view(), array![0.].view()).is_err());
    }

    #[test]
    fn norm_batch_scores_each_row() {
        let norm = CheckAndImportanceNorm::uniform(2, NormType::L1);
        let out = norm
            .norm_batch(array![0., 0.].view(), array![[1., 1.], [0., -3.]].view())
            .unwrap();
        assert_eq!(out, array![2., 3.]);
    }

    proptest! {
        #[test]
        fn norm_of_self_is_zero(x in array1(8)) {
            for norm_type in [NormType::L1, NormType::L2, NormType::LInf] {
                let norm = CheckAndImportanceNorm::uniform(8, norm_type);
                prop_assert_eq!(norm.norm(x.view(), x.view()).unwrap(), 0.);
            }
        }

        #[test]
        fn norm_is_monotone_per_feature(
            x in array1(6),
            y in array1(6),
            idx in 0_usize..6,
            grow in 0. .. 5.,
        ) {
            let check = Array1::from_elem(6, 0.5);
            let importance = Array1::from_elem(6, 2.);
            for norm_type in [NormType::L1, NormType::L2, NormType::LInf] {
                let norm = CheckAndImportanceNorm::new(check.view(), importance.view(), 1., 1., norm_type).unwrap();
                let mut further = y.clone();
                let d = y[idx] - x[idx];
                further[idx] = x[idx] + d + d.signum() * grow;
                let near = norm.norm(x.view(), y.view()).unwrap();
                let far = norm.norm(x.view(), further.view()).unwrap();
                prop_assert!(far >= near - 1e-9, "{} < {}", far, near);
            }
        }
    }
}
