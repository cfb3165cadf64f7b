use crate::error::{AttackError, Result};
use crate::AdvFloat;
use ndarray::iter::Lanes;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::Ix1;
use ndarray::Zip;
use ndarray::{stack, ArrayView};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Axis-aligned box over a feature vector. Row 0 holds the lower bounds, row 1 the upper.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Bounds1 {
    data: Array2<AdvFloat>,
}

impl Bounds1 {
    /// # Errors
    /// If the lengths differ or any lower bound exceeds its upper bound
    pub fn new<'a>(
        lower: ArrayView1<'a, AdvFloat>,
        upper: ArrayView1<'a, AdvFloat>,
    ) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(AttackError::shape_mismatch(&[lower.len()], &[upper.len()]));
        }
        if !Zip::from(&lower).and(&upper).all(|&l, &u| l <= u) {
            return Err(AttackError::InvalidConfig(
                "lower bound exceeds upper bound".to_string(),
            ));
        }
        let data = stack(Axis(0), &[lower, upper])?;
        Ok(Self { data })
    }

    /// Same `[min, max]` range for every one of `dim` features
    pub fn uniform(dim: usize, min: AdvFloat, max: AdvFloat) -> Self {
        let mut data = Array2::from_elem([2, dim], min);
        data.index_axis_mut(Axis(0), 1).fill(max);
        Self { data }
    }

    /// Column-wise minimum and maximum over the rows of `data`.
    ///
    /// # Errors
    /// If `data` has no rows
    pub fn from_rows(data: ArrayView2<AdvFloat>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(AttackError::InvalidConfig(
                "cannot fit bounds on an empty data matrix".to_string(),
            ));
        }
        let lower = data.fold_axis(Axis(0), AdvFloat::INFINITY, |&acc, &x| acc.min(x));
        let upper = data.fold_axis(Axis(0), AdvFloat::NEG_INFINITY, |&acc, &x| acc.max(x));
        Self::new(lower.view(), upper.view())
    }

    pub fn lower(&self) -> ArrayView1<AdvFloat> {
        self.data.index_axis(Axis(0), 0)
    }

    pub fn upper(&self) -> ArrayView1<AdvFloat> {
        self.data.index_axis(Axis(0), 1)
    }

    pub fn ndim(&self) -> usize {
        self.data.ncols()
    }

    pub fn bounds_iter(&self) -> Lanes<AdvFloat, Ix1> {
        self.data.lanes(Axis(0))
    }

    pub fn is_member(&self, x: &ArrayView<AdvFloat, Ix1>) -> bool {
        let eps = 1e-5;
        x.len() == self.ndim()
            && Zip::from(x)
                .and(self.bounds_iter())
                .all(|&x, bounds| bounds[0] - eps <= x && x <= bounds[1] + eps)
    }

    /// Clamps a single feature value into its range
    pub fn clip_value(&self, idx: usize, x: AdvFloat) -> AdvFloat {
        x.max(self.data[[0, idx]]).min(self.data[[1, idx]])
    }

    #[cfg(test)]
    pub fn sample_uniform(&self, seed: u64) -> Array1<AdvFloat> {
        use rand::distributions::{Distribution, Uniform};
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(seed);
        Zip::from(self.bounds_iter())
            .map_collect(|x| Uniform::new_inclusive(x[0], x[1]).sample(&mut rng))
    }
}

impl Display for Bounds1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "Lower: {}\nUpper: {}", self.lower(), self.upper())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn from_rows_takes_columnwise_extremes() {
        let data = array![[0., 5., -1.], [2., 3., -1.], [1., 4., -1.]];
        let bounds = Bounds1::from_rows(data.view()).unwrap();
        assert_eq!(bounds.lower(), array![0., 3., -1.]);
        assert_eq!(bounds.upper(), array![2., 5., -1.]);
    }

    #[test]
    fn new_rejects_inverted_bounds() {
        assert!(Bounds1::new(array![1.].view(), array![0.].view()).is_err());
        assert!(Bounds1::new(array![0.].view(), array![1., 2.].view()).is_err());
    }

    proptest! {
        #[test]
        fn test_bounds_sample_uniform(bounds in bounds1(32)) {
            let sample = bounds.sample_uniform(0_u64);
            prop_assert!(bounds.is_member(&sample.view()));
        }

        #[test]
        fn test_clip_value_lands_inside(bounds in bounds1(8), x in array1(8)) {
            let clipped: Array1<AdvFloat> = x
                .iter()
                .enumerate()
                .map(|(idx, &v)| bounds.clip_value(idx, v))
                .collect();
            prop_assert!(bounds.is_member(&clipped.view()));
        }
    }
}
