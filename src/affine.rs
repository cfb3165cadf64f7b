//! Representation of affine transformations
use crate::error::{AttackError, Result};
use crate::AdvFloat;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Affine map `f(x) = Ax + b`
///
/// Shapes
/// basis - \[output_dim, input_dim\]
/// shift - \[output_dim\]
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Affine2 {
    basis: Array2<AdvFloat>,
    shift: Array1<AdvFloat>,
}

impl Display for Affine2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(
            f,
            "Basis {:?} Shift {:?}",
            self.basis.shape(),
            self.shift.shape()
        )
    }
}

impl Affine2 {
    /// # Errors
    /// If the basis has a different number of rows than the shift has entries
    pub fn new(basis: Array2<AdvFloat>, shift: Array1<AdvFloat>) -> Result<Self> {
        if basis.nrows() != shift.len() {
            return Err(AttackError::shape_mismatch(
                &[basis.nrows()],
                &[shift.len()],
            ));
        }
        Ok(Self { basis, shift })
    }

    pub fn identity(ndim: usize) -> Self {
        Self {
            basis: Array2::eye(ndim),
            shift: Array1::zeros(ndim),
        }
    }

    pub fn basis(&self) -> ArrayView2<AdvFloat> {
        self.basis.view()
    }

    pub fn shift(&self) -> ArrayView1<AdvFloat> {
        self.shift.view()
    }

    pub fn input_dim(&self) -> usize {
        self.basis.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.shift.len()
    }

    pub fn apply(&self, x: &ArrayView1<AdvFloat>) -> Array1<AdvFloat> {
        debug_assert_eq!(x.len(), self.input_dim());
        self.basis.dot(x) + &self.shift
    }

    /// Applies the map to every row of `x` (\[batch, input_dim\] -> \[batch, output_dim\])
    pub fn apply_matrix(&self, x: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        debug_assert_eq!(x.ncols(), self.input_dim());
        x.dot(&self.basis.t()) + &self.shift.view().insert_axis(Axis(0))
    }
}
