//! Repairs candidates so they stay inside the encoded input domain
use crate::encoding::{FieldMetadata, FieldSpec, FieldType};
use crate::error::{AttackError, Result};
use crate::util::argmax;
use crate::AdvFloat;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Applies the per-field validity rules of a [`FieldMetadata`].
///
/// Correcting an already corrected vector leaves it unchanged.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DataCorrector {
    metadata: FieldMetadata,
}

impl DataCorrector {
    pub const fn new(metadata: FieldMetadata) -> Self {
        Self { metadata }
    }

    pub const fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    /// # Errors
    /// If `v` doesn't have one entry per encoded feature
    pub fn correct(&self, v: ArrayView1<AdvFloat>) -> Result<Array1<AdvFloat>> {
        if v.len() != self.metadata.nb_features() {
            return Err(AttackError::shape_mismatch(
                &[self.metadata.nb_features()],
                &[v.len()],
            ));
        }
        let mut out = v.to_owned();
        for field in self.metadata.fields() {
            correct_field(field, out.slice_mut(s![field.positions.clone()]));
        }
        Ok(out)
    }

    /// Corrects every row of `batch`
    ///
    /// # Errors
    /// If the rows don't have one entry per encoded feature
    pub fn correct_batch(&self, batch: ArrayView2<AdvFloat>) -> Result<Array2<AdvFloat>> {
        let mut out = batch.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let corrected = self.correct(row.view())?;
            row.assign(&corrected);
        }
        Ok(out)
    }
}

fn correct_field(field: &FieldSpec, mut values: ArrayViewMut1<AdvFloat>) {
    match field.field_type {
        FieldType::OneHot => {
            let hot = argmax(values.view()).unwrap_or(0);
            values.fill(0.);
            values[hot] = 1.;
        }
        ty => {
            let floor = ty.floor().unwrap_or(AdvFloat::NEG_INFINITY);
            let ceil = match (ty.is_integral(), field.max) {
                (true, Some(max)) => max.floor(),
                (false, Some(max)) => max,
                (_, None) => AdvFloat::INFINITY,
            };
            Zip::from(values).for_each(|x| {
                let rounded = if ty.is_integral() { x.round() } else { *x };
                *x = rounded.max(floor).min(ceil);
            });
        }
    }
}
