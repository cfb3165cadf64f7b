//! Conversion between the encoded space the model consumes and the space the search runs in
use crate::bounds::Bounds1;
use crate::error::{AttackError, Result};
use crate::model::Classifier;
use crate::AdvFloat;
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// Rescales every feature from its fitted `[min, max]` range onto `[0, 1]`
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MinMaxScaler {
    bounds: Bounds1,
}

impl MinMaxScaler {
    pub const fn new(bounds: Bounds1) -> Self {
        Self { bounds }
    }

    /// Fits the feature ranges on the rows of `data`
    ///
    /// # Errors
    /// If `data` has no rows
    pub fn fit(data: ArrayView2<AdvFloat>) -> Result<Self> {
        Ok(Self::new(Bounds1::from_rows(data)?))
    }

    pub const fn bounds(&self) -> &Bounds1 {
        &self.bounds
    }

    /// Features with a zero-width range map to 0.
    ///
    /// # Errors
    /// If `x` has a different number of features than the scaler was fitted on
    pub fn transform(&self, x: ArrayView1<AdvFloat>) -> Result<Array1<AdvFloat>> {
        self.check_len(x.len())?;
        Ok(Zip::from(&x)
            .and(self.bounds.bounds_iter())
            .map_collect(|&x, range| {
                let span = range[1] - range[0];
                if span > 0. {
                    (x - range[0]) / span
                } else {
                    0.
                }
            }))
    }

    /// # Errors
    /// If `x` has a different number of features than the scaler was fitted on
    pub fn inverse_transform(&self, x: ArrayView1<AdvFloat>) -> Result<Array1<AdvFloat>> {
        self.check_len(x.len())?;
        Ok(Zip::from(&x)
            .and(self.bounds.bounds_iter())
            .map_collect(|&x, range| range[0] + x * (range[1] - range[0])))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len == self.bounds.ndim() {
            Ok(())
        } else {
            Err(AttackError::shape_mismatch(&[self.bounds.ndim()], &[len]))
        }
    }
}

/// Maps candidates between model space and search space.
///
/// Without a scaler the two spaces coincide.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DataProcessor {
    scaler: Option<MinMaxScaler>,
}

impl DataProcessor {
    pub const fn new(scaler: Option<MinMaxScaler>) -> Self {
        Self { scaler }
    }

    pub const fn scaler(&self) -> Option<&MinMaxScaler> {
        self.scaler.as_ref()
    }

    /// # Errors
    /// On a feature count mismatch with the scaler
    pub fn to_search_space(&self, x: ArrayView1<AdvFloat>) -> Result<Array1<AdvFloat>> {
        match &self.scaler {
            Some(scaler) => scaler.transform(x),
            None => Ok(x.to_owned()),
        }
    }

    /// # Errors
    /// On a feature count mismatch with the scaler
    pub fn to_model_space(&self, z: ArrayView1<AdvFloat>) -> Result<Array1<AdvFloat>> {
        match &self.scaler {
            Some(scaler) => scaler.inverse_transform(z),
            None => Ok(z.to_owned()),
        }
    }

    /// Valid box for search-space candidates of `nb_features` features
    pub fn search_bounds<M: Classifier + ?Sized>(&self, model: &M, nb_features: usize) -> Bounds1 {
        match &self.scaler {
            Some(_) => Bounds1::uniform(nb_features, 0., 1.),
            None => {
                let (min, max) = model.bounds();
                Bounds1::uniform(nb_features, min, max)
            }
        }
    }
}
