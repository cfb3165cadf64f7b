//! Query interface of the victim model
use crate::affine::Affine2;
use crate::error::{AttackError, Result};
use crate::util::argmax;
use crate::AdvFloat;
use ndarray::{Array1, Array2, ArrayViewD, Axis};
use serde::{Deserialize, Serialize};

/// Black-box classifier.
///
/// Implementations must be deterministic: identical batches produce identical
/// scores. The attacks rely on repeatable answers to tiny perturbations.
pub trait Classifier {
    /// Declared `(min, max)` range of every input value
    fn bounds(&self) -> (AdvFloat, AdvFloat);

    /// Channel axis of a single example (the batch axis is not counted)
    fn input_channel_axis(&self) -> usize;

    fn nb_classes(&self) -> usize;

    /// Scores a batch whose axis 0 indexes examples. Returns `[batch, nb_classes]`.
    ///
    /// # Errors
    /// Model failures are propagated as-is and never retried
    fn predict(&self, batch: ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>>;

    /// Whether `predict` may be called from several threads at once
    fn supports_concurrent_queries(&self) -> bool {
        false
    }

    /// Scores a single example.
    ///
    /// # Errors
    /// If the model fails or doesn't answer with exactly one row of `nb_classes` scores
    fn predict_one(&self, example: ArrayViewD<AdvFloat>) -> Result<Array1<AdvFloat>> {
        let scores = self.predict(example.insert_axis(Axis(0)))?;
        check_scores_shape(&scores, 1, self.nb_classes())?;
        Ok(scores.index_axis_move(Axis(0), 0))
    }

    /// Argmax label of a single example, ties broken towards the lowest class index.
    ///
    /// # Errors
    /// If the model fails, answers with the wrong shape or returns only NaN scores
    fn predict_label(&self, example: ArrayViewD<AdvFloat>) -> Result<usize> {
        let scores = self.predict_one(example)?;
        argmax(scores.view())
            .ok_or_else(|| AttackError::Model("model returned no finite scores".to_string()))
    }
}

/// # Errors
/// If `scores` isn't `[rows, nb_classes]`
pub fn check_scores_shape(scores: &Array2<AdvFloat>, rows: usize, nb_classes: usize) -> Result<()> {
    if scores.shape() == [rows, nb_classes] {
        Ok(())
    } else {
        Err(AttackError::shape_mismatch(
            &[rows, nb_classes],
            scores.shape(),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Postprocessing {
    /// Raw logits
    Identity,
    /// Row-wise softmax probabilities
    Softmax,
}

/// Classifier computing `W · flatten(x) + b` for every example of the batch
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AffineClassifier {
    affine: Affine2,
    bounds: (AdvFloat, AdvFloat),
    channel_axis: usize,
    postprocessing: Postprocessing,
}

impl AffineClassifier {
    pub const fn new(affine: Affine2, bounds: (AdvFloat, AdvFloat)) -> Self {
        Self {
            affine,
            bounds,
            channel_axis: 0,
            postprocessing: Postprocessing::Identity,
        }
    }

    #[must_use]
    pub fn with_channel_axis(mut self, channel_axis: usize) -> Self {
        self.channel_axis = channel_axis;
        self
    }

    #[must_use]
    pub fn with_postprocessing(mut self, postprocessing: Postprocessing) -> Self {
        self.postprocessing = postprocessing;
        self
    }

    pub const fn affine(&self) -> &Affine2 {
        &self.affine
    }
}

impl Classifier for AffineClassifier {
    fn bounds(&self) -> (AdvFloat, AdvFloat) {
        self.bounds
    }

    fn input_channel_axis(&self) -> usize {
        self.channel_axis
    }

    fn nb_classes(&self) -> usize {
        self.affine.output_dim()
    }

    fn predict(&self, batch: ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>> {
        let nb_examples = batch.shape().first().copied().unwrap_or(0);
        let example_len: usize = batch.shape().iter().skip(1).product();
        if batch.ndim() < 2 || example_len != self.affine.input_dim() {
            return Err(AttackError::shape_mismatch(
                &[nb_examples, self.affine.input_dim()],
                batch.shape(),
            ));
        }
        let flat = batch
            .as_standard_layout()
            .into_owned()
            .into_shape((nb_examples, example_len))?;
        let logits = self.affine.apply_matrix(&flat.view());
        Ok(match self.postprocessing {
            Postprocessing::Identity => logits,
            Postprocessing::Softmax => softmax_rows(logits),
        })
    }

    fn supports_concurrent_queries(&self) -> bool {
        true
    }
}

fn softmax_rows(mut logits: Array2<AdvFloat>) -> Array2<AdvFloat> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(AdvFloat::NEG_INFINITY, |acc, &x| acc.max(x));
        row.mapv_inplace(|x| (x - max).exp());
        let total = row.sum();
        row.mapv_inplace(|x| x / total);
    }
    logits
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn two_class() -> AffineClassifier {
        let affine = Affine2::new(array![[1., 0.], [0., 1.]], Array1::zeros(2)).unwrap();
        AffineClassifier::new(affine, (0., 1.))
    }

    #[test]
    fn predicts_every_row_of_a_batch() {
        let model = two_class();
        let batch = array![[0.9, 0.1], [0.2, 0.7]].into_dyn();
        let scores = model.predict(batch.view()).unwrap();
        assert_eq!(scores, array![[0.9, 0.1], [0.2, 0.7]]);
    }

    #[test]
    fn flattens_image_examples() {
        let affine = Affine2::new(array![[1., 1., 1., 1.], [0., 0., 0., 2.]], Array1::zeros(2))
            .unwrap();
        let model = AffineClassifier::new(affine, (0., 255.));
        let image = array![[[1., 2.], [3., 4.]]].into_dyn();
        let scores = model.predict_one(image.view()).unwrap();
        assert_eq!(scores, array![10., 8.]);
        assert_eq!(model.predict_label(image.view()).unwrap(), 0);
    }

    #[test]
    fn rejects_wrong_example_size() {
        let model = two_class();
        let batch = array![[0.9, 0.1, 0.3]].into_dyn();
        assert!(matches!(
            model.predict(batch.view()),
            Err(AttackError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let model = two_class().with_postprocessing(Postprocessing::Softmax);
        let scores = model.predict(array![[3., -1.]].into_dyn().view()).unwrap();
        assert!((scores.sum() - 1.).abs() < 1e-12);
        assert!(scores[[0, 0]] > scores[[0, 1]]);
    }
}
