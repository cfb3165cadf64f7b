//! Attack objective computed from model scores
use crate::error::{AttackError, Result};
use crate::util::max_excluding;
use crate::AdvFloat;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

pub trait AdversarialLoss {
    /// Attack loss for one score vector. The attack objective is met when the loss is `<= 0`.
    ///
    /// `target` selects the targeted form; `true_label` is the original class.
    ///
    /// # Errors
    /// If a label is out of range or there are fewer than two classes
    fn loss(
        &self,
        scores: ArrayView1<AdvFloat>,
        true_label: usize,
        target: Option<usize>,
    ) -> Result<AdvFloat>;

    /// # Errors
    /// See [`AdversarialLoss::loss`]
    fn loss_batch(
        &self,
        scores: ArrayView2<AdvFloat>,
        true_label: usize,
        target: Option<usize>,
    ) -> Result<Array1<AdvFloat>> {
        scores
            .axis_iter(Axis(0))
            .map(|row| self.loss(row, true_label, target))
            .collect()
    }
}

/// Carlini-Wagner style margin loss, floored at `-confidence`. Any NaN score
/// makes the loss NaN.
///
/// * untargeted: `s[true] - max_{k != true} s[k]`
/// * targeted: `max_{k != target} s[k] - s[target]`
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct CWLoss {
    pub confidence: AdvFloat,
}

impl CWLoss {
    pub const fn new(confidence: AdvFloat) -> Self {
        Self { confidence }
    }
}

impl AdversarialLoss for CWLoss {
    fn loss(
        &self,
        scores: ArrayView1<AdvFloat>,
        true_label: usize,
        target: Option<usize>,
    ) -> Result<AdvFloat> {
        let nb_classes = scores.len();
        if nb_classes < 2 {
            return Err(AttackError::shape_mismatch(&[2], &[nb_classes]));
        }
        let anchor = target.unwrap_or(true_label);
        for label in [true_label, anchor] {
            if label >= nb_classes {
                return Err(AttackError::LabelOutOfRange { label, nb_classes });
            }
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Ok(AdvFloat::NAN);
        }
        let runner_up = max_excluding(scores, anchor).unwrap_or(AdvFloat::NEG_INFINITY);
        let margin = match target {
            Some(target) => runner_up - scores[target],
            None => scores[true_label] - runner_up,
        };
        Ok(margin.max(-self.confidence))
    }
}
