//! Exhaustive single-position sweep over an image
use crate::adversary::Adversary;
use crate::error::{AttackError, Result};
use crate::model::Classifier;
use crate::observer::{AttackObserver, TrialEvent};
use crate::util::argmax;
use crate::AdvFloat;
use log::{debug, info};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SinglePixelConfig {
    /// Number of trial values for pre-normalized input
    pub sweep_steps: usize,
    /// Emit a `PixelTrial` event every this many positions, 0 disables them
    pub log_interval: usize,
    pub support_targeted: bool,
}

impl Default for SinglePixelConfig {
    fn default() -> Self {
        Self {
            sweep_steps: 256,
            log_interval: 50,
            support_targeted: true,
        }
    }
}

/// Sets every channel of one spatial position to a trial value and keeps the first
/// trial whose label satisfies the attack goal.
///
/// No refinement happens after a success: the first hit in permutation order wins.
pub struct SinglePixelAttack<'a, M: Classifier + ?Sized> {
    model: &'a M,
    config: SinglePixelConfig,
}

impl<'a, M: Classifier + ?Sized> SinglePixelAttack<'a, M> {
    pub const fn new(model: &'a M, config: SinglePixelConfig) -> Self {
        Self { model, config }
    }

    pub const fn config(&self) -> &SinglePixelConfig {
        &self.config
    }

    /// Runs the sweep over at most `max_pixels` positions.
    ///
    /// Raw input is tried at the two ends of the model's range; normalized input at
    /// `sweep_steps` evenly spaced values across it. The returned adversary is
    /// failure-flagged if no trial succeeded.
    ///
    /// # Errors
    /// * `TargetedNotSupported` for a targeted adversary when the attack is
    ///   configured without targeted support
    /// * `ShapeMismatch` unless the example has exactly two non-channel axes
    /// * `InvalidConfig` for fewer than two sweep steps
    /// * model errors, propagated unchanged
    pub fn apply<R, O>(
        &self,
        mut adversary: Adversary<IxDyn>,
        max_pixels: usize,
        input_is_normalized: bool,
        rng: &mut R,
        observer: &mut O,
    ) -> Result<Adversary<IxDyn>>
    where
        R: Rng + ?Sized,
        O: AttackObserver + ?Sized,
    {
        if adversary.is_targeted_attack() && !self.config.support_targeted {
            return Err(AttackError::TargetedNotSupported {
                attack: "single pixel",
            });
        }
        let shape = adversary.original().shape().to_vec();
        let channel_axis = self.model.input_channel_axis();
        let axes: Vec<usize> = (0..shape.len()).filter(|&a| a != channel_axis).collect();
        if axes.len() != 2 {
            return Err(AttackError::ShapeMismatch {
                expected: vec![2],
                got: axes.iter().map(|&a| shape[a]).collect(),
            });
        }
        let (h, w) = (shape[axes[0]], shape[axes[1]]);

        let (min, max) = self.model.bounds();
        let values = if input_is_normalized {
            if self.config.sweep_steps < 2 {
                return Err(AttackError::InvalidConfig(format!(
                    "sweep_steps must be at least 2, got {}",
                    self.config.sweep_steps
                )));
            }
            Array1::linspace(min, max, self.config.sweep_steps)
        } else {
            Array1::from(vec![min, max])
        };

        let mut positions: Vec<usize> = (0..h * w).collect();
        positions.shuffle(rng);
        positions.truncate(max_pixels);
        info!(
            "Single pixel sweep over {} of {} positions with {} values each",
            positions.len(),
            h * w,
            values.len()
        );

        for (trial, &p) in positions.iter().enumerate() {
            let (row, col) = (p / w, p % w);
            if self.config.log_interval > 0 && trial % self.config.log_interval == 0 {
                observer.observe(&TrialEvent::PixelTrial { trial, row, col });
            }
            for &value in &values {
                let mut candidate = adversary.original().to_owned();
                set_position(&mut candidate, &axes, row, col, value);
                let scores = self.model.predict_one(candidate.view())?;
                if scores.iter().any(|s| s.is_nan()) {
                    debug!("NaN scores at ({}, {}) = {}, skipping", row, col, value);
                    continue;
                }
                let label = match argmax(scores.view()) {
                    Some(label) => label,
                    None => continue,
                };
                if adversary.try_accept_the_example(candidate, label)? {
                    info!(
                        "Label {} reached at ({}, {}) = {} after {} positions",
                        label,
                        row,
                        col,
                        value,
                        trial + 1
                    );
                    return Ok(adversary);
                }
            }
        }
        info!("No adversarial example found");
        Ok(adversary)
    }
}

/// Writes `value` into every channel at `(row, col)`.
///
/// `axes` holds the two spatial axes in ascending order.
fn set_position(
    example: &mut ArrayD<AdvFloat>,
    axes: &[usize],
    row: usize,
    col: usize,
    value: AdvFloat,
) {
    example
        .index_axis_mut(Axis(axes[0]), row)
        .index_axis_mut(Axis(axes[1] - 1), col)
        .fill(value);
}
