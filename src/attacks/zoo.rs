//! Zeroth-order optimization attack for tabular classifiers
//!
//! The objective `norm + c * loss` is minimized by coordinate descent, with gradients
//! estimated from symmetric finite differences on a random subset of coordinates.
//! The trade-off constant `c` is tuned by a binary search across rounds: a round that
//! reaches the goal lowers it to favour smaller distortion, a failed one raises it.
use super::schedule::{ConstSchedule, ConstSearch};
use crate::bounds::Bounds1;
use crate::corrector::DataCorrector;
use crate::error::{AttackError, Result};
use crate::loss::AdversarialLoss;
use crate::model::{check_scores_shape, Classifier};
use crate::norm::DistortionNorm;
use crate::observer::{AttackObserver, TrialEvent};
use crate::processor::DataProcessor;
use crate::tracker::{AcceptPolicy, AttackGoal, BestRecord, Candidate, ResultTracker};
use crate::util::argmax;
use crate::AdvFloat;
use itertools::Itertools;
use log::{debug, info, trace, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Ix1};
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ZooConfig {
    /// `y` holds target labels instead of true labels
    pub targeted: bool,
    pub learning_rate: AdvFloat,
    /// Coordinate-descent iterations per binary-search round
    pub max_iter: usize,
    pub binary_search_steps: usize,
    pub initial_const: AdvFloat,
    /// Coordinates updated per iteration
    pub nb_parallel: usize,
    /// Finite-difference step
    pub variable_h: AdvFloat,
    pub schedule: ConstSchedule,
    /// Evaluate all probes of an iteration in one model call
    pub batch_queries: bool,
    /// Emit a `ZooIteration` event every this many iterations, 0 disables them
    pub log_interval: usize,
}

impl Default for ZooConfig {
    fn default() -> Self {
        Self {
            targeted: false,
            learning_rate: 1.,
            max_iter: 100,
            binary_search_steps: 1,
            initial_const: 1.,
            nb_parallel: 10,
            variable_h: 0.1,
            schedule: ConstSchedule::default(),
            batch_queries: true,
            log_interval: 50,
        }
    }
}

impl ZooConfig {
    /// # Errors
    /// On a non-positive step size, probe width, iteration or round count, or an
    /// invalid constant schedule
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: AdvFloat| {
            if value.is_finite() && value > 0. {
                Ok(())
            } else {
                Err(AttackError::InvalidConfig(format!(
                    "{} must be finite and > 0, got {}",
                    name, value
                )))
            }
        };
        positive("learning_rate", self.learning_rate)?;
        positive("variable_h", self.variable_h)?;
        positive("initial_const", self.initial_const)?;
        if self.nb_parallel == 0 || self.binary_search_steps == 0 {
            return Err(AttackError::InvalidConfig(
                "nb_parallel and binary_search_steps must be at least 1".to_string(),
            ));
        }
        self.schedule.validate()
    }
}

/// Per-example outcome of [`ZooAttack::generate`], indexed like the input rows.
///
/// Examples without any finite trial keep the original, an infinite distortion and
/// loss, and the original label.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ZooResult {
    pub best_distortion_norms: Array1<AdvFloat>,
    pub best_adversarial_losses: Array1<AdvFloat>,
    pub best_labels: Vec<usize>,
    /// Model-space examples, one row per input
    pub best_examples: Array2<AdvFloat>,
    pub success: Vec<bool>,
    /// `round_distortions[i][r]`: best successful distortion of example `i` after round `r`
    pub round_distortions: Vec<Vec<AdvFloat>>,
}

impl ZooResult {
    pub fn nb_successes(&self) -> usize {
        self.success.iter().filter(|&&s| s).count()
    }
}

/// A corrected, scored trial
struct Evaluation {
    example: Array1<AdvFloat>,
    label: usize,
    loss: AdvFloat,
    distortion: AdvFloat,
}

pub struct ZooAttack<'a, M: Classifier + ?Sized, N: DistortionNorm, L: AdversarialLoss> {
    model: &'a M,
    norm: N,
    loss: L,
    config: ZooConfig,
    processor: DataProcessor,
    corrector: Option<DataCorrector>,
    allowed: Option<Array1<bool>>,
}

impl<'a, M, N, L> ZooAttack<'a, M, N, L>
where
    M: Classifier + ?Sized,
    N: DistortionNorm,
    L: AdversarialLoss,
{
    pub fn new(model: &'a M, norm: N, loss: L, config: ZooConfig) -> Self {
        Self {
            model,
            norm,
            loss,
            config,
            processor: DataProcessor::default(),
            corrector: None,
            allowed: None,
        }
    }

    /// Search in the processor's space instead of model space
    #[must_use]
    pub fn with_processor(mut self, processor: DataProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Repair every evaluated candidate before it is scored
    #[must_use]
    pub fn with_corrector(mut self, corrector: DataCorrector) -> Self {
        self.corrector = Some(corrector);
        self
    }

    /// Only features whose mask entry is `true` are ever modified
    #[must_use]
    pub fn with_allowed(mut self, allowed: Array1<bool>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub const fn config(&self) -> &ZooConfig {
        &self.config
    }

    /// Attacks every row of `x`.
    ///
    /// `y` holds the target labels of a targeted attack (required), or the true
    /// labels of an untargeted one (the model's predictions when omitted). Failing
    /// to reach the goal is reported through `success`, never as an error.
    ///
    /// # Errors
    /// * `InvalidConfig` for invalid parameters, or a targeted attack without `y`
    /// * `ShapeMismatch` if `y`, the allowed mask, the norm or the corrector don't
    ///   match the feature count of `x`
    /// * `LabelOutOfRange` for a label outside the model's classes
    /// * model errors, propagated unchanged
    pub fn generate<R, O>(
        &self,
        x: ArrayView2<AdvFloat>,
        y: Option<&[usize]>,
        rng: &mut R,
        observer: &mut O,
    ) -> Result<ZooResult>
    where
        R: Rng + ?Sized,
        O: AttackObserver + ?Sized,
    {
        self.config.validate()?;
        let (nb_examples, nb_features) = x.dim();
        if self.config.targeted && y.is_none() {
            return Err(AttackError::InvalidConfig(
                "a targeted attack needs target labels".to_string(),
            ));
        }
        if let Some(y) = y {
            if y.len() != nb_examples {
                return Err(AttackError::shape_mismatch(&[nb_examples], &[y.len()]));
            }
        }
        let coords = self.allowed_coordinates(nb_features)?;
        let bounds = self.processor.search_bounds(self.model, nb_features);
        let nb_classes = self.model.nb_classes();

        let mut result = ZooResult {
            best_distortion_norms: Array1::from_elem(nb_examples, AdvFloat::INFINITY),
            best_adversarial_losses: Array1::from_elem(nb_examples, AdvFloat::INFINITY),
            best_labels: Vec::with_capacity(nb_examples),
            best_examples: x.to_owned(),
            success: Vec::with_capacity(nb_examples),
            round_distortions: Vec::with_capacity(nb_examples),
        };
        for (i, original) in x.axis_iter(Axis(0)).enumerate() {
            let predicted = self.model.predict_label(original.into_dyn())?;
            let goal = match (y.map(|y| y[i]), self.config.targeted) {
                (Some(target), true) => AttackGoal::targeted(predicted, target),
                (Some(label), false) => AttackGoal::untargeted(label),
                (None, _) => AttackGoal::untargeted(predicted),
            };
            for label in [Some(goal.original_label), goal.target_label].into_iter().flatten() {
                if label >= nb_classes {
                    return Err(AttackError::LabelOutOfRange { label, nb_classes });
                }
            }

            let (best, rounds) =
                self.attack_one(i, original, goal, &coords, &bounds, rng, observer)?;
            match best {
                Some(best) => {
                    result.best_distortion_norms[i] = best.distortion;
                    result.best_adversarial_losses[i] = best.loss.unwrap_or(AdvFloat::INFINITY);
                    result.best_labels.push(best.label);
                    result.best_examples.row_mut(i).assign(&best.example);
                    result.success.push(best.success);
                }
                None => {
                    result.best_labels.push(goal.original_label);
                    result.success.push(false);
                }
            }
            result.round_distortions.push(rounds);
        }
        info!(
            "ZOO attack reached the goal on {} of {} examples",
            result.nb_successes(),
            nb_examples
        );
        Ok(result)
    }

    fn allowed_coordinates(&self, nb_features: usize) -> Result<Vec<usize>> {
        match &self.allowed {
            Some(mask) if mask.len() != nb_features => {
                Err(AttackError::shape_mismatch(&[nb_features], &[mask.len()]))
            }
            Some(mask) => Ok(mask.iter().positions(|&allowed| allowed).collect()),
            None => Ok((0..nb_features).collect()),
        }
    }

    /// Binary search over the trade-off constant for a single example
    #[allow(clippy::too_many_arguments)]
    fn attack_one<R, O>(
        &self,
        example_idx: usize,
        original: ArrayView1<AdvFloat>,
        goal: AttackGoal,
        coords: &[usize],
        bounds: &Bounds1,
        rng: &mut R,
        observer: &mut O,
    ) -> Result<(Option<BestRecord<Ix1>>, Vec<AdvFloat>)>
    where
        R: Rng + ?Sized,
        O: AttackObserver + ?Sized,
    {
        let start = self.processor.to_search_space(original)?;
        if !bounds.is_member(&start.view()) {
            warn!(
                "Example {} lies outside the search bounds, probes are clipped to them",
                example_idx
            );
        }
        let mut tracker = ResultTracker::new(goal, AcceptPolicy::TrackFailures);
        let mut search = ConstSearch::new(self.config.schedule, self.config.initial_const)?;
        let mut round_distortions = Vec::with_capacity(self.config.binary_search_steps);
        let lr = self.config.learning_rate;

        for round in 0..self.config.binary_search_steps {
            let constant = search.current();
            let mut z = start.clone();
            let mut round_success = false;
            for iteration in 0..self.config.max_iter {
                if coords.is_empty() {
                    break;
                }
                let amount = self.config.nb_parallel.min(coords.len());
                let picked: Vec<usize> = index::sample(rng, coords.len(), amount)
                    .into_iter()
                    .map(|j| coords[j])
                    .collect();
                let grads =
                    self.estimate_gradients(start.view(), z.view(), &picked, bounds, goal, constant)?;
                for (&idx, grad) in picked.iter().zip(grads) {
                    if let Some(grad) = grad {
                        z[idx] = bounds.clip_value(idx, z[idx] - lr * grad);
                    }
                }

                let eval = match self.evaluate(start.view(), z.view(), goal)? {
                    Some(eval) => eval,
                    None => {
                        debug!("Skipping non-finite trial at iteration {}", iteration);
                        continue;
                    }
                };
                // the predicted label decides success, a zero loss on a score tie does not
                round_success |= goal.is_satisfied(eval.label);
                if self.config.log_interval > 0 && iteration % self.config.log_interval == 0 {
                    observer.observe(&TrialEvent::ZooIteration {
                        example: example_idx,
                        round,
                        iteration,
                        objective: eval.distortion + constant * eval.loss,
                        constant,
                    });
                }
                tracker.try_accept(
                    Candidate {
                        example: eval.example,
                        distortion: eval.distortion,
                        loss: Some(eval.loss),
                    },
                    eval.label,
                );
            }

            let best_distortion = tracker.best_distortion();
            round_distortions.push(best_distortion);
            observer.observe(&TrialEvent::RoundFinished {
                example: example_idx,
                round,
                constant,
                success: round_success,
                best_distortion,
            });
            search.update(round_success);
        }
        Ok((tracker.into_best(), round_distortions))
    }

    /// Symmetric finite-difference gradient of the objective at `z` for each of
    /// `coords`. `None` where the probes collapse onto each other or the estimate
    /// isn't finite.
    fn estimate_gradients(
        &self,
        start: ArrayView1<AdvFloat>,
        z: ArrayView1<AdvFloat>,
        coords: &[usize],
        bounds: &Bounds1,
        goal: AttackGoal,
        constant: AdvFloat,
    ) -> Result<Vec<Option<AdvFloat>>> {
        let h = self.config.variable_h;
        let mut probes = Array2::zeros((2 * coords.len(), z.len()));
        let mut widths = Vec::with_capacity(coords.len());
        for (k, &idx) in coords.iter().enumerate() {
            let plus = bounds.clip_value(idx, z[idx] + h);
            let minus = bounds.clip_value(idx, z[idx] - h);
            for (offset, value) in [(0, plus), (1, minus)] {
                let mut row = probes.row_mut(2 * k + offset);
                row.assign(&z);
                row[idx] = value;
            }
            widths.push(plus - minus);
        }
        let objectives = self.probe_objectives(start, &probes, goal, constant)?;
        Ok(objectives
            .into_iter()
            .tuples::<(AdvFloat, AdvFloat)>()
            .zip(widths)
            .map(|((f_plus, f_minus), width)| {
                let grad = (f_plus - f_minus) / width;
                (width > 0. && grad.is_finite()).then(|| grad)
            })
            .collect())
    }

    /// `norm + constant * loss` of every probe row, probes given in search space
    fn probe_objectives(
        &self,
        start: ArrayView1<AdvFloat>,
        probes: &Array2<AdvFloat>,
        goal: AttackGoal,
        constant: AdvFloat,
    ) -> Result<Vec<AdvFloat>> {
        let nb_probes = probes.nrows();
        let mut inputs = Array2::zeros(probes.raw_dim());
        for (mut input, probe) in inputs.axis_iter_mut(Axis(0)).zip(probes.axis_iter(Axis(0))) {
            input.assign(&self.processor.to_model_space(probe)?);
        }
        let scores = if self.config.batch_queries {
            let scores = self.model.predict(inputs.view().into_dyn())?;
            check_scores_shape(&scores, nb_probes, self.model.nb_classes())?;
            scores
        } else {
            let mut scores = Array2::zeros((nb_probes, self.model.nb_classes()));
            for (mut row, input) in scores.axis_iter_mut(Axis(0)).zip(inputs.axis_iter(Axis(0))) {
                row.assign(&self.model.predict_one(input.into_dyn())?);
            }
            scores
        };
        trace!("Probe scores {}", scores);
        let losses = self
            .loss
            .loss_batch(scores.view(), goal.original_label, goal.target_label)?;
        let norms = self.norm.norm_batch(start, probes.view())?;
        Ok(losses
            .iter()
            .zip(norms.iter())
            .map(|(loss, norm)| norm + constant * loss)
            .collect())
    }

    /// Corrects the running candidate into a valid model input and scores it.
    /// `None` for a degenerate trial: NaN scores, or a non-finite loss or distortion.
    fn evaluate(
        &self,
        start: ArrayView1<AdvFloat>,
        z: ArrayView1<AdvFloat>,
        goal: AttackGoal,
    ) -> Result<Option<Evaluation>> {
        let mut example = self.processor.to_model_space(z)?;
        if let Some(corrector) = &self.corrector {
            example = corrector.correct(example.view())?;
        }
        let scores = self.model.predict_one(example.view().into_dyn())?;
        if scores.iter().any(|s| s.is_nan()) {
            return Ok(None);
        }
        let label = match argmax(scores.view()) {
            Some(label) => label,
            None => return Ok(None),
        };
        let loss = self
            .loss
            .loss(scores.view(), goal.original_label, goal.target_label)?;
        let distortion = self
            .norm
            .norm(start, self.processor.to_search_space(example.view())?.view())?;
        if !(loss.is_finite() && distortion.is_finite()) {
            return Ok(None);
        }
        Ok(Some(Evaluation {
            example,
            label,
            loss,
            distortion,
        }))
    }
}
