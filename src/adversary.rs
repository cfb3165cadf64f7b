use crate::error::{AttackError, Result};
use crate::tracker::{AcceptPolicy, AttackGoal, BestRecord, Candidate, ResultTracker};
use crate::util::l2_norm;
use crate::AdvFloat;
use ndarray::{Array, Array1, ArrayView, Dimension};

/// An original example together with the adversarial example found for it.
///
/// The original is never modified; every trial works on a copy. Only label-satisfying
/// examples are accepted, so `adversarial_example` is `None` until the attack succeeds.
#[derive(Clone, Debug)]
pub struct Adversary<D: Dimension> {
    original: Array<AdvFloat, D>,
    tracker: ResultTracker<D>,
}

impl<D: Dimension> Adversary<D> {
    pub fn new(original: Array<AdvFloat, D>, original_label: usize) -> Self {
        Self {
            original,
            tracker: ResultTracker::new(
                AttackGoal::untargeted(original_label),
                AcceptPolicy::SuccessOnly,
            ),
        }
    }

    pub fn new_targeted(
        original: Array<AdvFloat, D>,
        original_label: usize,
        target_label: usize,
    ) -> Self {
        Self {
            original,
            tracker: ResultTracker::new(
                AttackGoal::targeted(original_label, target_label),
                AcceptPolicy::SuccessOnly,
            ),
        }
    }

    pub fn original(&self) -> ArrayView<AdvFloat, D> {
        self.original.view()
    }

    pub const fn original_label(&self) -> usize {
        self.tracker.goal().original_label
    }

    pub const fn target_label(&self) -> Option<usize> {
        self.tracker.goal().target_label
    }

    pub const fn is_targeted_attack(&self) -> bool {
        self.tracker.goal().is_targeted()
    }

    pub fn is_successful(&self) -> bool {
        self.tracker.is_successful()
    }

    /// Accepts `example` if `label` satisfies the attack goal and it is closer (L2) to
    /// the original than the current adversarial example.
    ///
    /// # Errors
    /// If `example` doesn't have the shape of the original
    pub fn try_accept_the_example(
        &mut self,
        example: Array<AdvFloat, D>,
        label: usize,
    ) -> Result<bool> {
        if example.shape() != self.original.shape() {
            return Err(AttackError::shape_mismatch(
                self.original.shape(),
                example.shape(),
            ));
        }
        let diff: Array1<AdvFloat> = (&example - &self.original).iter().copied().collect();
        let distortion = l2_norm(diff.view());
        Ok(self.tracker.try_accept(
            Candidate {
                example,
                distortion,
                loss: None,
            },
            label,
        ))
    }

    pub fn best(&self) -> Option<&BestRecord<D>> {
        self.tracker.best().filter(|best| best.success)
    }

    pub fn adversarial_example(&self) -> Option<ArrayView<AdvFloat, D>> {
        self.best().map(|best| best.example.view())
    }

    pub fn adversarial_label(&self) -> Option<usize> {
        self.best().map(|best| best.label)
    }

    /// The adversarial example, or the untouched original if the attack failed
    pub fn best_or_original(&self) -> ArrayView<AdvFloat, D> {
        self.adversarial_example()
            .unwrap_or_else(|| self.original())
    }
}
