//! Best-so-far bookkeeping for one original example
use crate::AdvFloat;
use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

/// Label condition an attack must reach
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AttackGoal {
    pub original_label: usize,
    pub target_label: Option<usize>,
}

impl AttackGoal {
    pub const fn untargeted(original_label: usize) -> Self {
        Self {
            original_label,
            target_label: None,
        }
    }

    pub const fn targeted(original_label: usize, target_label: usize) -> Self {
        Self {
            original_label,
            target_label: Some(target_label),
        }
    }

    pub const fn is_targeted(&self) -> bool {
        self.target_label.is_some()
    }

    /// `label != original` when untargeted, `label == target` when targeted
    pub fn is_satisfied(&self, label: usize) -> bool {
        match self.target_label {
            Some(target) => label == target,
            None => label != self.original_label,
        }
    }
}

/// A scored trial example
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate<D: Dimension> {
    pub example: Array<AdvFloat, D>,
    pub distortion: AdvFloat,
    /// `None` when the search doesn't compute a loss (the sweep)
    pub loss: Option<AdvFloat>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BestRecord<D: Dimension> {
    pub example: Array<AdvFloat, D>,
    pub label: usize,
    pub distortion: AdvFloat,
    pub loss: Option<AdvFloat>,
    pub success: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum AcceptPolicy {
    /// Only label-satisfying candidates are ever recorded
    SuccessOnly,
    /// Before the first success, keep the failing candidate with the lowest loss
    TrackFailures,
}

/// Decides whether a trial replaces the best record.
///
/// Candidates are ranked by success first, then distortion (successes) or loss
/// (failures). The record never gets worse: once a success is stored, only a
/// success with strictly smaller distortion, or equal distortion and strictly
/// smaller loss, replaces it.
#[derive(Clone, Debug)]
pub struct ResultTracker<D: Dimension> {
    goal: AttackGoal,
    policy: AcceptPolicy,
    best: Option<BestRecord<D>>,
}

impl<D: Dimension> ResultTracker<D> {
    pub const fn new(goal: AttackGoal, policy: AcceptPolicy) -> Self {
        Self {
            goal,
            policy,
            best: None,
        }
    }

    pub const fn goal(&self) -> &AttackGoal {
        &self.goal
    }

    pub const fn best(&self) -> Option<&BestRecord<D>> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<BestRecord<D>> {
        self.best
    }

    pub fn is_successful(&self) -> bool {
        self.best.as_ref().map_or(false, |best| best.success)
    }

    /// Best successful distortion so far, infinite until the first success
    pub fn best_distortion(&self) -> AdvFloat {
        match &self.best {
            Some(best) if best.success => best.distortion,
            _ => AdvFloat::INFINITY,
        }
    }

    /// Records `candidate` if it improves on the current best. Returns whether it did.
    ///
    /// Candidates with a non-finite distortion or loss are rejected.
    pub fn try_accept(&mut self, candidate: Candidate<D>, label: usize) -> bool {
        let finite = candidate.distortion.is_finite()
            && candidate.loss.map_or(true, AdvFloat::is_finite);
        if !finite {
            return false;
        }
        let success = self.goal.is_satisfied(label);
        let improves = match (&self.best, success) {
            (Some(best), true) if best.success => {
                candidate.distortion < best.distortion
                    || (candidate.distortion == best.distortion
                        && strictly_lower(candidate.loss, best.loss))
            }
            (_, true) => true,
            (Some(best), false) => {
                !best.success
                    && self.policy == AcceptPolicy::TrackFailures
                    && strictly_lower(candidate.loss, best.loss)
            }
            (None, false) => {
                self.policy == AcceptPolicy::TrackFailures && candidate.loss.is_some()
            }
        };
        if improves {
            self.best = Some(BestRecord {
                example: candidate.example,
                label,
                distortion: candidate.distortion,
                loss: candidate.loss,
                success,
            });
        }
        improves
    }
}

fn strictly_lower(candidate: Option<AdvFloat>, best: Option<AdvFloat>) -> bool {
    match (candidate, best) {
        (Some(c), Some(b)) => c < b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::{array, Ix1};
    use proptest::prelude::*;

    fn candidate(distortion: AdvFloat, loss: AdvFloat) -> Candidate<Ix1> {
        Candidate {
            example: array![distortion, loss],
            distortion,
            loss: Some(loss),
        }
    }

    #[test]
    fn goal_conditions() {
        assert!(AttackGoal::untargeted(1).is_satisfied(0));
        assert!(!AttackGoal::untargeted(1).is_satisfied(1));
        assert!(AttackGoal::targeted(1, 2).is_satisfied(2));
        assert!(!AttackGoal::targeted(1, 2).is_satisfied(0));
    }

    #[test]
    fn success_only_ignores_failures() {
        let mut tracker = ResultTracker::new(AttackGoal::untargeted(0), AcceptPolicy::SuccessOnly);
        assert!(!tracker.try_accept(candidate(0.1, 0.5), 0));
        assert!(tracker.best().is_none());
        assert!(tracker.try_accept(candidate(3., 0.), 1));
        assert!(tracker.is_successful());
    }

    #[test]
    fn success_replaces_failure_and_never_the_reverse() {
        let mut tracker = ResultTracker::new(AttackGoal::untargeted(0), AcceptPolicy::TrackFailures);
        assert!(tracker.try_accept(candidate(0.1, 0.5), 0));
        assert!(tracker.try_accept(candidate(0.2, 0.3), 0));
        assert!(!tracker.try_accept(candidate(0.05, 0.4), 0));
        assert!(tracker.try_accept(candidate(5., 0.), 1));
        assert!(!tracker.try_accept(candidate(0.01, 0.), 0));
        assert!(!tracker.try_accept(candidate(6., -1.), 2));
        assert!(tracker.try_accept(candidate(4., 0.), 2));
        let best = tracker.best().unwrap();
        assert!(best.success);
        assert_eq!(best.label, 2);
        assert_eq!(best.distortion, 4.);
    }

    #[test]
    fn equal_distortion_needs_lower_loss() {
        let mut tracker = ResultTracker::new(AttackGoal::untargeted(0), AcceptPolicy::SuccessOnly);
        assert!(tracker.try_accept(candidate(1., -0.1), 1));
        assert!(!tracker.try_accept(candidate(1., -0.1), 1));
        assert!(tracker.try_accept(candidate(1., -0.2), 1));
    }

    #[test]
    fn rejects_non_finite_trials() {
        let mut tracker = ResultTracker::new(AttackGoal::untargeted(0), AcceptPolicy::TrackFailures);
        assert!(!tracker.try_accept(candidate(AdvFloat::NAN, 0.), 1));
        assert!(!tracker.try_accept(candidate(1., AdvFloat::NAN), 1));
        assert!(!tracker.try_accept(candidate(AdvFloat::INFINITY, 0.), 1));
        assert!(tracker.best().is_none());
    }

    proptest! {
        #[test]
        fn best_distortion_never_increases_after_success(
            trials in proptest::collection::vec((0. .. 10., -1. .. 1., 0_usize..3), 1..64)
        ) {
            let mut tracker = ResultTracker::new(AttackGoal::untargeted(0), AcceptPolicy::TrackFailures);
            let mut previous = AdvFloat::INFINITY;
            let mut was_successful = false;
            for (distortion, loss, label) in trials {
                tracker.try_accept(candidate(distortion, loss), label);
                if was_successful {
                    prop_assert!(tracker.is_successful());
                    prop_assert!(tracker.best_distortion() <= previous);
                }
                was_successful = tracker.is_successful();
                previous = tracker.best_distortion();
            }
        }
    }
}
