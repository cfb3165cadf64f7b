//! Binary search over the trade-off constant of the zeroth-order attack
use crate::error::{AttackError, Result};
use crate::AdvFloat;
use serde::{Deserialize, Serialize};

/// How the constant moves between binary-search rounds.
///
/// A round that reaches the attack goal lowers the constant (less weight on success,
/// more on distortion); a failed round raises it.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstSchedule {
    /// Midpoint of the known bounds; multiply by `growth` while no round has succeeded
    Bisection { growth: AdvFloat },
    /// Divide by `factor` on success, multiply on failure
    Geometric { factor: AdvFloat },
}

impl Default for ConstSchedule {
    fn default() -> Self {
        Self::Bisection { growth: 10. }
    }
}

impl ConstSchedule {
    /// # Errors
    /// If the growth factor is not finite and greater than 1
    pub fn validate(&self) -> Result<()> {
        let factor = match *self {
            Self::Bisection { growth } => growth,
            Self::Geometric { factor } => factor,
        };
        if factor.is_finite() && factor > 1. {
            Ok(())
        } else {
            Err(AttackError::InvalidConfig(format!(
                "schedule factor must be finite and > 1, got {}",
                factor
            )))
        }
    }
}

/// State of the search: the current constant and the bracket it lives in
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstSearch {
    schedule: ConstSchedule,
    lower: AdvFloat,
    upper: AdvFloat,
    current: AdvFloat,
}

impl ConstSearch {
    /// # Errors
    /// If the schedule is invalid or `initial` is not finite and positive
    pub fn new(schedule: ConstSchedule, initial: AdvFloat) -> Result<Self> {
        schedule.validate()?;
        if !(initial.is_finite() && initial > 0.) {
            return Err(AttackError::InvalidConfig(format!(
                "initial constant must be finite and > 0, got {}",
                initial
            )));
        }
        Ok(Self {
            schedule,
            lower: 0.,
            upper: AdvFloat::INFINITY,
            current: initial,
        })
    }

    pub const fn current(&self) -> AdvFloat {
        self.current
    }

    pub const fn bracket(&self) -> (AdvFloat, AdvFloat) {
        (self.lower, self.upper)
    }

    /// Moves to the constant for the next round and returns it
    pub fn update(&mut self, success: bool) -> AdvFloat {
        if success {
            self.upper = self.upper.min(self.current);
        } else {
            self.lower = self.lower.max(self.current);
        }
        self.current = match (self.schedule, success) {
            (ConstSchedule::Bisection { .. }, true) => (self.lower + self.upper) / 2.,
            (ConstSchedule::Bisection { growth }, false) => {
                if self.upper.is_finite() {
                    (self.lower + self.upper) / 2.
                } else {
                    self.current * growth
                }
            }
            (ConstSchedule::Geometric { factor }, true) => self.current / factor,
            (ConstSchedule::Geometric { factor }, false) => self.current * factor,
        };
        self.current
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bisection_grows_until_first_success_then_halves_the_bracket() {
        let mut search = ConstSearch::new(ConstSchedule::default(), 1.).unwrap();
        assert_eq!(search.update(false), 10.);
        assert_eq!(search.update(false), 100.);
        assert_eq!(search.update(true), 55.);
        assert_eq!(search.bracket(), (10., 100.));
        assert_eq!(search.update(false), 77.5);
        assert_eq!(search.update(true), 66.25);
        assert_eq!(search.bracket(), (55., 77.5));
    }

    #[test]
    fn bisection_success_from_the_start_halves() {
        let mut search = ConstSearch::new(ConstSchedule::default(), 0.8).unwrap();
        assert_eq!(search.update(true), 0.4);
        assert_eq!(search.update(true), 0.2);
        assert_eq!(search.bracket(), (0., 0.4));
    }

    #[test]
    fn geometric_scales_by_factor() {
        let mut search = ConstSearch::new(ConstSchedule::Geometric { factor: 2. }, 1.).unwrap();
        assert_eq!(search.update(true), 0.5);
        assert_eq!(search.update(false), 1.);
        assert_eq!(search.bracket(), (0.5, 1.));
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(ConstSearch::new(ConstSchedule::default(), 0.).is_err());
        assert!(ConstSearch::new(ConstSchedule::default(), AdvFloat::NAN).is_err());
        assert!(ConstSearch::new(ConstSchedule::Geometric { factor: 1. }, 1.).is_err());
        assert!(ConstSearch::new(ConstSchedule::Bisection { growth: 0.5 }, 1.).is_err());
    }

    #[test]
    fn schedule_round_trips_through_json() {
        let json = serde_json::to_string(&ConstSchedule::Geometric { factor: 3. }).unwrap();
        assert_eq!(json, r#"{"kind":"geometric","factor":3.0}"#);
        let back: ConstSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConstSchedule::Geometric { factor: 3. });
    }
}
