//! Progress reporting for the search engines
//!
//! Engines don't log through global state of their own: they hand [`TrialEvent`]s
//! to an injected [`AttackObserver`] every `log_interval` trials and at the end of
//! every binary-search round.
use crate::AdvFloat;
use log::{debug, info};

#[derive(Clone, Debug, PartialEq)]
pub enum TrialEvent {
    /// The sweep moved on to a new spatial position
    PixelTrial { trial: usize, row: usize, col: usize },
    /// One coordinate-descent iteration of the zeroth-order attack
    ZooIteration {
        example: usize,
        round: usize,
        iteration: usize,
        objective: AdvFloat,
        constant: AdvFloat,
    },
    /// A binary-search round over the trade-off constant completed
    RoundFinished {
        example: usize,
        round: usize,
        constant: AdvFloat,
        success: bool,
        best_distortion: AdvFloat,
    },
}

pub trait AttackObserver {
    fn observe(&mut self, event: &TrialEvent);
}

/// Forwards events to the `log` facade
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl AttackObserver for LogObserver {
    fn observe(&mut self, event: &TrialEvent) {
        match event {
            TrialEvent::PixelTrial { trial, row, col } => {
                info!("Attack location row={} col={} (trial {})", row, col, trial);
            }
            TrialEvent::ZooIteration {
                example,
                round,
                iteration,
                objective,
                constant,
            } => {
                debug!(
                    "Example {} round {} iteration {}: objective {:.6} (c = {})",
                    example, round, iteration, objective, constant
                );
            }
            TrialEvent::RoundFinished {
                example,
                round,
                constant,
                success,
                best_distortion,
            } => {
                info!(
                    "Example {} round {} finished with c = {}: success {} best distortion {}",
                    example, round, constant, success, best_distortion
                );
            }
        }
    }
}

/// Discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl AttackObserver for NullObserver {
    fn observe(&mut self, _event: &TrialEvent) {}
}

/// Keeps every event it sees
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<TrialEvent>,
}

impl AttackObserver for RecordingObserver {
    fn observe(&mut self, event: &TrialEvent) {
        self.events.push(event.clone());
    }
}

impl<O: AttackObserver + ?Sized> AttackObserver for &mut O {
    fn observe(&mut self, event: &TrialEvent) {
        (**self).observe(event);
    }
}
