#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
//! Black-box adversarial example generation.
//!
//! The victim model is only ever queried through [`model::Classifier`]; no gradients
//! are required. Two search engines are provided:
//!
//! * [`attacks::SinglePixelAttack`] sweeps single spatial positions of an image
//!   and stops at the first label flip.
//! * [`attacks::ZooAttack`] estimates gradients of a margin loss by finite
//!   differences and runs coordinate descent under a binary search over the
//!   trade-off constant, for tabular inputs with one-hot and integer fields.
extern crate ndarray;
extern crate rand;

pub mod adversary;
pub mod affine;
pub mod attacks;
pub mod bounds;
pub mod config;
pub mod corrector;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod loss;
pub mod model;
pub mod norm;
pub mod observer;
pub mod processor;
mod test_util;
pub mod tracker;
pub mod util;

pub use adversary::Adversary;
pub use attacks::{SinglePixelAttack, ZooAttack};
pub use error::{AttackError, Result};
pub use model::Classifier;

pub type AdvFloat = f64;
