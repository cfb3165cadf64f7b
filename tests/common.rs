#![allow(dead_code)]
use advbox_rs::model::Classifier;
use advbox_rs::{AdvFloat, AttackError, Result};
use ndarray::{Array1, Array2, ArrayViewD, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::cell::Cell;

pub fn rng(seed: u64) -> Pcg64 {
    Pcg64::seed_from_u64(seed)
}

/// Spatial positions in the order the sweep visits them for `seed`
pub fn sweep_order(seed: u64, nb_positions: usize) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..nb_positions).collect();
    positions.shuffle(&mut rng(seed));
    positions
}

/// Two-class image model that predicts class 1 only when every channel at
/// `(row, col)` equals `trigger`. Counts the examples it scores.
pub struct PixelTrigger {
    pub channel_axis: usize,
    pub row: usize,
    pub col: usize,
    pub trigger: AdvFloat,
    pub bounds: (AdvFloat, AdvFloat),
    pub queries: Cell<usize>,
}

impl PixelTrigger {
    pub fn new(channel_axis: usize, row: usize, col: usize, bounds: (AdvFloat, AdvFloat)) -> Self {
        Self {
            channel_axis,
            row,
            col,
            trigger: bounds.1,
            bounds,
            queries: Cell::new(0),
        }
    }
}

impl Classifier for PixelTrigger {
    fn bounds(&self) -> (AdvFloat, AdvFloat) {
        self.bounds
    }

    fn input_channel_axis(&self) -> usize {
        self.channel_axis
    }

    fn nb_classes(&self) -> usize {
        2
    }

    fn predict(&self, batch: ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>> {
        let nb_examples = batch.shape()[0];
        self.queries.set(self.queries.get() + nb_examples);
        let mut scores = Array2::zeros((nb_examples, 2));
        for (example, mut row) in batch.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
            let axes: Vec<usize> = (0..example.ndim())
                .filter(|&a| a != self.channel_axis)
                .collect();
            let pixel = example
                .index_axis_move(Axis(axes[0]), self.row)
                .index_axis_move(Axis(axes[1] - 1), self.col);
            row[0] = 1.;
            if pixel.iter().all(|&v| (v - self.trigger).abs() < 1e-9) {
                row[1] = 2.;
            }
        }
        Ok(scores)
    }
}

/// Two-class tabular model: class 0 scores `threshold`, class 1 scores `w · x`.
/// Rows are scored independently, so batching never changes a score.
pub struct LinearThreshold {
    pub weights: Array1<AdvFloat>,
    pub threshold: AdvFloat,
    pub bounds: (AdvFloat, AdvFloat),
    pub calls: Cell<usize>,
}

impl LinearThreshold {
    pub fn new(weights: Array1<AdvFloat>, threshold: AdvFloat) -> Self {
        Self {
            weights,
            threshold,
            bounds: (0., 1.),
            calls: Cell::new(0),
        }
    }
}

impl Classifier for LinearThreshold {
    fn bounds(&self) -> (AdvFloat, AdvFloat) {
        self.bounds
    }

    fn input_channel_axis(&self) -> usize {
        0
    }

    fn nb_classes(&self) -> usize {
        2
    }

    fn predict(&self, batch: ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>> {
        self.calls.set(self.calls.get() + 1);
        if batch.ndim() != 2 || batch.shape()[1] != self.weights.len() {
            return Err(AttackError::shape_mismatch(
                &[batch.shape()[0], self.weights.len()],
                batch.shape(),
            ));
        }
        let mut scores = Array2::zeros((batch.shape()[0], 2));
        for (example, mut row) in batch.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
            row[0] = self.threshold;
            row[1] = example
                .iter()
                .zip(self.weights.iter())
                .fold(0., |acc, (x, w)| acc + x * w);
        }
        Ok(scores)
    }
}

/// One-feature model whose class-0 score `1 - x` turns NaN from `cliff` on.
/// Class 1 always scores `0.1`, so no finite answer ever flips the label.
pub struct NanCliff {
    pub cliff: AdvFloat,
}

impl Classifier for NanCliff {
    fn bounds(&self) -> (AdvFloat, AdvFloat) {
        (0., 1.)
    }

    fn input_channel_axis(&self) -> usize {
        0
    }

    fn nb_classes(&self) -> usize {
        2
    }

    fn predict(&self, batch: ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>> {
        let mut scores = Array2::zeros((batch.shape()[0], 2));
        for (example, mut row) in batch.axis_iter(Axis(0)).zip(scores.axis_iter_mut(Axis(0))) {
            let x = example.iter().next().copied().unwrap_or(0.);
            row[0] = if x < self.cliff { 1. - x } else { AdvFloat::NAN };
            row[1] = 0.1;
        }
        Ok(scores)
    }
}
