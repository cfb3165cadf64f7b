//! Utility functions
use crate::AdvFloat;
use ndarray::ArrayView1;

pub fn l2_norm(x: ArrayView1<AdvFloat>) -> AdvFloat {
    x.dot(&x).sqrt()
}

/// Index of the largest value. Ties go to the lowest index and NaN never wins.
///
/// Returns `None` for an empty or all-NaN view.
pub fn argmax(x: ArrayView1<AdvFloat>) -> Option<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, AdvFloat)>, (idx, &v)| match best {
            Some((_, best_v)) if best_v >= v => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

/// Largest value at any index other than `skip`, or `None` if there is no such index.
pub fn max_excluding(x: ArrayView1<AdvFloat>, skip: usize) -> Option<AdvFloat> {
    x.iter()
        .enumerate()
        .filter(|&(idx, _)| idx != skip)
        .map(|(_, &v)| v)
        .reduce(AdvFloat::max)
}
