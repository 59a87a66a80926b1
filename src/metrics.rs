use std::fmt;

use crate::data::model::Label;
use crate::error::{Result, SegmentationError};

/// Patch-level confusion counts, road being the positive class.
///
/// Counted here rather than through `linfa::ConfusionMatrix`: that type keeps
/// its counts private, takes its classes from the predictions (a batch
/// predicted all background collapses to 1x1), scores the first sorted label
/// (`false`) as positive and yields NaN for empty denominators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchMetrics {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl PatchMetrics {
    pub fn from_labels(predicted: &[Label], truth: &[Label]) -> Result<Self> {
        if predicted.len() != truth.len() {
            return Err(SegmentationError::shape("metrics (predicted vs truth)", truth.len(), predicted.len()));
        }
        let mut m = PatchMetrics::default();
        for (p, t) in predicted.iter().zip(truth) {
            match (p.is_road(), t.is_road()) {
                (true, true) => m.true_positive += 1,
                (true, false) => m.false_positive += 1,
                (false, false) => m.true_negative += 1,
                (false, true) => m.false_negative += 1,
            }
        }
        Ok(m)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

impl fmt::Display for PatchMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patches={} accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.total(),
            self.accuracy(),
            self.precision(),
            self.recall(),
            self.f1()
        )
    }
}
