//! Support-vector classifier wrapper.
//!
//! The optimisation itself is done by `linfa-svm`. This module fixes the
//! hyperparameters, checks inputs before they reach the solver and enforces
//! the train-before-predict ordering.

use std::collections::BTreeSet;

use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::data::model::Label;
use crate::error::{Result, SegmentationError};

/// Kernel coefficient of the polynomial kernel `(gamma * <x, y> + coef0)^degree`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// `1 / n_features`, derived from the training matrix.
    Auto,
    Fixed(f64),
}

impl Gamma {
    fn resolve(self, n_features: usize) -> f64 {
        match self {
            Gamma::Auto => 1.0 / n_features.max(1) as f64,
            Gamma::Fixed(g) => g,
        }
    }
}

/// Hyperparameters of the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kernel_degree: f64,
    pub coef0: f64,
    pub gamma: Gamma,
    /// Soft-margin penalty, applied to both classes.
    pub c: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kernel_degree: 4.0,
            coef0: 0.0,
            gamma: Gamma::Auto,
            c: 1.0,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.kernel_degree > 0.0) {
            return Err(SegmentationError::InvalidConfig {
                parameter: "classifier.kernel_degree",
                reason: format!("must be positive, got {}", self.kernel_degree),
            });
        }
        if !(self.c > 0.0) {
            return Err(SegmentationError::InvalidConfig {
                parameter: "classifier.c",
                reason: format!("must be positive, got {}", self.c),
            });
        }
        if let Gamma::Fixed(g) = self.gamma {
            if !(g > 0.0) {
                return Err(SegmentationError::InvalidConfig {
                    parameter: "classifier.gamma",
                    reason: format!("must be positive, got {g}"),
                });
            }
        }
        Ok(())
    }
}

/// Fitted state. `scale` is `sqrt(gamma)`: rows are multiplied by it before
/// they reach the kernel so that `<sx, sy> = gamma * <x, y>`.
struct Fitted {
    model: Svm<f64, bool>,
    n_features: usize,
    scale: f64,
}

/// Outcome of a successful `train`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    pub samples: usize,
    pub features: usize,
    pub positives: usize,
    pub support_vectors: usize,
    pub gamma: f64,
}

/// Binary SVM with a polynomial kernel.
pub struct SvmClassifier {
    config: ClassifierConfig,
    fitted: Option<Fitted>,
}

impl SvmClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Drop any fitted state.
    pub fn reset(&mut self) {
        self.fitted = None;
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit from scratch on row-aligned `features` / `labels`, replacing any
    /// previous fit. On error the previous fit is kept.
    pub fn train(&mut self, features: ArrayView2<'_, f64>, labels: &[Label]) -> Result<TrainingSummary> {
        self.config.validate()?;
        let (rows, cols) = features.dim();
        if rows != labels.len() {
            return Err(SegmentationError::shape("train rows (features vs labels)", rows, labels.len()));
        }
        let classes: BTreeSet<Label> = labels.iter().copied().collect();
        if classes.len() < 2 {
            return Err(SegmentationError::DegenerateLabels {
                classes: classes.len(),
            });
        }

        let gamma = self.config.gamma.resolve(cols);
        let scale = gamma.sqrt();
        let records: Array2<f64> = features.mapv(|v| v * scale);
        let targets: Array1<bool> = labels.iter().map(|l| l.is_road()).collect();
        let positives = targets.iter().filter(|&&t| t).count();
        let dataset = Dataset::new(records, targets);

        log::debug!(
            "fitting SVM on {rows}x{cols} (gamma={gamma:.6}, degree={}, C={})",
            self.config.kernel_degree,
            self.config.c
        );
        let model = Svm::<f64, bool>::params()
            .pos_neg_weights(self.config.c, self.config.c)
            .polynomial_kernel(self.config.coef0, self.config.kernel_degree)
            .fit(&dataset)
            .map_err(|e| SegmentationError::Classifier(e.to_string()))?;

        let summary = TrainingSummary {
            samples: rows,
            features: cols,
            positives,
            support_vectors: model.nsupport(),
            gamma,
        };
        self.fitted = Some(Fitted {
            model,
            n_features: cols,
            scale,
        });
        Ok(summary)
    }

    /// One label per row of `features`.
    pub fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Vec<Label>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(SegmentationError::Untrained { operation: "predict" })?;
        let (rows, cols) = features.dim();
        if cols != fitted.n_features {
            return Err(SegmentationError::shape("predict feature width", fitted.n_features, cols));
        }
        if rows == 0 {
            return Ok(Vec::new());
        }
        let records = features.mapv(|v| v * fitted.scale);
        let predicted: Array1<bool> = fitted.model.predict(&records);
        Ok(predicted.iter().map(|&road| Label::from(road)).collect())
    }
}

impl Default for SvmClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<Label>) {
        let x = array![
            [0.05, 0.10],
            [0.10, 0.05],
            [0.15, 0.10],
            [0.10, 0.15],
            [0.85, 0.90],
            [0.90, 0.85],
            [0.95, 0.90],
            [0.90, 0.95],
        ];
        let y = [0, 0, 0, 0, 1, 1, 1, 1]
            .iter()
            .map(|&v| Label::try_from(v).unwrap())
            .collect();
        (x, y)
    }

    fn linear_config() -> ClassifierConfig {
        ClassifierConfig {
            kernel_degree: 1.0,
            coef0: 1.0,
            gamma: Gamma::Fixed(1.0),
            c: 10.0,
        }
    }

    #[test]
    fn predict_before_train_is_untrained() {
        let clf = SvmClassifier::default();
        let err = clf.predict(array![[0.1, 0.2]].view()).unwrap_err();
        assert!(matches!(err, SegmentationError::Untrained { operation: "predict" }));
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::default();
        let err = clf.train(x.view(), &y[..5]).unwrap_err();
        assert!(matches!(err, SegmentationError::ShapeMismatch { .. }));
        assert!(!clf.is_trained());
    }

    #[test]
    fn single_class_is_degenerate() {
        let (x, _) = separable();
        let mut clf = SvmClassifier::default();
        let err = clf.train(x.view(), &[Label::Road; 8]).unwrap_err();
        assert!(matches!(err, SegmentationError::DegenerateLabels { classes: 1 }));
    }

    #[test]
    fn fits_separable_data() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::new(linear_config());
        let summary = clf.train(x.view(), &y).unwrap();
        assert_eq!(summary.samples, 8);
        assert_eq!(summary.positives, 4);
        assert!(summary.support_vectors > 0);

        let pred = clf.predict(array![[0.05, 0.05], [0.95, 0.95]].view()).unwrap();
        assert_eq!(pred, vec![Label::Background, Label::Road]);
    }

    #[test]
    fn auto_gamma_uses_feature_count() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::default();
        let summary = clf.train(x.view(), &y).unwrap();
        assert!((summary.gamma - 0.5).abs() < 1e-12);
    }

    #[test]
    fn predict_checks_feature_width() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::new(linear_config());
        clf.train(x.view(), &y).unwrap();
        let err = clf.predict(array![[0.1, 0.2, 0.3]].view()).unwrap_err();
        assert!(matches!(err, SegmentationError::ShapeMismatch { .. }));
    }

    #[test]
    fn reset_discards_fit() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::new(linear_config());
        clf.train(x.view(), &y).unwrap();
        assert!(clf.is_trained());
        clf.reset();
        assert!(clf.predict(x.view()).is_err());
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        let (x, y) = separable();
        let mut clf = SvmClassifier::new(ClassifierConfig {
            c: 0.0,
            ..ClassifierConfig::default()
        });
        assert!(matches!(
            clf.train(x.view(), &y),
            Err(SegmentationError::InvalidConfig { parameter: "classifier.c", .. })
        ));
    }
}
