use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierConfig;
use crate::error::{Result, SegmentationError};
use crate::features::FOREGROUND_THRESHOLD;

// ---------------------------------------------------------------------------
// PipelineConfig – every knob of the segmentation pipeline
// ---------------------------------------------------------------------------

/// Pipeline settings, read from JSON. Missing fields take their defaults, so
/// `{}` is a valid configuration.
///
/// ```json
/// {
///   "patch_size": 16,
///   "padding": 0,
///   "foreground_threshold": 0.25,
///   "poly_degree": 4,
///   "classifier": { "kernel_degree": 4.0, "coef0": 0.0, "gamma": "auto", "c": 1.0 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side of the square patches, in pixels.
    pub patch_size: usize,
    /// Reflect padding added around image patches before feature extraction.
    pub padding: usize,
    /// Mean ground-truth value a patch must strictly exceed to be road.
    pub foreground_threshold: f64,
    /// Degree of the polynomial feature expansion.
    pub poly_degree: usize,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            patch_size: 16,
            padding: 0,
            foreground_threshold: FOREGROUND_THRESHOLD,
            poly_degree: 4,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(SegmentationError::InvalidConfig {
                parameter: "patch_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.poly_degree == 0 {
            return Err(SegmentationError::InvalidConfig {
                parameter: "poly_degree",
                reason: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.foreground_threshold) {
            return Err(SegmentationError::InvalidConfig {
                parameter: "foreground_threshold",
                reason: format!("must lie in [0, 1], got {}", self.foreground_threshold),
            });
        }
        self.classifier.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Gamma;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_json(json: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn empty_object_gives_defaults() {
        let f = write_json("{}");
        let config = PipelineConfig::load_from_file(f.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.patch_size, 16);
        assert_eq!(config.foreground_threshold, 0.25);
        assert_eq!(config.classifier.gamma, Gamma::Auto);
    }

    #[test]
    fn partial_override() {
        let f = write_json(r#"{ "patch_size": 8, "classifier": { "gamma": { "fixed": 0.5 } } }"#);
        let config = PipelineConfig::load_from_file(f.path()).unwrap();
        assert_eq!(config.patch_size, 8);
        assert_eq!(config.poly_degree, 4);
        assert_eq!(config.classifier.gamma, Gamma::Fixed(0.5));
        assert_eq!(config.classifier.kernel_degree, 4.0);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let f = write_json(r#"{ "patch_size": 0 }"#);
        assert!(matches!(
            PipelineConfig::load_from_file(f.path()),
            Err(SegmentationError::InvalidConfig { parameter: "patch_size", .. })
        ));
        let f = write_json(r#"{ "foreground_threshold": 1.5 }"#);
        assert!(PipelineConfig::load_from_file(f.path()).is_err());
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let f = write_json("{ patch_size: 16 ");
        assert!(matches!(
            PipelineConfig::load_from_file(f.path()),
            Err(SegmentationError::Json(_))
        ));
    }
}
