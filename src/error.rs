use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Everything the segmentation pipeline can refuse to do.
///
/// Shape and ordering problems are reported as soon as they are detected;
/// nothing is retried or patched up locally.
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// Row counts, feature widths or image counts disagree.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: String,
        expected: String,
        got: String,
    },

    /// An image and its ground-truth mask do not produce the same patch grid.
    #[error("image {index}: patch grid {image} does not match ground-truth grid {mask}")]
    PatchGridMismatch {
        index: usize,
        image: String,
        mask: String,
    },

    /// Prediction-side operation called before a successful `train`.
    #[error("model is not trained: `{operation}` requires a successful train() first")]
    Untrained { operation: &'static str },

    /// Training labels do not contain both classes.
    #[error("degenerate training set: need two label classes, found {classes}")]
    DegenerateLabels { classes: usize },

    /// A patch with zero spatial extent reached the feature extractor.
    #[error("patch has zero spatial extent")]
    EmptyPatch,

    #[error("label value {0} is not binary (expected 0 or 1)")]
    InvalidLabel(u8),

    #[error("invalid configuration for `{parameter}`: {reason}")]
    InvalidConfig {
        parameter: &'static str,
        reason: String,
    },

    /// Failure reported by the external SVM implementation.
    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    SnapshotVersion { expected: u32, found: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl SegmentationError {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl ToString,
        got: impl ToString,
    ) -> Self {
        SegmentationError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
