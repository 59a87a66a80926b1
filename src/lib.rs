//! # Rusty Roads
//!
//! Road / background segmentation of aerial images, one square patch at a
//! time. Each patch is summarised by its per-channel mean and standard
//! deviation, the summary is expanded into a polynomial basis and a
//! polynomial-kernel SVM decides whether the patch is road.
//!
//! ```no_run
//! use rusty_roads::{load_dataset, PipelineConfig, SegmentationModel};
//! use std::path::Path;
//!
//! # fn main() -> rusty_roads::Result<()> {
//! let train = load_dataset(Path::new("training/images"), Path::new("training/groundtruth"), None)?;
//! let mut model = SegmentationModel::new(PipelineConfig::default())?;
//! model.train(&train.masks, &train.images)?;
//! let masks = model.classify(&train.images)?;
//! assert_eq!(masks.len(), train.len());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod metrics;
pub mod pipeline;
pub mod poly;
pub mod render;

pub use classifier::{ClassifierConfig, Gamma, SvmClassifier, TrainingSummary};
pub use config::PipelineConfig;
pub use data::export::{write_feature_table, write_patch_predictions, FeatureTable};
pub use data::loader::{load_dataset, load_image, load_images, load_mask, Dataset};
pub use data::model::{Image, Label, Mask};
pub use data::patch::{crop_image, crop_mask, reconstruct, PatchGrid};
pub use error::{Result, SegmentationError};
pub use features::{extract_features, FOREGROUND_THRESHOLD};
pub use metrics::PatchMetrics;
pub use pipeline::SegmentationModel;
pub use poly::PolynomialFeatures;
