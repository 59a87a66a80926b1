//! Train / classify orchestration.
//!
//! ```text
//!  images + masks ─▶ crop ─▶ extract_features ─▶ expand ─▶ SvmClassifier::train
//!  images ─────────▶ crop ─▶ extract_features ─▶ expand ─▶ SvmClassifier::predict ─▶ reconstruct
//! ```
//!
//! Patches of all images are flattened image-major, raster-minor. Feature
//! rows, labels and predictions all follow that order.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::{Array2, Array3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::{SvmClassifier, TrainingSummary};
use crate::config::PipelineConfig;
use crate::data::export::FeatureTable;
use crate::data::model::{Image, Label, Mask};
use crate::data::patch::{self, PatchGrid};
use crate::error::{Result, SegmentationError};
use crate::features;
use crate::poly::PolynomialFeatures;

const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of a trained model: the configuration plus the labelled
/// feature rows it was fitted on. Fitting is deterministic, so loading
/// refits and arrives at the same classifier.
#[derive(Debug, Serialize, Deserialize)]
struct ModelSnapshot {
    version: u32,
    config: PipelineConfig,
    features: Array2<f64>,
    labels: Vec<Label>,
}

/// Labelled rows the current fit was trained on.
struct TrainingData {
    features: Array2<f64>,
    labels: Vec<Label>,
}

/// Patch-based road segmentation model.
///
/// Owns its classifier exclusively; `classify` only works after a
/// successful `train` (or `load`).
pub struct SegmentationModel {
    config: PipelineConfig,
    expander: PolynomialFeatures,
    classifier: SvmClassifier,
    training: Option<TrainingData>,
}

impl SegmentationModel {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            expander: PolynomialFeatures::new(config.poly_degree),
            classifier: SvmClassifier::new(config.classifier),
            config,
            training: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.classifier.is_trained()
    }

    /// Back to the untrained state with the configured hyperparameters.
    pub fn reset(&mut self) {
        self.classifier = SvmClassifier::new(self.config.classifier);
        self.training = None;
    }

    /// Non-overlapping patch grid for an image of `shape`.
    pub fn patch_grid(&self, shape: (usize, usize)) -> Result<PatchGrid> {
        let grid = PatchGrid::non_overlapping(shape.0, shape.1, self.config.patch_size)?;
        if !grid.is_exact() {
            log::warn!(
                "image {}x{} is not a multiple of the {}px patch size; border patches are clipped",
                shape.0,
                shape.1,
                self.config.patch_size
            );
        }
        Ok(grid)
    }

    // -----------------------------------------------------------------------
    // Patch / label preparation
    // -----------------------------------------------------------------------

    /// Crop every image into patches, flattened image-major.
    fn crop_all(&self, images: &[Image]) -> Result<Vec<(PatchGrid, Vec<Array3<f64>>)>> {
        let grids = images
            .iter()
            .map(|img| self.patch_grid(img.shape()))
            .collect::<Result<Vec<_>>>()?;
        let padding = self.config.padding;
        images
            .par_iter()
            .zip(grids.par_iter())
            .map(|(img, grid)| -> Result<_> { Ok((*grid, patch::crop_image(img, grid, padding)?)) })
            .collect()
    }

    /// Per-patch feature table for labelled images.
    ///
    /// `masks[i]` is the ground truth of `images[i]`; both must give the same
    /// patch grid.
    pub fn prepare_table(&self, images: &[Image], masks: &[Mask]) -> Result<FeatureTable> {
        if images.len() != masks.len() {
            return Err(SegmentationError::shape("prepare (images vs masks)", images.len(), masks.len()));
        }
        let cropped = self.crop_all(images)?;

        let mut table = FeatureTable::default();
        for (index, ((grid, patches), mask)) in cropped.into_iter().zip(masks).enumerate() {
            let mask_grid = PatchGrid::non_overlapping(mask.width(), mask.height(), self.config.patch_size)?;
            if mask_grid != grid {
                return Err(SegmentationError::PatchGridMismatch {
                    index,
                    image: grid.to_string(),
                    mask: mask_grid.to_string(),
                });
            }
            let gt_patches = patch::crop_mask(mask, &mask_grid)?;
            let labels = features::patch_labels(&gt_patches, self.config.foreground_threshold)?;
            let rows = features::feature_matrix(&patches, images[index].channels())?;
            table.append(index, &grid, rows, labels)?;
        }
        log::info!(
            "prepared {} patches from {} images ({} road)",
            table.len(),
            images.len(),
            table.positives()
        );
        Ok(table)
    }

    /// Feature matrix and label vector for labelled images.
    pub fn prepare(&self, images: &[Image], masks: &[Mask]) -> Result<(Array2<f64>, Vec<Label>)> {
        let table = self.prepare_table(images, masks)?;
        Ok((table.features, table.labels))
    }

    /// Feature matrix for unlabelled images. All images must share a shape.
    pub fn extract_image_features(&self, images: &[Image]) -> Result<(Array2<f64>, PatchGrid)> {
        let shape = common_shape(images)?;
        let grid = self.patch_grid(shape)?;
        let patches: Vec<Array3<f64>> = self
            .crop_all(images)?
            .into_iter()
            .flat_map(|(_, p)| p)
            .collect();
        let channels = images.first().map_or(0, Image::channels);
        let features = features::feature_matrix(&patches, channels)?;
        log::debug!("extracted {:?} features from {} images", features.dim(), images.len());
        Ok((features, grid))
    }

    // -----------------------------------------------------------------------
    // Training
    // -----------------------------------------------------------------------

    /// Fit the classifier on `images` and their ground-truth `masks`,
    /// replacing any previous fit.
    pub fn train(&mut self, masks: &[Mask], images: &[Image]) -> Result<TrainingSummary> {
        let (features, labels) = self.prepare(images, masks)?;
        self.train_on_features(features, labels)
    }

    /// Fit on already extracted (not yet expanded) feature rows.
    pub fn train_on_features(&mut self, features: Array2<f64>, labels: Vec<Label>) -> Result<TrainingSummary> {
        let expanded = self.expander.expand(features.view())?;
        let summary = self.classifier.train(expanded.view(), &labels)?;
        log::info!(
            "trained on {} patches ({} road), {} expanded features, {} support vectors",
            summary.samples,
            summary.positives,
            summary.features,
            summary.support_vectors
        );
        self.training = Some(TrainingData { features, labels });
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Inference
    // -----------------------------------------------------------------------

    /// Predicted label of every patch of every image, plus the shared grid.
    pub fn predict_patches(&self, images: &[Image]) -> Result<(Vec<Label>, PatchGrid)> {
        if !self.is_trained() {
            return Err(SegmentationError::Untrained { operation: "classify" });
        }
        if images.is_empty() {
            return Ok((Vec::new(), PatchGrid::non_overlapping(0, 0, self.config.patch_size)?));
        }
        let (features, grid) = self.extract_image_features(images)?;
        let expanded = self.expander.expand(features.view())?;
        let labels = self.classifier.predict(expanded.view())?;
        Ok((labels, grid))
    }

    /// One predicted mask per input image.
    pub fn classify(&self, images: &[Image]) -> Result<Vec<Mask>> {
        let (labels, grid) = self.predict_patches(images)?;
        let road = labels.iter().filter(|l| l.is_road()).count();
        log::info!("classified {} patches, {road} road", labels.len());
        patch::reconstruct(&labels, images.len(), grid.image_shape(), self.config.patch_size)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let training = self
            .training
            .as_ref()
            .ok_or(SegmentationError::Untrained { operation: "save" })?;
        let snapshot = ModelSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            features: training.features.clone(),
            labels: training.labels.clone(),
        };
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        log::info!("saved model snapshot to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: ModelSnapshot = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SegmentationError::SnapshotVersion {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }
        let mut model = Self::new(snapshot.config)?;
        model.train_on_features(snapshot.features, snapshot.labels)?;
        log::info!("loaded model snapshot from {}", path.as_ref().display());
        Ok(model)
    }
}

fn common_shape(images: &[Image]) -> Result<(usize, usize)> {
    let Some(first) = images.first() else {
        return Ok((0, 0));
    };
    let shape = first.shape();
    if let Some(other) = images.iter().find(|img| img.shape() != shape) {
        return Err(SegmentationError::shape(
            "image shapes",
            format!("{shape:?}"),
            format!("{:?}", other.shape()),
        ));
    }
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_before_train_is_untrained() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 32, 3, 0.5).unwrap()];
        assert!(matches!(
            model.classify(&images),
            Err(SegmentationError::Untrained { operation: "classify" })
        ));
    }

    #[test]
    fn save_before_train_is_untrained() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            model.save(dir.path().join("model.json")),
            Err(SegmentationError::Untrained { operation: "save" })
        ));
    }

    #[test]
    fn zero_image_zero_mask_gives_two_background_patches() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 16, 3, 0.0).unwrap()];
        let masks = vec![Mask::filled(32, 16, 0.0)];
        let (x, y) = model.prepare(&images, &masks).unwrap();
        assert_eq!(x.dim(), (2, 6));
        assert_eq!(y, vec![Label::Background, Label::Background]);
    }

    #[test]
    fn zero_image_full_mask_gives_two_road_patches() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 16, 3, 0.0).unwrap()];
        let masks = vec![Mask::filled(32, 16, 1.0)];
        let (_, y) = model.prepare(&images, &masks).unwrap();
        assert_eq!(y, vec![Label::Road, Label::Road]);
    }

    #[test]
    fn mask_with_other_grid_is_rejected() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 32, 3, 0.0).unwrap()];
        let masks = vec![Mask::filled(32, 16, 0.0)];
        assert!(matches!(
            model.prepare(&images, &masks),
            Err(SegmentationError::PatchGridMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn unpaired_masks_are_rejected() {
        let model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 32, 3, 0.0).unwrap()];
        assert!(matches!(
            model.prepare(&images, &[]),
            Err(SegmentationError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn padding_changes_features_not_labels() {
        let config = PipelineConfig {
            padding: 4,
            ..PipelineConfig::default()
        };
        let model = SegmentationModel::new(config).unwrap();
        let images = vec![Image::filled(32, 32, 3, 0.2).unwrap()];
        let masks = vec![Mask::filled(32, 32, 1.0)];
        let (x, y) = model.prepare(&images, &masks).unwrap();
        assert_eq!(x.dim(), (4, 6));
        assert!(y.iter().all(|l| l.is_road()));
    }

    #[test]
    fn single_class_training_is_degenerate() {
        let mut model = SegmentationModel::new(PipelineConfig::default()).unwrap();
        let images = vec![Image::filled(32, 32, 3, 0.0).unwrap()];
        let masks = vec![Mask::filled(32, 32, 0.0)];
        assert!(matches!(
            model.train(&masks, &images),
            Err(SegmentationError::DegenerateLabels { classes: 1 })
        ));
        assert!(!model.is_trained());
    }

    #[test]
    fn unequal_shapes_are_rejected_for_inference() {
        let images = vec![
            Image::filled(32, 32, 3, 0.0).unwrap(),
            Image::filled(16, 32, 3, 0.0).unwrap(),
        ];
        assert!(common_shape(&images).is_err());
    }
}
