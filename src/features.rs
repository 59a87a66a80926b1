//! Per-patch statistics and ground-truth label reduction.
//!
//! A patch is summarised by the mean and population standard deviation of
//! each colour channel: `[mean_c0, .., mean_cN, std_c0, .., std_cN]`.

use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::data::model::Label;
use crate::error::{Result, SegmentationError};

/// Mean ground-truth intensity a patch must strictly exceed to count as road.
pub const FOREGROUND_THRESHOLD: f64 = 0.25;

/// Length of the feature vector for a patch with `channels` channels.
pub fn feature_width(channels: usize) -> usize {
    2 * channels
}

/// Summarise one `(width, height, channels)` patch.
pub fn extract_features(patch: ArrayView3<'_, f64>) -> Result<Array1<f64>> {
    let (w, h, channels) = patch.dim();
    if w == 0 || h == 0 {
        return Err(SegmentationError::EmptyPatch);
    }
    let mut features = Array1::zeros(feature_width(channels));
    for (c, channel) in patch.axis_iter(Axis(2)).enumerate() {
        features[c] = channel.mean().ok_or(SegmentationError::EmptyPatch)?;
        features[channels + c] = channel.std(0.0);
    }
    Ok(features)
}

/// Feature matrix with one row per patch, rows in the same order as `patches`.
///
/// Every patch must have `channels` channels. No patches gives a
/// `(0, feature_width(channels))` matrix.
pub fn feature_matrix(patches: &[Array3<f64>], channels: usize) -> Result<Array2<f64>> {
    let width = feature_width(channels);

    let rows = patches
        .par_iter()
        .map(|patch| {
            if patch.dim().2 != channels {
                return Err(SegmentationError::shape(
                    "patch channels",
                    channels,
                    patch.dim().2,
                ));
            }
            extract_features(patch.view())
        })
        .collect::<Result<Vec<_>>>()?;

    let mut matrix = Array2::zeros((rows.len(), width));
    for (mut dst, row) in matrix.rows_mut().into_iter().zip(&rows) {
        dst.assign(row);
    }
    Ok(matrix)
}

/// Reduce a ground-truth patch to its label: road iff the mean strictly
/// exceeds `threshold`.
pub fn patch_label(gt_patch: ArrayView2<'_, f64>, threshold: f64) -> Result<Label> {
    let mean = gt_patch.mean().ok_or(SegmentationError::EmptyPatch)?;
    Ok(Label::from(mean > threshold))
}

/// Labels for a sequence of ground-truth patches, order preserved.
pub fn patch_labels(gt_patches: &[Array2<f64>], threshold: f64) -> Result<Vec<Label>> {
    gt_patches
        .par_iter()
        .map(|p| patch_label(p.view(), threshold))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn constant_patch_has_value_means_and_zero_std() {
        for &v in &[0.0, 0.3, 1.0] {
            let patch = Array3::from_elem((16, 16, 3), v);
            let f = extract_features(patch.view()).unwrap();
            assert_eq!(f.len(), 6);
            for c in 0..3 {
                assert!((f[c] - v).abs() < 1e-12);
                assert_eq!(f[3 + c], 0.0);
            }
        }
    }

    #[test]
    fn odd_sized_constant_patches_have_exactly_zero_std() {
        for &(w, h) in &[(5, 7), (13, 3), (16, 16)] {
            for &v in &[0.1, 0.3, 0.7, 0.9] {
                let patch = Array3::from_elem((w, h, 3), v);
                let f = extract_features(patch.view()).unwrap();
                for c in 0..3 {
                    assert!((f[c] - v).abs() < 1e-12);
                    assert_eq!(f[3 + c], 0.0, "std of {v} over {w}x{h}");
                }
            }
        }
    }

    #[test]
    fn features_keep_channel_order() {
        let patch = Array3::from_shape_fn((2, 2, 3), |(x, _, c)| match c {
            0 => 0.1,
            1 => 0.5,
            _ => x as f64,
        });
        let f = extract_features(patch.view()).unwrap();
        assert!((f[0] - 0.1).abs() < 1e-12);
        assert!((f[1] - 0.5).abs() < 1e-12);
        assert!((f[2] - 0.5).abs() < 1e-12);
        assert_eq!(f[3], 0.0);
        assert_eq!(f[4], 0.0);
        // population std of {0, 0, 1, 1}
        assert!((f[5] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_patch_is_an_error() {
        let patch = Array3::<f64>::zeros((0, 16, 3));
        assert!(matches!(
            extract_features(patch.view()),
            Err(SegmentationError::EmptyPatch)
        ));
    }

    #[test]
    fn feature_matrix_preserves_patch_order() {
        let patches: Vec<_> = (0..10)
            .map(|i| Array3::from_elem((4, 4, 3), i as f64 / 10.0))
            .collect();
        let m = feature_matrix(&patches, 3).unwrap();
        assert_eq!(m.dim(), (10, 6));
        for i in 0..10 {
            assert!((m[[i, 0]] - i as f64 / 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn feature_matrix_rejects_mixed_channels() {
        let patches = vec![Array3::zeros((4, 4, 3)), Array3::zeros((4, 4, 1))];
        assert!(feature_matrix(&patches, 3).is_err());
    }

    #[test]
    fn no_patches_keep_the_feature_width() {
        let m = feature_matrix(&[], 3).unwrap();
        assert_eq!(m.dim(), (0, 6));
    }

    #[test]
    fn threshold_comparison_is_strict() {
        let at = Array2::from_elem((4, 4), FOREGROUND_THRESHOLD);
        assert_eq!(
            patch_label(at.view(), FOREGROUND_THRESHOLD).unwrap(),
            Label::Background
        );
        // One pixel of four set: mean exactly 0.25.
        let quarter = array![[1.0, 0.0], [0.0, 0.0]];
        assert_eq!(
            patch_label(quarter.view(), FOREGROUND_THRESHOLD).unwrap(),
            Label::Background
        );
        let above = Array2::from_elem((4, 4), 0.26);
        assert_eq!(
            patch_label(above.view(), FOREGROUND_THRESHOLD).unwrap(),
            Label::Road
        );
    }
}
