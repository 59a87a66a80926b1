use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3};

use super::export::extension;
use super::model::{Image, Mask};
use crate::error::{Result, SegmentationError};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an RGB image, scaled into `[0, 1]`, axes `(width, height, 3)`.
///
/// Supported formats:
/// * `.png` – any colour type; alpha is dropped, grey is replicated
pub fn load_image(path: &Path) -> Result<Image> {
    check_format(path)?;
    let rgb = image::open(path)?.into_rgb8();
    let (w, h) = rgb.dimensions();
    let pixels = Array3::from_shape_fn((w as usize, h as usize, 3), |(x, y, c)| {
        f64::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0
    });
    Image::new(pixels)
}

/// Load a ground-truth mask as 8-bit luma, scaled into `[0, 1]`.
pub fn load_mask(path: &Path) -> Result<Mask> {
    check_format(path)?;
    let luma = image::open(path)?.into_luma8();
    let (w, h) = luma.dimensions();
    let values = Array2::from_shape_fn((w as usize, h as usize), |(x, y)| {
        f64::from(luma.get_pixel(x as u32, y as u32)[0]) / 255.0
    });
    Ok(Mask::new(values))
}

fn check_format(path: &Path) -> Result<()> {
    match extension(path).as_str() {
        "png" => Ok(()),
        other => Err(SegmentationError::UnsupportedFormat(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Directory loaders
// ---------------------------------------------------------------------------

/// A set of images, optionally with their ground truth, in file-name order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// File names (not full paths) of the images.
    pub names: Vec<String>,
    pub images: Vec<Image>,
    /// Empty for inference-only datasets.
    pub masks: Vec<Mask>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// PNG files directly inside `dir`, sorted by file name.
fn list_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && extension(&path) == "png" {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Load the PNG images of `dir` without ground truth.
pub fn load_images(dir: &Path, limit: Option<usize>) -> Result<Dataset> {
    let mut paths = list_pngs(dir)?;
    if let Some(n) = limit {
        paths.truncate(n);
    }
    let mut dataset = Dataset::default();
    for path in &paths {
        dataset.names.push(file_name(path));
        dataset.images.push(load_image(path)?);
    }
    log::info!("loaded {} images from {}", dataset.len(), dir.display());
    Ok(dataset)
}

/// Load the PNG images of `images_dir`, each paired with the file of the
/// same name in `groundtruth_dir`.
pub fn load_dataset(images_dir: &Path, groundtruth_dir: &Path, limit: Option<usize>) -> Result<Dataset> {
    let mut paths = list_pngs(images_dir)?;
    if let Some(n) = limit {
        paths.truncate(n);
    }
    let mut dataset = Dataset::default();
    for path in &paths {
        let name = file_name(path);
        let gt_path = groundtruth_dir.join(&name);
        if !gt_path.is_file() {
            return Err(SegmentationError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no ground truth for {name} in {}", groundtruth_dir.display()),
            )));
        }
        dataset.images.push(load_image(path)?);
        dataset.masks.push(load_mask(&gt_path)?);
        dataset.names.push(name);
    }
    log::info!(
        "loaded {} image/ground-truth pairs from {}",
        dataset.len(),
        images_dir.display()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn write_pair(dir: &Path, name: &str, value: u8) {
        std::fs::create_dir_all(dir.join("images")).unwrap();
        std::fs::create_dir_all(dir.join("groundtruth")).unwrap();
        let mut img = RgbImage::from_pixel(8, 4, Rgb([value, 0, 255]));
        img.put_pixel(7, 0, Rgb([0, 0, 0]));
        img.save(dir.join("images").join(name)).unwrap();
        GrayImage::from_pixel(8, 4, Luma([value]))
            .save(dir.join("groundtruth").join(name))
            .unwrap();
    }

    #[test]
    fn image_is_scaled_and_indexed_by_x_then_y() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a.png", 255);
        let img = load_image(&dir.path().join("images/a.png")).unwrap();
        assert_eq!(img.shape(), (8, 4));
        assert_eq!(img.view()[[0, 0, 0]], 1.0);
        assert_eq!(img.view()[[0, 0, 1]], 0.0);
        assert_eq!(img.view()[[0, 0, 2]], 1.0);
        assert_eq!(img.view()[[7, 0, 2]], 0.0);
    }

    #[test]
    fn pairs_are_loaded_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "b.png", 0);
        write_pair(dir.path(), "a.png", 255);
        let ds = load_dataset(&dir.path().join("images"), &dir.path().join("groundtruth"), None).unwrap();
        assert_eq!(ds.names, vec!["a.png", "b.png"]);
        assert_eq!(ds.masks[0].view()[[0, 0]], 1.0);
        assert_eq!(ds.masks[1].view()[[0, 0]], 0.0);

        let limited = load_images(&dir.path().join("images"), Some(1)).unwrap();
        assert_eq!(limited.names, vec!["a.png"]);
        assert!(limited.masks.is_empty());
    }

    #[test]
    fn missing_ground_truth_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), "a.png", 0);
        std::fs::remove_file(dir.path().join("groundtruth/a.png")).unwrap();
        assert!(load_dataset(&dir.path().join("images"), &dir.path().join("groundtruth"), None).is_err());
    }

    #[test]
    fn non_png_is_unsupported() {
        assert!(matches!(
            load_image(Path::new("photo.jpg")),
            Err(SegmentationError::UnsupportedFormat(_))
        ));
    }
}
