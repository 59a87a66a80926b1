use ndarray::{s, Array2, Array3};

use super::model::{Image, Label, Mask};
use crate::error::{Result, SegmentationError};

// ---------------------------------------------------------------------------
// PatchGrid – where the patches of one image sit
// ---------------------------------------------------------------------------

/// Placement of square patches over a `width × height` image.
///
/// Patches start every `stride` pixels along both axes. Patches touching the
/// right or bottom border are clipped, so an image whose sides are not a
/// multiple of the stride still has every pixel covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGrid {
    width: usize,
    height: usize,
    patch_size: usize,
    stride: usize,
}

impl PatchGrid {
    pub fn new(width: usize, height: usize, patch_size: usize, stride: usize) -> Result<Self> {
        if patch_size == 0 {
            return Err(SegmentationError::InvalidConfig {
                parameter: "patch_size",
                reason: "must be at least 1".into(),
            });
        }
        if stride == 0 {
            return Err(SegmentationError::InvalidConfig {
                parameter: "stride",
                reason: "must be at least 1".into(),
            });
        }
        Ok(PatchGrid {
            width,
            height,
            patch_size,
            stride,
        })
    }

    /// Grid where the stride equals the patch size.
    pub fn non_overlapping(width: usize, height: usize, patch_size: usize) -> Result<Self> {
        Self::new(width, height, patch_size, patch_size)
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    pub fn image_shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of patch positions along the x axis.
    pub fn columns(&self) -> usize {
        self.width.div_ceil(self.stride)
    }

    /// Number of patch positions along the y axis.
    pub fn rows(&self) -> usize {
        self.height.div_ceil(self.stride)
    }

    /// Patches per image.
    pub fn len(&self) -> usize {
        self.columns() * self.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every patch has the full `patch_size × patch_size` footprint.
    pub fn is_exact(&self) -> bool {
        self.width % self.patch_size == 0 && self.height % self.patch_size == 0
    }

    /// Top-left pixel of each patch in raster order: rows top to bottom,
    /// and within a row left to right.
    pub fn origins(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.rows()).flat_map(move |row| {
            (0..self.columns()).map(move |col| (col * self.stride, row * self.stride))
        })
    }

    /// Clipped pixel extent `[x0, x1) × [y0, y1)` of the patch at `origin`.
    fn footprint(&self, (x, y): (usize, usize)) -> (usize, usize, usize, usize) {
        (
            x,
            (x + self.patch_size).min(self.width),
            y,
            (y + self.patch_size).min(self.height),
        )
    }
}

impl std::fmt::Display for PatchGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} patches of {}px over {}x{}",
            self.columns(),
            self.rows(),
            self.patch_size,
            self.width,
            self.height
        )
    }
}

// ---------------------------------------------------------------------------
// Cropping
// ---------------------------------------------------------------------------

/// Mirror an out-of-range coordinate back into `0..len` without repeating the
/// edge pixel (`-1 → 1`, `len → len - 2`).
fn reflect(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let i = index.rem_euclid(period);
    if i >= len as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}

/// Cut `image` into the patches of `grid`, in raster order.
///
/// With `padding > 0` every patch is grown by `padding` pixels on each side;
/// pixels outside the image are filled by reflection.
pub fn crop_image(image: &Image, grid: &PatchGrid, padding: usize) -> Result<Vec<Array3<f64>>> {
    check_grid(grid, image.shape(), "crop_image")?;
    let view = image.view();
    let channels = image.channels();
    let (width, height) = image.shape();

    let patches = grid
        .origins()
        .map(|origin| {
            let (x0, x1, y0, y1) = grid.footprint(origin);
            if padding == 0 {
                return view.slice(s![x0..x1, y0..y1, ..]).to_owned();
            }
            let pad = padding as isize;
            // Window in padded coordinates, clipped to the padded image.
            let start_x = x0 as isize - pad;
            let start_y = y0 as isize - pad;
            let end_x = (x0 + grid.patch_size + padding).min(width + padding) as isize;
            let end_y = (y0 + grid.patch_size + padding).min(height + padding) as isize;
            let dims = ((end_x - start_x) as usize, (end_y - start_y) as usize, channels);
            Array3::from_shape_fn(dims, |(i, j, c)| {
                let sx = reflect(start_x + i as isize, width);
                let sy = reflect(start_y + j as isize, height);
                view[[sx, sy, c]]
            })
        })
        .collect();
    Ok(patches)
}

/// Cut a ground-truth mask into the patches of `grid`, in raster order.
pub fn crop_mask(mask: &Mask, grid: &PatchGrid) -> Result<Vec<Array2<f64>>> {
    check_grid(grid, mask.shape(), "crop_mask")?;
    let view = mask.view();
    Ok(grid
        .origins()
        .map(|origin| {
            let (x0, x1, y0, y1) = grid.footprint(origin);
            view.slice(s![x0..x1, y0..y1]).to_owned()
        })
        .collect())
}

fn check_grid(grid: &PatchGrid, shape: (usize, usize), context: &str) -> Result<()> {
    if grid.image_shape() != shape {
        return Err(SegmentationError::shape(
            context,
            format!("{:?}", grid.image_shape()),
            format!("{shape:?}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Regroup a flat sequence of patch labels into one mask per image.
///
/// `labels` must be in the order produced by cropping: image 0's patches in
/// raster order, then image 1's, and so on. Each label is broadcast over its
/// whole (clipped) patch footprint.
pub fn reconstruct(
    labels: &[Label],
    image_count: usize,
    image_shape: (usize, usize),
    patch_size: usize,
) -> Result<Vec<Mask>> {
    let grid = PatchGrid::non_overlapping(image_shape.0, image_shape.1, patch_size)?;
    let expected = image_count * grid.len();
    if labels.len() != expected {
        return Err(SegmentationError::shape(
            "reconstruct label count",
            format!("{image_count} images x {} patches = {expected}", grid.len()),
            labels.len(),
        ));
    }
    if grid.is_empty() {
        return Ok((0..image_count)
            .map(|_| Mask::filled(image_shape.0, image_shape.1, 0.0))
            .collect());
    }

    let masks = labels
        .chunks(grid.len())
        .map(|image_labels| {
            let mut values = Array2::<f64>::zeros(image_shape);
            for (origin, label) in grid.origins().zip(image_labels) {
                let (x0, x1, y0, y1) = grid.footprint(origin);
                values
                    .slice_mut(s![x0..x1, y0..y1])
                    .fill(label.as_f64());
            }
            Mask::new(values)
        })
        .collect();
    Ok(masks)
}
