use std::fmt;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SegmentationError};

// ---------------------------------------------------------------------------
// Image – one RGB(ish) input picture
// ---------------------------------------------------------------------------

/// A colour image with values in `[0, 1]`.
///
/// Axes are `(width, height, channels)`, i.e. `pixels[[x, y, c]]`. The
/// pipeline only reads images; ownership stays with the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: Array3<f64>,
}

impl Image {
    /// Wrap a `(width, height, channels)` array. At least one channel is required.
    pub fn new(pixels: Array3<f64>) -> Result<Self> {
        if pixels.dim().2 == 0 {
            return Err(SegmentationError::shape("image channels", ">= 1", 0));
        }
        Ok(Image { pixels })
    }

    /// An image where every channel of every pixel equals `value`.
    pub fn filled(width: usize, height: usize, channels: usize, value: f64) -> Result<Self> {
        Self::new(Array3::from_elem((width, height, channels), value))
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    /// `(width, height)` of the spatial grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.pixels.view()
    }

    pub fn into_array(self) -> Array3<f64> {
        self.pixels
    }
}

// ---------------------------------------------------------------------------
// Mask – ground truth or prediction
// ---------------------------------------------------------------------------

/// A single-channel mask with values in `[0, 1]`, axes `(width, height)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    values: Array2<f64>,
}

impl Mask {
    pub fn new(values: Array2<f64>) -> Self {
        Mask { values }
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Mask::new(Array2::from_elem((width, height), value))
    }

    pub fn width(&self) -> usize {
        self.values.dim().0
    }

    pub fn height(&self) -> usize {
        self.values.dim().1
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_array(self) -> Array2<f64> {
        self.values
    }
}

// ---------------------------------------------------------------------------
// Label – binary patch class
// ---------------------------------------------------------------------------

/// Class of one patch. Serialized as the integer `0` or `1`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Background,
    Road,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Background => 0,
            Label::Road => 1,
        }
    }

    /// Pixel value used when the label is broadcast back into a mask.
    pub fn as_f64(self) -> f64 {
        f64::from(self.as_u8())
    }

    pub fn is_road(self) -> bool {
        self == Label::Road
    }
}

impl From<bool> for Label {
    fn from(road: bool) -> Self {
        if road {
            Label::Road
        } else {
            Label::Background
        }
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.as_u8()
    }
}

impl TryFrom<u8> for Label {
    type Error = SegmentationError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Label::Background),
            1 => Ok(Label::Road),
            other => Err(SegmentationError::InvalidLabel(other)),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_axes_are_width_height_channels() {
        let img = Image::filled(32, 24, 3, 0.5).unwrap();
        assert_eq!(img.shape(), (32, 24));
        assert_eq!(img.channels(), 3);
    }

    #[test]
    fn image_without_channels_is_rejected() {
        let err = Image::new(Array3::zeros((4, 4, 0))).unwrap_err();
        assert!(matches!(err, SegmentationError::ShapeMismatch { .. }));
    }

    #[test]
    fn label_accepts_only_binary_values() {
        assert_eq!(Label::try_from(0).unwrap(), Label::Background);
        assert_eq!(Label::try_from(1).unwrap(), Label::Road);
        assert!(matches!(
            Label::try_from(2),
            Err(SegmentationError::InvalidLabel(2))
        ));
    }

    #[test]
    fn label_serializes_as_integer() {
        let json = serde_json::to_string(&vec![Label::Road, Label::Background]).unwrap();
        assert_eq!(json, "[1,0]");
        let back: Vec<Label> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Label::Road, Label::Background]);
        assert!(serde_json::from_str::<Label>("7").is_err());
    }
}
