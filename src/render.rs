use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{Image, Mask};

// ---------------------------------------------------------------------------
// Array → raster conversion
// ---------------------------------------------------------------------------

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// 8-bit RGB raster of the first three channels of `image`.
///
/// Images with fewer than three channels repeat their last channel.
pub fn image_to_rgb(image: &Image) -> RgbImage {
    let view = image.view();
    let last = image.channels() - 1;
    RgbImage::from_fn(image.width() as u32, image.height() as u32, |x, y| {
        let px = |c: usize| to_u8(view[[x as usize, y as usize, c.min(last)]]);
        Rgb([px(0), px(1), px(2)])
    })
}

/// 8-bit greyscale raster of a mask.
pub fn mask_to_luma(mask: &Mask) -> GrayImage {
    let view = mask.view();
    GrayImage::from_fn(mask.width() as u32, mask.height() as u32, |x, y| {
        Luma([to_u8(view[[x as usize, y as usize]])])
    })
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

const HIGHLIGHT_SATURATION: f32 = 0.85;

/// Mid-lightness colour for `hue` degrees at 85% saturation, so the other
/// channels keep a little of the underlying tone.
pub fn highlight_color(hue: f32) -> Rgb<u8> {
    let hsl = Hsl::new(hue, HIGHLIGHT_SATURATION, 0.5);
    let rgb: Srgb = hsl.into_color();
    Rgb([
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    ])
}

/// `image` with every pixel of `mask` blended towards the highlight colour
/// in proportion to the mask value times `alpha`.
pub fn overlay(image: &Image, mask: &Mask, hue: f32, alpha: f64) -> RgbImage {
    let mut out = image_to_rgb(image);
    let tint = highlight_color(hue);
    let m = mask.view();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let Some(&v) = m.get([x as usize, y as usize]) else {
            continue;
        };
        let w = (v.clamp(0.0, 1.0) * alpha).clamp(0.0, 1.0);
        for c in 0..3 {
            let blended = f64::from(px[c]) * (1.0 - w) + f64::from(tint[c]) * w;
            px[c] = blended.round() as u8;
        }
    }
    out
}
