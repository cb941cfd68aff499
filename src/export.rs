//! Conversion of mask coverage into the exported black/white mask.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::colors;
use crate::error::Result;
use crate::inline::InlineImage;
use crate::surface::fit_to;

const SELECTED: Rgba<u8> = Rgba([255, 255, 255, 255]);
const UNSELECTED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Whether a pixel counts as selected.
///
/// A pixel is selected when it is visible and not black. Coverage is
/// always colored, so for the mask surface this is simply `alpha > 0`; for
/// an already exported mask it picks the white pixels, which keeps
/// [`binarize`] idempotent.
pub fn is_selected(pixel: &Rgba<u8>) -> bool {
    pixel[3] > 0 && colors::is_lit(pixel, 0)
}

/// Maps every pixel to opaque white (selected) or opaque black.
///
/// # Examples
///
/// ```
/// use image::{Rgba, RgbaImage};
/// use mask_refine::export::binarize;
///
/// let mut coverage = RgbaImage::new(2, 1);
/// coverage.put_pixel(0, 0, Rgba([255, 0, 0, 12]));
/// let mask = binarize(&coverage);
/// assert_eq!(*mask.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
/// assert_eq!(*mask.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
/// assert_eq!(binarize(&mask), mask);
/// ```
pub fn binarize(image: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        if is_selected(image.get_pixel(x, y)) {
            SELECTED
        } else {
            UNSELECTED
        }
    })
}

/// Resamples the mask surface to the image's native resolution and
/// binarizes it.
pub fn export_mask(mask: &RgbaImage, native: (u32, u32)) -> RgbaImage {
    binarize(&fit_to(mask, native, FilterType::Triangle))
}

/// [`export_mask`] encoded as inline PNG.
pub fn export_png(mask: &RgbaImage, native: (u32, u32)) -> Result<InlineImage> {
    InlineImage::encode_png(&export_mask(mask, native))
}
