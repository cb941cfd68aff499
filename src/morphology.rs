//! Feather, expand and contract on the mask surface.
//!
//! None of these are exact morphology. They reproduce what a 2D canvas
//! does with a blur filter or a soft drop shadow:
//!
//! * **feather** composites a Gaussian-blurred copy of the coverage over
//!   itself, grading the alpha at the boundary;
//! * **expand** casts a red soft shadow from the covered silhouette and
//!   redraws the snapshot on top, growing coverage outward;
//! * **contract** casts the same soft shadow from the *uncovered* area and
//!   clears every covered pixel it reaches, shrinking coverage inward.
//!
//! Expand and contract use the same radius and shadow strength, so on
//! straight edges one undoes the other; corners drift slightly.
//!
//! Radii are in surface pixels. Shadow radii follow the canvas convention
//! of a Gaussian with standard deviation `radius / 2`; the feather radius
//! is the standard deviation itself.

use image::{ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

use crate::colors::{self, COVERAGE_RGB};
use crate::composite::{self, CompositeOp};

type Plane = ImageBuffer<Luma<u16>, Vec<u16>>;

const FULL: u16 = u16::MAX;

/// Softens coverage edges. Returns `false` (and leaves `mask` alone) when
/// the mask is empty or `radius` is not positive.
pub fn feather(mask: &mut RgbaImage, radius: f32) -> bool {
    if !composite::any_alpha(mask) || radius <= 0.0 {
        return false;
    }
    let alpha = Plane::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([u16::from(mask.get_pixel(x, y)[3]) * 257])
    });
    let blurred = gaussian_blur_f32(&alpha, radius);
    let layer = shadow_layer(&blurred, 1.0);
    composite::apply_layer(mask, &layer, CompositeOp::SourceOver)
}

/// Approximate dilation by `radius`. `strength` is the shadow's alpha
/// (the coverage alpha as a fraction).
pub fn expand(mask: &mut RgbaImage, radius: f32, strength: f32) -> bool {
    if !composite::any_alpha(mask) || radius <= 0.0 {
        return false;
    }
    let snapshot = mask.clone();
    let shadow = shadow_layer(&gaussian_blur_f32(&silhouette(&snapshot, true), radius / 2.0), strength);
    for _ in 0..2 {
        composite::apply_layer(mask, &shadow, CompositeOp::SourceOver);
        composite::apply_layer(mask, &snapshot, CompositeOp::SourceOver);
    }
    true
}

/// Approximate erosion by `radius`, the counterpart of [`expand`].
pub fn contract(mask: &mut RgbaImage, radius: f32, strength: f32) -> bool {
    if !composite::any_alpha(mask) || radius <= 0.0 {
        return false;
    }
    let shadow = shadow_layer(&gaussian_blur_f32(&silhouette(mask, false), radius / 2.0), strength);
    // The shadow is hard-edged for destination-out: any pixel it reaches goes.
    for (pixel, shade) in mask.pixels_mut().zip(shadow.pixels()) {
        if shade[3] > 0 {
            composite::destination_out(pixel, 255);
        }
    }
    true
}

/// Number of pixels with any coverage.
pub fn coverage_area(mask: &RgbaImage) -> usize {
    mask.pixels().filter(|p| p[3] > 0).count()
}

/// `FULL` where the pixel's coverage state equals `covered`, else zero.
fn silhouette(mask: &RgbaImage, covered: bool) -> Plane {
    Plane::from_fn(mask.width(), mask.height(), |x, y| {
        let is_covered = mask.get_pixel(x, y)[3] > 0;
        Luma([if is_covered == covered { FULL } else { 0 }])
    })
}

/// Turns a blurred plane into a red layer whose alpha is the plane value
/// scaled by `strength`.
fn shadow_layer(plane: &Plane, strength: f32) -> RgbaImage {
    RgbaImage::from_fn(plane.width(), plane.height(), |x, y| {
        let level = f32::from(plane.get_pixel(x, y)[0]) / f32::from(FULL);
        let alpha = (level * strength * 255.0).round().clamp(0.0, 255.0) as u8;
        if alpha == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            colors::with_alpha(COVERAGE_RGB, alpha)
        }
    })
}
