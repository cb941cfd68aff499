//! Region picking against a segmentation map.
//!
//! While a map is displayed on the detection surface, hovering reads the
//! map color under the pointer and clicking promotes every pixel of that
//! color into the mask.

use image::{Rgba, RgbaImage};
use imageproc::point::Point;
use palette::Srgb;

use crate::colors::{self, HIGHLIGHT_RGB};
use crate::composite::{self, CompositeOp};

/// Hover state over a displayed segmentation map.
#[derive(Debug, Clone)]
pub struct RegionPicker {
    map: RgbaImage,
    hovered: Option<Srgb<u8>>,
}

impl RegionPicker {
    /// Starts picking on `map`, as returned by the service.
    pub fn new(map: RgbaImage) -> Self {
        Self { map, hovered: None }
    }

    /// The segmentation map at its original resolution.
    pub fn map(&self) -> &RgbaImage {
        &self.map
    }

    pub fn hovered(&self) -> Option<Srgb<u8>> {
        self.hovered
    }

    /// Updates the hovered color from the detection pixel under `at`
    /// (surface coordinates).
    ///
    /// Black (or nearly black) background and positions off the surface
    /// clear the hover. Returns `true` when the hovered color changed.
    pub fn hover(&mut self, detection: &RgbaImage, at: Point<f32>, threshold: u8) -> bool {
        let next = sample(detection, at)
            .filter(|pixel| pixel[3] > 0 && colors::is_lit(pixel, threshold))
            .map(|pixel| colors::srgb_of(&pixel));
        let changed = next != self.hovered;
        self.hovered = next;
        changed
    }

    /// Forgets the hovered color. Returns `true` if one was set.
    pub fn clear_hover(&mut self) -> bool {
        self.hovered.take().is_some()
    }

    /// Builds the hover preview: matching pixels in translucent white with
    /// `mask` composited on top, so existing coverage stays visible.
    ///
    /// `None` when nothing is hovered.
    pub fn highlight(
        &self,
        detection: &RgbaImage,
        mask: &RgbaImage,
        tolerance: u8,
        alpha: u8,
    ) -> Option<RgbaImage> {
        let color = self.hovered?;
        let mut preview = match_mask(detection, color, tolerance, colors::with_alpha(HIGHLIGHT_RGB, alpha));
        composite::apply_layer(&mut preview, mask, CompositeOp::SourceOver);
        Some(preview)
    }

    /// Rasterizes the hovered region as an opaque white mask on a
    /// transparent background, ready for colorizing.
    ///
    /// `None` when nothing is hovered.
    pub fn pick(&self, detection: &RgbaImage, tolerance: u8) -> Option<RgbaImage> {
        let color = self.hovered?;
        Some(match_mask(
            detection,
            color,
            tolerance,
            colors::with_alpha(HIGHLIGHT_RGB, 255),
        ))
    }
}

/// Paints `fill` wherever `detection` is within `tolerance` of `color` on
/// every channel; every other pixel is transparent.
pub fn match_mask(detection: &RgbaImage, color: Srgb<u8>, tolerance: u8, fill: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_fn(detection.width(), detection.height(), |x, y| {
        if colors::matches_within(detection.get_pixel(x, y), color, tolerance) {
            fill
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn sample(image: &RgbaImage, at: Point<f32>) -> Option<Rgba<u8>> {
    if at.x < 0.0 || at.y < 0.0 {
        return None;
    }
    image.get_pixel_checked(at.x as u32, at.y as u32).copied()
}
