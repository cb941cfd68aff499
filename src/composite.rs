//! Straight-alpha compositing on RGBA rasters.
//!
//! Only the two operators the editor needs are provided: `source-over`
//! (paint on top) and `destination-out` (remove coverage where the source
//! is opaque).

use image::math::Rect;
use image::{GrayImage, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    DestinationOut,
}

/// Blends `src` over `dst` in place.
#[inline]
pub(crate) fn source_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    if src[3] == 0 {
        return;
    }
    if src[3] == 255 || dst[3] == 0 {
        *dst = src;
        return;
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for c in 0..3 {
        let value = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Removes coverage from `dst` in proportion to `src_alpha`.
#[inline]
pub(crate) fn destination_out(dst: &mut Rgba<u8>, src_alpha: u8) {
    if src_alpha == 0 {
        return;
    }
    let remaining = f32::from(dst[3]) * (1.0 - f32::from(src_alpha) / 255.0);
    let alpha = remaining.round() as u8;
    if alpha == 0 {
        *dst = Rgba([0, 0, 0, 0]);
    } else {
        dst[3] = alpha;
    }
}

/// Applies a single-color shape to `dst`.
///
/// `coverage` is a grayscale stamp (255 = inside the shape) positioned at
/// `origin` on `dst`. The shape's alpha is `color`'s alpha scaled by the
/// stamp value. Stamp pixels falling outside `dst` are ignored.
pub(crate) fn apply_stamp(
    dst: &mut RgbaImage,
    coverage: &GrayImage,
    origin: (u32, u32),
    color: Rgba<u8>,
    op: CompositeOp,
) {
    let (width, height) = dst.dimensions();
    for (sx, sy, value) in coverage.enumerate_pixels() {
        let stamp = value[0];
        if stamp == 0 {
            continue;
        }
        let (x, y) = (origin.0 + sx, origin.1 + sy);
        if x >= width || y >= height {
            continue;
        }
        let alpha = (u16::from(color[3]) * u16::from(stamp) / 255) as u8;
        let pixel = dst.get_pixel_mut(x, y);
        match op {
            CompositeOp::SourceOver => {
                source_over(pixel, Rgba([color[0], color[1], color[2], alpha]));
            }
            CompositeOp::DestinationOut => destination_out(pixel, alpha),
        }
    }
}

/// Composites a same-sized layer onto `dst`.
///
/// Layers of a different size are ignored; surfaces are always allocated in
/// lockstep, so a mismatch means the layer is stale.
pub(crate) fn apply_layer(dst: &mut RgbaImage, layer: &RgbaImage, op: CompositeOp) -> bool {
    if dst.dimensions() != layer.dimensions() {
        return false;
    }
    for (pixel, src) in dst.pixels_mut().zip(layer.pixels()) {
        match op {
            CompositeOp::SourceOver => source_over(pixel, *src),
            CompositeOp::DestinationOut => destination_out(pixel, src[3]),
        }
    }
    true
}

/// Allocates an empty stamp covering `rect`.
pub(crate) fn stamp_for(rect: &Rect) -> GrayImage {
    GrayImage::new(rect.width, rect.height)
}

/// True if any pixel of `image` carries alpha.
pub(crate) fn any_alpha(image: &RgbaImage) -> bool {
    image.pixels().any(|p| p[3] > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn over_transparent_takes_source() {
        let mut dst = Rgba([0, 0, 0, 0]);
        source_over(&mut dst, Rgba([255, 0, 0, 179]));
        assert_eq!(dst, Rgba([255, 0, 0, 179]));
    }

    #[test]
    fn over_accumulates_alpha() {
        let mut dst = Rgba([255, 0, 0, 128]);
        source_over(&mut dst, Rgba([255, 0, 0, 128]));
        // 0.502 + 0.502 * 0.498 = 0.752
        assert_eq!(dst, Rgba([255, 0, 0, 192]));
    }

    #[test]
    fn over_mixes_colors_by_alpha() {
        let mut dst = Rgba([0, 0, 255, 255]);
        source_over(&mut dst, Rgba([255, 0, 0, 51]));
        assert_eq!(dst, Rgba([51, 0, 204, 255]));
    }

    #[test]
    fn destination_out_with_opaque_source_clears() {
        let mut dst = Rgba([255, 0, 0, 179]);
        destination_out(&mut dst, 255);
        assert_eq!(dst, Rgba([0, 0, 0, 0]));

        let mut partial = Rgba([255, 0, 0, 200]);
        destination_out(&mut partial, 128);
        assert_eq!(partial, Rgba([255, 0, 0, 100]));
    }

    #[test]
    fn stamp_is_clipped_to_destination() {
        let mut dst = RgbaImage::new(4, 4);
        let stamp = GrayImage::from_pixel(3, 3, Luma([255]));
        apply_stamp(
            &mut dst,
            &stamp,
            (2, 2),
            Rgba([255, 0, 0, 255]),
            CompositeOp::SourceOver,
        );
        let covered = dst.pixels().filter(|p| p[3] > 0).count();
        assert_eq!(covered, 4);
        assert_eq!(*dst.get_pixel(3, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn mismatched_layer_is_rejected() {
        let mut dst = RgbaImage::new(4, 4);
        let layer = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        assert!(!apply_layer(&mut dst, &layer, CompositeOp::SourceOver));
        assert!(!any_alpha(&dst));
    }
}
