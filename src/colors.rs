use image::Rgba;
use palette::{FromColor, Hsl, Srgb};

/// Color of mask coverage (alpha is supplied separately).
pub(crate) const COVERAGE_RGB: [u8; 3] = [255, 0, 0];

/// Color of the region-pick hover highlight.
pub(crate) const HIGHLIGHT_RGB: [u8; 3] = [255, 255, 255];

/// Fill of the point-select marker.
pub(crate) const MARKER_FILL: [u8; 3] = [255, 0, 255];

/// Outline of the point-select marker.
pub(crate) const MARKER_OUTLINE: [u8; 3] = [0, 0, 0];

pub(crate) fn with_alpha(rgb: [u8; 3], alpha: u8) -> Rgba<u8> {
    Rgba([rgb[0], rgb[1], rgb[2], alpha])
}

/// Reads the color channels of a pixel as an sRGB triple.
pub(crate) fn srgb_of(pixel: &Rgba<u8>) -> Srgb<u8> {
    Srgb::<u8>::new(pixel[0], pixel[1], pixel[2])
}

/// True when every channel of `pixel` is within `tolerance` of `color`.
pub(crate) fn matches_within(pixel: &Rgba<u8>, color: Srgb<u8>, tolerance: u8) -> bool {
    pixel[0].abs_diff(color.red) <= tolerance
        && pixel[1].abs_diff(color.green) <= tolerance
        && pixel[2].abs_diff(color.blue) <= tolerance
}

/// True when any color channel is strictly above `threshold`.
pub(crate) fn is_lit(pixel: &Rgba<u8>, threshold: u8) -> bool {
    pixel[0] > threshold || pixel[1] > threshold || pixel[2] > threshold
}

/// Generates `n` visually distinct, contrasting RGBA colors.
///
/// These are the kind of colors a segmentation map uses for its objects.
pub fn generate_contrasting_colors(n: usize, alpha: u8) -> Vec<Rgba<u8>> {
    let mut colors = Vec::with_capacity(n);

    for i in 0..n {
        let hue = (i as f32 * 360.0) / n as f32;

        let saturation = 0.9;
        let lightness = 0.5;

        let hsl_color = Hsl::new(hue, saturation, lightness);
        let srgb_linear = Srgb::from_color(hsl_color);
        let srgb_u8: Srgb<u8> = srgb_linear.into_format();

        colors.push(Rgba([srgb_u8.red, srgb_u8.green, srgb_u8.blue, alpha]));
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_contrasting_colors_works() {
        assert!(generate_contrasting_colors(0, 255).is_empty());
        assert_eq!(
            generate_contrasting_colors(2, 255),
            vec![Rgba([242, 13, 13, 255]), Rgba([13, 242, 242, 255])]
        );
    }

    #[test]
    fn contrasting_colors_are_hoverable_and_distinct() {
        let colors = generate_contrasting_colors(6, 255);
        for (i, a) in colors.iter().enumerate() {
            assert!(is_lit(a, 10));
            for b in &colors[i + 1..] {
                assert!(!matches_within(a, srgb_of(b), 5));
            }
        }
    }

    #[test]
    fn tolerance_is_inclusive_per_channel() {
        let target = Srgb::<u8>::new(100, 150, 200);
        assert!(matches_within(&Rgba([105, 145, 200, 255]), target, 5));
        assert!(!matches_within(&Rgba([106, 150, 200, 255]), target, 5));
        assert!(!matches_within(&Rgba([100, 150, 194, 255]), target, 5));
    }

    #[test]
    fn near_black_is_not_lit() {
        assert!(!is_lit(&Rgba([10, 10, 10, 255]), 10));
        assert!(is_lit(&Rgba([0, 11, 0, 255]), 10));
    }
}
