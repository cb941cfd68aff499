//! Requests to, and replies from, the external segmentation service.
//!
//! The service itself is a collaborator behind [`SegmentationService`]: it
//! receives one inline image plus a natural-language instruction and answers
//! with either an image or text. Everything the editor needs around that
//! call lives here: building the three kinds of request, interpreting the
//! reply, turning returned masks into coverage, and the busy flag that
//! keeps at most one request in flight per session.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, Rgb, Rgba, RgbImage, RgbaImage};
use imageproc::drawing::draw_filled_circle_mut;
use imageproc::point::Point;

use crate::colors::{self, COVERAGE_RGB, MARKER_FILL, MARKER_OUTLINE};
use crate::config::EditorConfig;
use crate::error::{Error, Result};
use crate::inline::InlineImage;

const POINT_INSTRUCTION: &str = "You are an expert photo editing assistant specializing in \
high-quality object segmentation. In the provided image, the user has marked a point with a \
magenta circle. Generate a precise, pixel-perfect, black and white mask for the primary object \
located at that point. The main object under the marker should be completely white (#FFFFFF). \
Everything else, including other objects and the background, must be completely black \
(#000000). The mask's edges must follow the object's contours perfectly. If multiple objects \
are layered, select only the topmost object under the marker. Return ONLY the mask image. Your \
entire response must be the image file, with no accompanying text or explanation.";

const WHOLE_IMAGE_INSTRUCTION: &str = "You are an expert instance segmentation model. Analyze \
the provided image and identify all distinct, non-overlapping objects. Your task is to generate \
a new image of the exact same dimensions, which will serve as a segmentation map. In this map, \
the background must be pure black (#000000). Every distinct object you identify must be filled \
with a unique, solid, and vibrant color (e.g., pure red, pure green, pure blue). Ensure that the \
colors are distinct and edges are clean and precise. Do not use any shading or gradients. The \
output MUST be only the segmentation map image, with no other text or explanation.";

const SUBJECT_INSTRUCTION: &str = "Analyze the image and identify the main subject. Create a \
segmentation mask where the main subject is completely white and the entire background is \
completely black. The output MUST be an image containing this black and white mask. Do not \
respond with text.";

/// The three segmentation-producing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationKind {
    /// Mask for the object under a marked point
    Point,
    /// Instance map with one solid color per object
    WholeImage,
    /// Binary subject/background mask
    Subject,
}

impl SegmentationKind {
    pub fn instruction(self) -> &'static str {
        match self {
            SegmentationKind::Point => POINT_INSTRUCTION,
            SegmentationKind::WholeImage => WHOLE_IMAGE_INSTRUCTION,
            SegmentationKind::Subject => SUBJECT_INSTRUCTION,
        }
    }

    /// Label shown while the request is in flight.
    pub fn loading_message(self) -> &'static str {
        match self {
            SegmentationKind::Point => "Detecting object at point...",
            SegmentationKind::WholeImage => "Auto-segmenting objects...",
            SegmentationKind::Subject => "Segmenting subject...",
        }
    }

    /// Message used when the service fails without explaining why.
    pub fn fallback_error(self) -> &'static str {
        match self {
            SegmentationKind::Point => "AI did not return a valid mask.",
            SegmentationKind::WholeImage => "AI did not return a segmentation map.",
            SegmentationKind::Subject => "AI did not return a valid mask for the subject.",
        }
    }

    /// Whether a successful reply is written straight onto the mask surface.
    pub fn writes_mask(self) -> bool {
        !matches!(self, SegmentationKind::WholeImage)
    }
}

/// Output kinds the service may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Image,
    Text,
}

/// One request to the segmentation service.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationRequest {
    pub kind: SegmentationKind,
    pub image: InlineImage,
    pub instruction: &'static str,
    pub modalities: [Modality; 2],
}

impl SegmentationRequest {
    /// Request for whole-image or subject segmentation of the unmodified
    /// source image.
    pub fn for_image(kind: SegmentationKind, image: InlineImage) -> Self {
        Self {
            kind,
            image,
            instruction: kind.instruction(),
            modalities: [Modality::Image, Modality::Text],
        }
    }

    /// Request for point segmentation: `source` is marked at `at` (native
    /// coordinates) and sent as JPEG.
    pub fn for_point(source: &DynamicImage, at: Point<u32>, config: &EditorConfig) -> Result<Self> {
        let marked = mark_point(source, at, config);
        let image = InlineImage::encode_jpeg(&marked)?;
        Ok(Self::for_image(SegmentationKind::Point, image))
    }
}

/// What the service answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceReply {
    Image(InlineImage),
    Text(String),
    Empty,
}

impl ServiceReply {
    /// Extracts the image part, turning text or empty replies into a
    /// segmentation error.
    ///
    /// The service's own text is used as the message when it gave one.
    pub fn into_image(self, kind: SegmentationKind) -> Result<InlineImage> {
        match self {
            ServiceReply::Image(image) => Ok(image),
            ServiceReply::Text(text) if !text.trim().is_empty() => {
                Err(Error::Segmentation(text.trim().to_string()))
            }
            ServiceReply::Text(_) | ServiceReply::Empty => {
                Err(Error::Segmentation(kind.fallback_error().to_string()))
            }
        }
    }
}

/// The external image-generation collaborator.
///
/// Implementations perform one round-trip per call; no retries are
/// expected. Transport failures are reported as
/// [`Error::Segmentation`].
pub trait SegmentationService {
    fn segment(
        &self,
        request: &SegmentationRequest,
    ) -> impl Future<Output = Result<ServiceReply>> + Send;
}

/// Session-wide "segmentation in flight" flag.
///
/// Acquisition is a single atomic compare-and-swap, so the one-request
/// invariant holds even without any UI disabling the triggers.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sets the flag, failing with [`Error::Busy`] if it already was.
    pub fn try_acquire(&self) -> Result<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Busy)?;
        Ok(BusyGuard(Arc::clone(&self.0)))
    }
}

/// Clears the busy flag when dropped, whichever way the request ended.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Converts a mask-like raster into coverage.
///
/// Every visible pixel with any lit channel becomes translucent red with
/// the given alpha; everything else becomes fully transparent. Binary,
/// near-binary and region-pick masks all share this representation
/// afterwards.
pub fn colorize(mask: &RgbaImage, alpha: u8) -> RgbaImage {
    let on = colors::with_alpha(COVERAGE_RGB, alpha);
    let off = Rgba([0, 0, 0, 0]);
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let pixel = mask.get_pixel(x, y);
        if pixel[3] > 0 && colors::is_lit(pixel, 0) {
            on
        } else {
            off
        }
    })
}

/// Draws the point-select marker onto a copy of the native image.
///
/// The marker is a magenta disk whose radius scales with the image, with a
/// black outline centered on its rim.
pub fn mark_point(source: &DynamicImage, at: Point<u32>, config: &EditorConfig) -> RgbImage {
    let mut canvas = source.to_rgb8();
    let shorter = canvas.width().min(canvas.height()) as f32;
    let radius = config
        .marker_min_radius
        .max(shorter * config.marker_radius_fraction);
    let half_outline = radius * config.marker_outline_fraction / 2.0;
    let center = (at.x as i32, at.y as i32);

    draw_filled_circle_mut(
        &mut canvas,
        center,
        (radius + half_outline).round() as i32,
        Rgb(MARKER_OUTLINE),
    );
    draw_filled_circle_mut(
        &mut canvas,
        center,
        (radius - half_outline).round() as i32,
        Rgb(MARKER_FILL),
    );
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_maps_lit_pixels_to_coverage() {
        let mut mask = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 0, 255]));
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        mask.put_pixel(1, 0, Rgba([1, 0, 0, 255]));

        let coverage = colorize(&mask, 179);
        assert_eq!(*coverage.get_pixel(0, 0), Rgba([255, 0, 0, 179]));
        assert_eq!(*coverage.get_pixel(1, 0), Rgba([255, 0, 0, 179]));
        assert_eq!(*coverage.get_pixel(2, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn colorize_ignores_invisible_pixels() {
        let mask = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 0]));
        assert!(colorize(&mask, 179).pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn marker_is_centered_on_the_point() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([10, 200, 10])));
        let marked = mark_point(&source, Point::new(200, 150), &EditorConfig::default());
        // radius = max(5, 300 * 0.005) = 5, outline 2px centered on the rim
        assert_eq!(*marked.get_pixel(200, 150), Rgb(MARKER_FILL));
        assert_eq!(*marked.get_pixel(205, 150), Rgb(MARKER_OUTLINE));
        assert_eq!(*marked.get_pixel(210, 150), Rgb([10, 200, 10]));
    }

    #[test]
    fn text_reply_becomes_segmentation_error() {
        let err = ServiceReply::Text("I can't help with that.".into())
            .into_image(SegmentationKind::Point)
            .unwrap_err();
        assert_eq!(err.to_string(), "I can't help with that.");

        let err = ServiceReply::Empty
            .into_image(SegmentationKind::WholeImage)
            .unwrap_err();
        assert_eq!(err.to_string(), "AI did not return a segmentation map.");
    }

    #[test]
    fn busy_flag_admits_one_holder() {
        let flag = BusyFlag::default();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_set());
        assert!(matches!(flag.try_acquire(), Err(Error::Busy)));
        drop(guard);
        assert!(!flag.is_set());
        assert!(flag.try_acquire().is_ok());
    }

    #[test]
    fn requests_carry_their_instruction() {
        let image = InlineImage::new("image/png", vec![1, 2, 3]);
        let request = SegmentationRequest::for_image(SegmentationKind::Subject, image.clone());
        assert_eq!(request.image, image);
        assert!(request.instruction.contains("main subject"));
        assert_eq!(request.modalities, [Modality::Image, Modality::Text]);
        assert!(!SegmentationKind::WholeImage.writes_mask());
    }
}
