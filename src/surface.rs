//! The three pixel-aligned raster surfaces of an editing session.
//!
//! All surfaces share the physical size of the current [`DisplayLayout`]:
//!
//! * the **image** surface shows the source image fitted to the container,
//! * the **detection** surface shows a segmentation map while region
//!   picking is active,
//! * the **mask** surface holds translucent-red coverage.
//!
//! A fourth, optional raster caches the hover highlight preview so that the
//! mask itself is never touched by hovering.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::composite::{self, CompositeOp};
use crate::error::Result;
use crate::geometry::{DisplayLayout, Viewport};
use crate::segmentation::colorize;

#[derive(Debug, Clone)]
pub struct SurfaceStack {
    layout: DisplayLayout,
    image: RgbaImage,
    detection: RgbaImage,
    mask: RgbaImage,
    highlight: Option<RgbaImage>,
}

impl SurfaceStack {
    /// Allocates the surfaces for `source` inside `viewport`.
    ///
    /// An `initial_mask` (a previously saved or AI-produced mask image) goes
    /// through [`colorize`] and is scaled onto the mask surface.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidViewport`](crate::Error::InvalidViewport)
    /// when the container has no area.
    pub fn new(
        source: &DynamicImage,
        initial_mask: Option<&DynamicImage>,
        viewport: Viewport,
        coverage_alpha: u8,
    ) -> Result<Self> {
        let layout = DisplayLayout::fit((source.width(), source.height()), viewport)?;
        let (width, height) = layout.physical_size();
        let mut stack = Self {
            layout,
            image: render_source(source, &layout),
            detection: RgbaImage::new(width, height),
            mask: RgbaImage::new(width, height),
            highlight: None,
        };
        if let Some(mask) = initial_mask {
            let coverage = colorize(&mask.to_rgba8(), coverage_alpha);
            stack.composite_onto_mask(&coverage, FilterType::Triangle);
        }
        debug!(
            physical_width = width,
            physical_height = height,
            display_scale = layout.display_scale(),
            "allocated surfaces"
        );
        Ok(stack)
    }

    /// Reallocates every surface for a new container or pixel ratio.
    ///
    /// Mask coverage is resampled into the new size; the detection surface
    /// and any highlight are dropped and must be re-rendered by the caller.
    pub fn resize(&mut self, source: &DynamicImage, viewport: Viewport) -> Result<()> {
        let layout = DisplayLayout::fit((source.width(), source.height()), viewport)?;
        let (width, height) = layout.physical_size();
        self.mask = fit_to(&self.mask, (width, height), FilterType::Triangle);
        self.image = render_source(source, &layout);
        self.detection = RgbaImage::new(width, height);
        self.highlight = None;
        self.layout = layout;
        debug!(physical_width = width, physical_height = height, "resized surfaces");
        Ok(())
    }

    pub fn layout(&self) -> &DisplayLayout {
        &self.layout
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn detection(&self) -> &RgbaImage {
        &self.detection
    }

    pub fn mask(&self) -> &RgbaImage {
        &self.mask
    }

    pub(crate) fn mask_mut(&mut self) -> &mut RgbaImage {
        &mut self.mask
    }

    /// What should be shown in the mask slot: the hover preview when one is
    /// active, otherwise the mask itself.
    pub fn mask_preview(&self) -> &RgbaImage {
        self.highlight.as_ref().unwrap_or(&self.mask)
    }

    /// Whether the mask surface holds any non-transparent pixel.
    pub fn has_coverage(&self) -> bool {
        composite::any_alpha(&self.mask)
    }

    pub fn clear_mask(&mut self) {
        self.mask = RgbaImage::new(self.mask.width(), self.mask.height());
    }

    /// Renders a segmentation map onto the detection surface.
    ///
    /// Nearest-neighbour sampling keeps every object a single solid color.
    pub(crate) fn show_detection(&mut self, map: &RgbaImage) {
        self.detection = fit_to(map, self.layout.physical_size(), FilterType::Nearest);
    }

    pub(crate) fn clear_detection(&mut self) {
        let (width, height) = self.layout.physical_size();
        self.detection = RgbaImage::new(width, height);
    }

    pub(crate) fn set_highlight(&mut self, highlight: Option<RgbaImage>) {
        self.highlight = highlight;
    }

    pub fn has_highlight(&self) -> bool {
        self.highlight.is_some()
    }

    /// Scales `layer` to the surface size and composites it over the mask.
    pub(crate) fn composite_onto_mask(&mut self, layer: &RgbaImage, filter: FilterType) {
        let scaled = fit_to(layer, self.mask.dimensions(), filter);
        composite::apply_layer(&mut self.mask, &scaled, CompositeOp::SourceOver);
    }

    /// Replaces all mask content with `layer`, scaled to the surface size.
    pub(crate) fn replace_mask(&mut self, layer: &RgbaImage) {
        self.clear_mask();
        self.composite_onto_mask(layer, FilterType::Triangle);
    }
}

/// Draws the source image at the layout's physical size.
fn render_source(source: &DynamicImage, layout: &DisplayLayout) -> RgbaImage {
    fit_to(&source.to_rgba8(), layout.physical_size(), FilterType::Triangle)
}

/// Resamples `image` to `size`, copying when it already matches.
pub(crate) fn fit_to(image: &RgbaImage, size: (u32, u32), filter: FilterType) -> RgbaImage {
    if image.dimensions() == size {
        image.clone()
    } else {
        imageops::resize(image, size.0, size.1, filter)
    }
}
