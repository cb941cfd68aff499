//! Tunable constants of the editor.
//!
//! Every number the algorithms depend on lives here so it can be adjusted
//! without touching the raster code.

use std::time::Duration;

use crate::error::{Error, Result};

/// Alpha of painted coverage (translucent red), as a fraction of opaque.
pub const COVERAGE_ALPHA: f32 = 0.7;

/// Per-channel tolerance when matching a segmentation-map color.
pub const REGION_MATCH_TOLERANCE: u8 = 5;

/// A detection pixel counts as an object when any channel exceeds this.
pub const HOVER_THRESHOLD: u8 = 10;

pub const DEFAULT_BRUSH_SIZE: u32 = 40;
pub const MIN_BRUSH_SIZE: u32 = 5;
pub const MAX_BRUSH_SIZE: u32 = 150;

/// Blur radius of the feather operation, in logical pixels.
pub const FEATHER_RADIUS: f32 = 4.0;

/// Shadow radius of expand/contract, in logical pixels.
pub const MORPHOLOGY_RADIUS: f32 = 5.0;

/// How long the refinement pulse stays visible.
pub const PULSE_DURATION: Duration = Duration::from_millis(500);

/// Settings for one [`MaskEditor`](crate::session::MaskEditor) session.
///
/// `Default` yields the values the editor ships with.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Coverage alpha for painted and AI-produced masks (0..=1)
    pub coverage_alpha: f32,
    /// Brush diameter at session start, in logical pixels
    pub brush_size: u32,
    /// Smallest selectable brush diameter
    pub min_brush_size: u32,
    /// Largest selectable brush diameter
    pub max_brush_size: u32,
    /// Per-channel tolerance for region picking
    pub match_tolerance: u8,
    /// Minimum channel value for a detection pixel to be hoverable
    pub hover_threshold: u8,
    /// Feather blur radius, logical pixels
    pub feather_radius: f32,
    /// Expand/contract shadow radius, logical pixels
    pub morphology_radius: f32,
    /// Duration of the cosmetic refinement pulse
    pub pulse_duration: Duration,
    /// Smallest point-select marker radius, native pixels
    pub marker_min_radius: f32,
    /// Marker radius as a fraction of the shorter native side
    pub marker_radius_fraction: f32,
    /// Marker outline width as a fraction of the marker radius
    pub marker_outline_fraction: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            coverage_alpha: COVERAGE_ALPHA,
            brush_size: DEFAULT_BRUSH_SIZE,
            min_brush_size: MIN_BRUSH_SIZE,
            max_brush_size: MAX_BRUSH_SIZE,
            match_tolerance: REGION_MATCH_TOLERANCE,
            hover_threshold: HOVER_THRESHOLD,
            feather_radius: FEATHER_RADIUS,
            morphology_radius: MORPHOLOGY_RADIUS,
            pulse_duration: PULSE_DURATION,
            marker_min_radius: 5.0,
            marker_radius_fraction: 0.005,
            marker_outline_fraction: 0.4,
        }
    }
}

impl EditorConfig {
    /// Checks that every value is usable by the raster code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.coverage_alpha > 0.0 && self.coverage_alpha <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "coverage_alpha must be in (0, 1], got {}",
                self.coverage_alpha
            )));
        }
        if self.min_brush_size == 0 || self.min_brush_size > self.max_brush_size {
            return Err(Error::InvalidConfig(format!(
                "brush size range {}..={} is empty",
                self.min_brush_size, self.max_brush_size
            )));
        }
        for (name, radius) in [
            ("feather_radius", self.feather_radius),
            ("morphology_radius", self.morphology_radius),
            ("marker_min_radius", self.marker_min_radius),
        ] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {radius}"
                )));
            }
        }
        Ok(())
    }

    /// Alpha of coverage pixels as a byte.
    pub fn coverage_alpha_u8(&self) -> u8 {
        (self.coverage_alpha * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// Clamps a requested brush size into the configured range.
    pub fn clamp_brush_size(&self, size: u32) -> u32 {
        size.clamp(self.min_brush_size, self.max_brush_size)
    }
}
