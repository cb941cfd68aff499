//! Freehand brush and eraser strokes on the mask surface.
//!
//! A stroke is never stored: each pointer sample is rasterized into a
//! grayscale stamp with `imageproc` and composited into the mask at once.

use image::{Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::colors::{self, COVERAGE_RGB};
use crate::composite::{self, CompositeOp};
use crate::geometry::padded_bounds;

/// How a stroke affects existing coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushMode {
    /// Paint translucent red over the mask
    Add,
    /// Remove coverage under the brush
    Subtract,
}

/// Brush parameters in surface (physical) pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Line width; single dabs are disks of half this radius
    pub width: f32,
    pub mode: BrushMode,
    /// Alpha of painted coverage
    pub coverage_alpha: u8,
}

impl Brush {
    fn color(&self) -> Rgba<u8> {
        match self.mode {
            BrushMode::Add => colors::with_alpha(COVERAGE_RGB, self.coverage_alpha),
            // Erasing uses an opaque source so covered pixels drop to zero.
            BrushMode::Subtract => Rgba([0, 0, 0, 255]),
        }
    }

    fn op(&self) -> CompositeOp {
        match self.mode {
            BrushMode::Add => CompositeOp::SourceOver,
            BrushMode::Subtract => CompositeOp::DestinationOut,
        }
    }

    fn radius(&self) -> f32 {
        self.width / 2.0
    }
}

/// Pointer state of the stroke in progress.
#[derive(Debug, Clone, Default)]
pub struct StrokeState {
    active: bool,
    last: Option<Point<f32>>,
}

impl StrokeState {
    pub fn begin(&mut self) {
        self.active = true;
        self.last = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Applies the next pointer sample of an active stroke.
    ///
    /// The first sample paints a disk so that a click without movement still
    /// leaves a mark; later samples paint a round-capped segment from the
    /// previous sample. Returns `false` when no stroke is active.
    pub fn extend(&mut self, mask: &mut RgbaImage, to: Point<f32>, brush: &Brush) -> bool {
        if !self.active {
            return false;
        }
        match self.last {
            Some(from) => paint_segment(mask, from, to, brush),
            None => paint_dab(mask, to, brush),
        }
        self.last = Some(to);
        true
    }

    /// Ends the stroke, returning whether one was in progress.
    pub fn end(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.last = None;
        was_active
    }
}

/// Paints a filled disk of radius `brush.width / 2` at `center`.
pub fn paint_dab(mask: &mut RgbaImage, center: Point<f32>, brush: &Brush) {
    let (width, height) = mask.dimensions();
    let radius = brush.radius();
    let Some(rect) = padded_bounds(&[center], radius + 1.0, width, height) else {
        return;
    };
    let mut stamp = composite::stamp_for(&rect);
    let local = (
        (center.x - rect.x as f32).round() as i32,
        (center.y - rect.y as f32).round() as i32,
    );
    draw_filled_circle_mut(&mut stamp, local, radius.round() as i32, Luma([255]));
    composite::apply_stamp(mask, &stamp, (rect.x, rect.y), brush.color(), brush.op());
}

/// Paints a line of `brush.width` from `from` to `to` with round caps.
///
/// The whole segment is rasterized into one stamp before compositing, so
/// overlapping parts of a single segment are blended only once.
pub fn paint_segment(mask: &mut RgbaImage, from: Point<f32>, to: Point<f32>, brush: &Brush) {
    let (width, height) = mask.dimensions();
    let radius = brush.radius();
    let Some(rect) = padded_bounds(&[from, to], radius + 1.0, width, height) else {
        return;
    };
    let mut stamp = composite::stamp_for(&rect);
    let offset = (rect.x as f32, rect.y as f32);
    let local = |p: Point<f32>| Point::new(p.x - offset.0, p.y - offset.1);
    let (a, b) = (local(from), local(to));
    let disk_radius = radius.round() as i32;

    for cap in [a, b] {
        draw_filled_circle_mut(
            &mut stamp,
            (cap.x.round() as i32, cap.y.round() as i32),
            disk_radius,
            Luma([255]),
        );
    }

    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length = dx.hypot(dy);
    if length >= 1.0 {
        let (nx, ny) = (-dy / length * radius, dx / length * radius);
        let corner = |p: Point<f32>, sign: f32| {
            Point::new((p.x + sign * nx).round() as i32, (p.y + sign * ny).round() as i32)
        };
        let body = [corner(a, 1.0), corner(b, 1.0), corner(b, -1.0), corner(a, -1.0)];
        // `draw_polygon_mut` rejects closed or collapsed outlines.
        if body[0] != body[3] && body[0] != body[1] {
            draw_polygon_mut(&mut stamp, &body, Luma([255]));
        }
    }

    composite::apply_stamp(mask, &stamp, (rect.x, rect.y), brush.color(), brush.op());
}
