use image::math::Rect;
use imageproc::point::Point;
use num_traits::ToPrimitive;

use crate::error::{Error, Result};

/// The container the editor is displayed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Container width in logical (CSS-like) pixels
    pub width: f32,
    /// Container height in logical pixels
    pub height: f32,
    /// Physical pixels per logical pixel
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// A pointer position relative to the top-left corner of the displayed image,
/// in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalPoint {
    pub x: f32,
    pub y: f32,
}

impl LogicalPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size relationships between the native image, its logical display size and
/// the physical surfaces.
///
/// Computed once per image load or container resize; every pointer
/// conversion goes through the cached values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayLayout {
    native_width: u32,
    native_height: u32,
    logical_width: f32,
    logical_height: f32,
    device_pixel_ratio: f32,
    physical_width: u32,
    physical_height: u32,
}

impl DisplayLayout {
    /// Fits an image of the given native size into `viewport`, preserving the
    /// aspect ratio.
    ///
    /// The image first takes the container's full width; if that makes it
    /// taller than the container it takes the full height instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidViewport`] if the container or the device pixel
    /// ratio is not a positive finite number, or the image has no pixels.
    ///
    /// # Examples
    ///
    /// ```
    /// use mask_refine::geometry::{DisplayLayout, Viewport};
    ///
    /// let layout = DisplayLayout::fit((800, 600), Viewport::new(400.0, 400.0, 2.0)).unwrap();
    /// assert_eq!(layout.logical_size(), (400.0, 300.0));
    /// assert_eq!(layout.physical_size(), (800, 600));
    /// assert_eq!(layout.display_scale(), 0.5);
    /// ```
    pub fn fit(native: (u32, u32), viewport: Viewport) -> Result<Self> {
        let (native_width, native_height) = native;
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(viewport.width)
            || !valid(viewport.height)
            || !valid(viewport.device_pixel_ratio)
            || native_width == 0
            || native_height == 0
        {
            return Err(Error::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
                ratio: viewport.device_pixel_ratio,
            });
        }

        let (nw, nh) = (f64::from(native_width), f64::from(native_height));
        let mut width = f64::from(viewport.width);
        let mut height = width * nh / nw;
        if height > f64::from(viewport.height) {
            height = f64::from(viewport.height);
            width = height * nw / nh;
        }

        let ratio = f64::from(viewport.device_pixel_ratio);
        let physical = |logical: f64| ((logical * ratio).round() as u32).max(1);

        Ok(Self {
            native_width,
            native_height,
            logical_width: width as f32,
            logical_height: height as f32,
            device_pixel_ratio: viewport.device_pixel_ratio,
            physical_width: physical(width),
            physical_height: physical(height),
        })
    }

    pub fn native_size(&self) -> (u32, u32) {
        (self.native_width, self.native_height)
    }

    pub fn logical_size(&self) -> (f32, f32) {
        (self.logical_width, self.logical_height)
    }

    /// Size of every raster surface.
    pub fn physical_size(&self) -> (u32, u32) {
        (self.physical_width, self.physical_height)
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// Logical display width over native width.
    pub fn display_scale(&self) -> f32 {
        self.logical_width / self.native_width as f32
    }

    /// Converts a logical pointer position into surface pixel coordinates.
    pub fn to_physical(&self, point: LogicalPoint) -> Point<f32> {
        let sx = self.physical_width as f32 / self.logical_width;
        let sy = self.physical_height as f32 / self.logical_height;
        Point::new(point.x * sx, point.y * sy)
    }

    /// Converts a logical pointer position into native image coordinates,
    /// rounded and clamped into the image.
    pub fn to_native(&self, point: LogicalPoint) -> Point<u32> {
        let sx = self.native_width as f32 / self.logical_width;
        let sy = self.native_height as f32 / self.logical_height;
        let clamp = |v: f32, len: u32| v.round().clamp(0.0, (len - 1) as f32) as u32;
        Point::new(
            clamp(point.x * sx, self.native_width),
            clamp(point.y * sy, self.native_height),
        )
    }

    /// Scales a logical length (brush width, blur radius) to surface pixels.
    pub fn to_physical_length(&self, logical: f32) -> f32 {
        logical * self.physical_width as f32 / self.logical_width
    }

    /// Whether a surface pixel coordinate lies on the surfaces.
    pub fn contains_physical(&self, point: Point<f32>) -> bool {
        point.x >= 0.0
            && point.y >= 0.0
            && point.x < self.physical_width as f32
            && point.y < self.physical_height as f32
    }
}

/// Calculates the pixel rectangle touched by a set of points, grown by `pad`
/// on every side and clipped to a `width` x `height` surface.
///
/// Used to limit compositing to the region a stroke segment can reach.
/// Generic over numeric coordinate types so both integer and floating-point
/// points are accepted.
///
/// # Returns
///
/// `None` when `points` is empty or the padded box misses the surface
/// entirely. Coordinates that cannot be represented as `f32` are treated
/// as `0`.
///
/// # Examples
///
/// ```
/// use imageproc::point::Point;
/// use mask_refine::geometry::padded_bounds;
///
/// let rect = padded_bounds(&[Point::new(10.0, 20.0), Point::new(30.0, 25.0)], 5.0, 100, 100).unwrap();
/// assert_eq!((rect.x, rect.y, rect.width, rect.height), (5, 15, 30, 15));
/// ```
pub fn padded_bounds<T>(points: &[Point<T>], pad: f32, width: u32, height: u32) -> Option<Rect>
where
    T: Copy + PartialOrd + ToPrimitive,
{
    let (first, rest) = points.split_first()?;
    let mut min_x = first.x;
    let mut max_x = first.x;
    let mut min_y = first.y;
    let mut max_y = first.y;

    // `T` may only be `PartialOrd`, so compare manually.
    for p in rest {
        if p.x < min_x {
            min_x = p.x;
        }
        if p.x > max_x {
            max_x = p.x;
        }
        if p.y < min_y {
            min_y = p.y;
        }
        if p.y > max_y {
            max_y = p.y;
        }
    }

    let to_f32 = |v: T| v.to_f32().unwrap_or(0.0);
    let x0 = (to_f32(min_x) - pad).floor().max(0.0);
    let y0 = (to_f32(min_y) - pad).floor().max(0.0);
    let x1 = (to_f32(max_x) + pad).ceil().min(width as f32);
    let y1 = (to_f32(max_y) + pad).ceil().min(height as f32);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(Rect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}
