//! Error types for the mask editor.
//!
//! Load failures are fatal for a session; every other variant is
//! recoverable and leaves the mask surface as it was before the failing
//! operation.

use thiserror::Error;

/// Mask editor error type
#[derive(Error, Debug)]
pub enum Error {
    /// The source image (or an initial mask) could not be decoded
    #[error("could not load image into the editor: {0}")]
    Load(#[source] image::ImageError),

    /// The segmentation service produced no usable image
    #[error("{0}")]
    Segmentation(String),

    /// A local raster operation could not be carried out
    #[error("mask processing failed: {0}")]
    Processing(String),

    /// A segmentation request is already in flight
    #[error("another segmentation request is still running")]
    Busy,

    /// Malformed inline (data URL) image payload
    #[error("malformed inline image: {0}")]
    InlineData(String),

    /// Encoding a raster into PNG/JPEG failed
    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The container has no drawable area
    #[error("invalid viewport: {width}x{height} at device pixel ratio {ratio}")]
    InvalidViewport { width: f32, height: f32, ratio: f32 },

    /// Rejected configuration value
    #[error("invalid editor configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error ends the editing session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Load(_) | Error::InvalidViewport { .. })
    }
}

/// Result type alias for mask editor operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
