//! Inline-encoded image payloads.
//!
//! Images enter and leave the editor as a MIME type plus encoded bytes,
//! usually carried as a `data:<mime>;base64,<payload>` URL.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::{Error, Result};

/// An encoded image together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Parses a base64 data URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InlineData`] when the URL is not of the form
    /// `data:<mime>;base64,<payload>` or the payload is not valid base64.
    ///
    /// # Examples
    ///
    /// ```
    /// use mask_refine::inline::InlineImage;
    ///
    /// let image = InlineImage::from_data_url("data:image/png;base64,AAEC").unwrap();
    /// assert_eq!(image.mime_type, "image/png");
    /// assert_eq!(image.data, vec![0, 1, 2]);
    /// ```
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| Error::InlineData("missing `data:` scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::InlineData("missing payload separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::InlineData("payload is not base64-encoded".into()))?;
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::InlineData(e.to_string()))?;
        Ok(Self::new(mime_type, data))
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    /// Decodes the payload into a raster.
    ///
    /// The format is sniffed from the bytes, so a wrong MIME label does not
    /// prevent decoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Load`] when the bytes are not a decodable image.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory(&self.data).map_err(Error::Load)
    }

    /// Encodes an RGBA raster as PNG.
    pub fn encode_png(image: &RgbaImage) -> Result<Self> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(Error::Encode)?;
        Ok(Self::new("image/png", bytes))
    }

    /// Encodes an RGB raster as JPEG.
    pub fn encode_jpeg(image: &RgbImage) -> Result<Self> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .map_err(Error::Encode)?;
        Ok(Self::new("image/jpeg", bytes))
    }
}
