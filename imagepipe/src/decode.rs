//! Decoding raw bytes into artifacts.

use crate::artifact::{Artifact, Bitmap};
use image::ImageReader;
use std::io::Cursor;
use thiserror::Error;

/// Errors from decoding. None of these change on retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Nothing to decode
    #[error("empty input")]
    Empty,

    /// Unrecognised format or corrupt data
    #[error("unsupported or corrupt image data: {0}")]
    Malformed(String),

    /// Image is larger than the decoder is configured to accept
    #[error("image {width}x{height} exceeds maximum dimension {max}")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Turns raw bytes into a typed artifact.
pub trait Decoder: Send + Sync + 'static {
    type Output: Artifact;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Output, DecodeError>;
}

/// Decoder for common raster formats (PNG, JPEG, GIF, WebP) into RGBA8.
#[derive(Debug, Clone, Default)]
pub struct ImageDecoder {
    max_dimension: Option<u32>,
}

impl ImageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject images whose width or height exceeds `max` before allocating
    /// their pixel buffer.
    pub fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn max_dimension(&self) -> Option<u32> {
        self.max_dimension
    }

    fn check_dimensions(&self, bytes: &[u8], max: u32) -> Result<(), DecodeError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        if width > max || height > max {
            return Err(DecodeError::TooLarge { width, height, max });
        }
        Ok(())
    }
}

impl Decoder for ImageDecoder {
    type Output = Bitmap;

    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if let Some(max) = self.max_dimension {
            self.check_dimensions(bytes, max)?;
        }

        let image =
            image::load_from_memory(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        Ok(Bitmap::new(image.to_rgba8()))
    }
}
