//! Artifacts produced by the pipeline and their memory accounting.

use image::RgbaImage;
use std::sync::Arc;

/// Anything the memory cache can hold.
///
/// The accounted size is what the cache charges against its byte budget.
/// For decoded images this is the pixel footprint, not the encoded size.
pub trait Artifact: Send + Sync + 'static {
    fn accounted_size(&self) -> usize;
}

impl Artifact for Vec<u8> {
    fn accounted_size(&self) -> usize {
        self.len()
    }
}

impl<A: Artifact + ?Sized> Artifact for Arc<A> {
    fn accounted_size(&self) -> usize {
        (**self).accounted_size()
    }
}

/// A decoded RGBA8 image.
///
/// Pixel storage is shared: clones handed to callers and the copy held by
/// the cache point at the same buffer, which is released when the last
/// owner drops it.
#[derive(Debug, Clone)]
pub struct Bitmap {
    image: Arc<RgbaImage>,
}

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Build a bitmap from raw RGBA8 pixels.
    ///
    /// Returns `None` if `pixels` does not hold exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, pixels).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA8 pixel data, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Number of live handles sharing this bitmap's pixel buffer.
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.image)
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
            || (self.width() == other.width()
                && self.height() == other.height()
                && self.pixels() == other.pixels())
    }
}

impl Eq for Bitmap {}

impl Artifact for Bitmap {
    fn accounted_size(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }
}
