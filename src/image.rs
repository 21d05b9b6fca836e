use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use glam::{uvec2, UVec2};
use parking_lot::{RwLock, RwLockReadGuard};

use crate::Color;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("expected {expected} bytes of pixel data but found {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("image pixels are immutable")]
    Immutable,
}

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A shared handle to an RGBA8 image with premultiplied alpha.
///
/// Cloning an `Image` is cheap and yields a handle to the same pixels.
/// Recorded draw commands retain images through such handles, so
/// the pixels stay alive until the command is replayed or discarded.
///
/// Images are immutable unless created with [`Image::new_mutable`].
/// The pixels of a mutable image may change between the time a draw
/// is recorded and the time it is replayed, which is why deferred canvases
/// draw them immediately.
#[derive(Clone)]
pub struct Image(Arc<Inner>);

struct Inner {
    id: u64,
    size: UVec2,
    pixels: RwLock<Vec<u8>>,
    immutable: AtomicBool,
}

impl Image {
    /// Creates an immutable image from premultiplied RGBA8 pixels in row-major order.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        Self::with_mutability(width, height, pixels, true)
    }

    /// Creates an image whose pixels may later be replaced through
    /// [`Image::write_pixels`].
    pub fn new_mutable(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        Self::with_mutability(width, height, pixels, false)
    }

    /// Creates an immutable image filled with a single color.
    pub fn from_color(width: u32, height: u32, color: Color) -> Self {
        let pixel = color.to_premultiplied();
        let pixels = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_parts(uvec2(width, height), pixels, true)
    }

    fn with_mutability(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        immutable: bool,
    ) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ImageError::InvalidLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self::from_parts(uvec2(width, height), pixels, immutable))
    }

    fn from_parts(size: UVec2, pixels: Vec<u8>, immutable: bool) -> Self {
        Self(Arc::new(Inner {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            size,
            pixels: RwLock::new(pixels),
            immutable: AtomicBool::new(immutable),
        }))
    }

    /// A process-unique identifier for the pixels behind this handle.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn width(&self) -> u32 {
        self.0.size.x
    }

    pub fn height(&self) -> u32 {
        self.0.size.y
    }

    pub fn size(&self) -> UVec2 {
        self.0.size
    }

    /// The number of bytes of pixel data.
    pub fn byte_size(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    pub fn is_immutable(&self) -> bool {
        self.0.immutable.load(Ordering::Acquire)
    }

    /// Freezes the pixels. There is no way back.
    pub fn set_immutable(&self) {
        self.0.immutable.store(true, Ordering::Release);
    }

    /// Returns whether every pixel is fully opaque.
    pub fn is_opaque(&self) -> bool {
        self.pixels()
            .chunks_exact(4)
            .all(|pixel| pixel[3] == u8::MAX)
    }

    /// Locks the pixels for reading.
    pub fn pixels(&self) -> RwLockReadGuard<Vec<u8>> {
        self.0.pixels.read()
    }

    /// Replaces the pixels of a mutable image.
    pub fn write_pixels(&self, pixels: &[u8]) -> Result<(), ImageError> {
        if self.is_immutable() {
            return Err(ImageError::Immutable);
        }
        if pixels.len() != self.byte_size() {
            return Err(ImageError::InvalidLength {
                expected: self.byte_size(),
                actual: pixels.len(),
            });
        }
        self.0.pixels.write().copy_from_slice(pixels);
        Ok(())
    }

    pub fn ptr_eq(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id())
            .field("size", &self.size())
            .field("immutable", &self.is_immutable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Image::new(2, 2, vec![0; 15]),
            Err(ImageError::InvalidLength {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn opacity_follows_pixels() {
        let image = Image::new_mutable(1, 2, vec![0, 0, 0, 255, 9, 9, 9, 255]).unwrap();
        assert!(image.is_opaque());
        image.write_pixels(&[0, 0, 0, 255, 0, 0, 0, 10]).unwrap();
        assert!(!image.is_opaque());

        image.set_immutable();
        assert!(matches!(
            image.write_pixels(&[0; 8]),
            Err(ImageError::Immutable)
        ));
        assert!(!Image::from_color(3, 3, Color::rgba(1, 2, 3, 4)).is_opaque());
    }
}
