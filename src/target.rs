use glam::UVec2;

use crate::{Command, Image, ImageError};

#[cfg(feature = "raster")]
pub mod raster;

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("render target does not support pixel access")]
    Unsupported,
    #[error("pixel rectangle at {origin} of size {size} lies outside the target")]
    OutOfBounds { origin: UVec2, size: UVec2 },
    #[error(transparent)]
    InvalidPixels(#[from] ImageError),
}

/// Announces what happens to the existing pixels of a target
/// before it is drawn to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentChange {
    /// The previous contents will be entirely overdrawn and need not be preserved.
    Discard,
    /// The previous contents must be kept.
    Retain,
}

/// A drawing surface that executes [`Command`]s.
///
/// Commands arrive in the order they were issued. State commands
/// (save, restore, transform, clip, draw filter) apply to the commands
/// that follow them; the target keeps that state itself.
pub trait RenderTarget {
    /// Executes one command.
    fn apply(&mut self, command: &Command);

    /// Completes any work buffered by previous `apply` calls.
    fn flush(&mut self) {}

    /// The size of the surface in pixels.
    fn size(&self) -> UVec2;

    fn content_will_change(&mut self, change: ContentChange) {
        let _ = change;
    }

    /// Reads premultiplied RGBA8 pixels from the rectangle at `origin`.
    fn read_pixels(&mut self, origin: UVec2, size: UVec2) -> Result<Vec<u8>, TargetError> {
        let _ = (origin, size);
        Err(TargetError::Unsupported)
    }

    /// Overwrites the pixels at `origin` with those of `image`, bypassing
    /// the current transform and clip.
    fn write_pixels(&mut self, image: &Image, origin: UVec2) -> Result<(), TargetError> {
        let _ = (image, origin);
        Err(TargetError::Unsupported)
    }
}

/// Returns an error if the rectangle does not fit inside a target of `bounds`.
#[cfg_attr(not(feature = "raster"), allow(dead_code))]
pub(crate) fn check_bounds(bounds: UVec2, origin: UVec2, size: UVec2) -> Result<(), TargetError> {
    let right = origin.x as u64 + size.x as u64;
    let bottom = origin.y as u64 + size.y as u64;
    if right <= bounds.x as u64 && bottom <= bounds.y as u64 {
        Ok(())
    } else {
        Err(TargetError::OutOfBounds { origin, size })
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    #[test]
    fn bounds_check() {
        let bounds = uvec2(10, 10);
        assert!(check_bounds(bounds, uvec2(0, 0), bounds).is_ok());
        assert!(check_bounds(bounds, uvec2(5, 9), uvec2(5, 1)).is_ok());
        assert!(matches!(
            check_bounds(bounds, uvec2(6, 0), uvec2(5, 1)),
            Err(TargetError::OutOfBounds { .. })
        ));
        assert!(check_bounds(bounds, uvec2(u32::MAX, 0), uvec2(u32::MAX, 0)).is_err());
    }
}
