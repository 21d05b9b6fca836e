//! A deferred drawing canvas. Drawing operations are recorded
//! into a command queue and replayed onto a render target later,
//! either on the calling thread or handed off to a playback thread.

#![allow(clippy::too_many_arguments)]

mod canvas;
mod color;
mod command;
pub mod device;
mod image;
mod notify;
mod paint;
mod path;
mod picture;
mod playback;
pub mod queue;
mod rect;
mod settings;
pub mod target;
#[cfg(test)]
mod testing;

pub use canvas::{DeferredCanvas, DrawMode};
pub use color::Color;
pub use command::{ClipOp, Command, DrawFilter, DrawKind, PointMode, Text};
pub use device::{DeferredDevice, FlushError, FlushOutcome};
pub use image::{Image, ImageError};
pub use notify::NotificationClient;
pub use paint::{
    is_paint_opaque, BlendMode, ColorFilter, DrawLooper, GradientStop, ImageFilter, MaskFilter,
    Paint, PaintStyle, PathEffect, Shader, SourceOpacity, TileMode,
};
pub use path::{Path, PathBuilder, PathSegment};
pub use picture::{Picture, PictureRecorder};
pub use playback::PlaybackHandle;
pub use queue::{PlaybackMode, RecordQueue};
pub use rect::{rect_stays_rect, BorderRadii, Rect, RoundedRect};
pub use settings::{CanvasBuilder, Settings};
#[cfg(feature = "raster")]
pub use target::raster::RasterTarget;
pub use target::{ContentChange, RenderTarget, TargetError};

pub extern crate glam;
