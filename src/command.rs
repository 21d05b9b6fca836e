use std::{fmt, mem, sync::Arc};

use glam::{Affine2, Vec2};
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

use crate::{Color, Image, Paint, Path, Picture, Rect, RoundedRect};

pub type Text = SmartString<LazyCompact>;

/// How a clip shape combines with the current clip.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ClipOp {
    #[default]
    Intersect,
    Difference,
}

/// How `draw_points` interprets its points.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointMode {
    /// Each point is drawn separately.
    Points,
    /// Each pair of points is a line segment.
    Lines,
    /// The points form one connected polyline.
    Polygon,
}

/// The category of a draw, passed to [`DrawFilter`]s.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawKind {
    Paint,
    Point,
    Line,
    Polygon,
    Rect,
    Oval,
    RoundedRect,
    Path,
    Image,
    Text,
    Picture,
}

/// A callback invoked with the paint of every draw while it is installed.
///
/// The callback may modify the paint. Returning `false` skips the draw.
#[derive(Clone)]
pub struct DrawFilter(Arc<dyn Fn(&mut Paint, DrawKind) -> bool + Send + Sync>);

impl DrawFilter {
    pub fn new(filter: impl Fn(&mut Paint, DrawKind) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(filter))
    }

    pub fn filter(&self, paint: &mut Paint, kind: DrawKind) -> bool {
        (self.0)(paint, kind)
    }
}

impl PartialEq for DrawFilter {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DrawFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DrawFilter")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}

/// One recorded mutation of a drawing surface.
///
/// Every argument is owned by the command, so it can be replayed long after the
/// call that produced it returned. Images are retained by handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Pushes the current transform, clip and draw filter.
    Save,
    /// Like `Save`, but subsequent draws go into an offscreen layer that is
    /// composited with `paint` on the matching `Restore`.
    SaveLayer {
        bounds: Option<Rect>,
        paint: Option<Paint>,
    },
    /// Pops the state pushed by the matching `Save` or `SaveLayer`.
    Restore,
    /// Pre-multiplies the current transform.
    Concat(Affine2),
    /// Replaces the current transform.
    SetTransform(Affine2),
    ClipRect {
        rect: Rect,
        op: ClipOp,
        anti_alias: bool,
    },
    ClipRoundedRect {
        rect: RoundedRect,
        op: ClipOp,
        anti_alias: bool,
    },
    ClipPath {
        path: Path,
        op: ClipOp,
        anti_alias: bool,
    },
    SetDrawFilter(Option<DrawFilter>),

    // Draw operations
    /// Fills the clip with a color, replacing what was there.
    Clear(Color),
    /// Fills the clip with a paint.
    DrawPaint(Paint),
    DrawPoints {
        mode: PointMode,
        points: SmallVec<[Vec2; 4]>,
        paint: Paint,
    },
    DrawRect {
        rect: Rect,
        paint: Paint,
    },
    DrawOval {
        rect: Rect,
        paint: Paint,
    },
    DrawRoundedRect {
        rect: RoundedRect,
        paint: Paint,
    },
    /// Draws the area between two rounded rectangles.
    DrawDoubleRoundedRect {
        outer: RoundedRect,
        inner: RoundedRect,
        paint: Paint,
    },
    DrawPath {
        path: Path,
        paint: Paint,
    },
    /// Draws an image with its top-left corner at `pos`.
    DrawImage {
        image: Image,
        pos: Vec2,
        paint: Option<Paint>,
    },
    /// Draws the `src` region of an image (the whole image if `None`)
    /// scaled into `dst`.
    DrawImageRect {
        image: Image,
        src: Option<Rect>,
        dst: Rect,
        paint: Option<Paint>,
    },
    DrawImageMatrix {
        image: Image,
        matrix: Affine2,
        paint: Option<Paint>,
    },
    /// Draws an image stretched into `dst` while keeping the corners
    /// outside `center` unscaled.
    DrawImageNine {
        image: Image,
        center: Rect,
        dst: Rect,
        paint: Option<Paint>,
    },
    /// Draws an image at a device-space position, ignoring the transform.
    DrawSprite {
        image: Image,
        x: i32,
        y: i32,
        paint: Option<Paint>,
    },
    DrawText {
        text: Text,
        origin: Vec2,
        paint: Paint,
    },
    /// Draws text with one position per character.
    DrawPositionedText {
        text: Text,
        positions: Vec<Vec2>,
        paint: Paint,
    },
    DrawPicture {
        picture: Picture,
        matrix: Option<Affine2>,
        paint: Option<Paint>,
    },
}

impl Command {
    /// Returns whether this command changes canvas state rather than pixels.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Command::Save
                | Command::SaveLayer { .. }
                | Command::Restore
                | Command::Concat(_)
                | Command::SetTransform(_)
                | Command::ClipRect { .. }
                | Command::ClipRoundedRect { .. }
                | Command::ClipPath { .. }
                | Command::SetDrawFilter(_)
        )
    }

    /// The category of this draw, or `None` for state changes.
    pub fn draw_kind(&self) -> Option<DrawKind> {
        let kind = match self {
            Command::Clear(_) | Command::DrawPaint(_) => DrawKind::Paint,
            Command::DrawPoints { mode, .. } => match mode {
                PointMode::Points => DrawKind::Point,
                PointMode::Lines => DrawKind::Line,
                PointMode::Polygon => DrawKind::Polygon,
            },
            Command::DrawRect { .. } => DrawKind::Rect,
            Command::DrawOval { .. } => DrawKind::Oval,
            Command::DrawRoundedRect { .. } | Command::DrawDoubleRoundedRect { .. } => {
                DrawKind::RoundedRect
            }
            Command::DrawPath { .. } => DrawKind::Path,
            Command::DrawImage { .. }
            | Command::DrawImageRect { .. }
            | Command::DrawImageMatrix { .. }
            | Command::DrawImageNine { .. }
            | Command::DrawSprite { .. } => DrawKind::Image,
            Command::DrawText { .. } | Command::DrawPositionedText { .. } => DrawKind::Text,
            Command::DrawPicture { .. } => DrawKind::Picture,
            _ => return None,
        };
        Some(kind)
    }

    /// The command as it is replayed when its pixels are known to be overdrawn.
    ///
    /// Draws vanish. State changes survive so later commands keep the transform
    /// and clip they were recorded under; layers degrade to a plain save since
    /// compositing an empty layer could still touch pixels.
    pub fn silenced(self) -> Option<Command> {
        match self {
            Command::SaveLayer { .. } => Some(Command::Save),
            command if command.is_state_change() => Some(command),
            _ => None,
        }
    }

    pub fn paint(&self) -> Option<&Paint> {
        match self {
            Command::SaveLayer { paint, .. }
            | Command::DrawImage { paint, .. }
            | Command::DrawImageRect { paint, .. }
            | Command::DrawImageMatrix { paint, .. }
            | Command::DrawImageNine { paint, .. }
            | Command::DrawSprite { paint, .. }
            | Command::DrawPicture { paint, .. } => paint.as_ref(),
            Command::DrawPaint(paint)
            | Command::DrawPoints { paint, .. }
            | Command::DrawRect { paint, .. }
            | Command::DrawOval { paint, .. }
            | Command::DrawRoundedRect { paint, .. }
            | Command::DrawDoubleRoundedRect { paint, .. }
            | Command::DrawPath { paint, .. }
            | Command::DrawText { paint, .. }
            | Command::DrawPositionedText { paint, .. } => Some(paint),
            _ => None,
        }
    }

    /// Runs `filter` over the paint of this draw.
    ///
    /// Returns `false` if the filter vetoed the draw. Image draws without
    /// a paint are filtered through a default paint, which is kept
    /// only if the filter changed it.
    pub fn apply_draw_filter(&mut self, filter: &DrawFilter) -> bool {
        let kind = match self.draw_kind() {
            Some(kind) => kind,
            None => return true,
        };
        match self {
            Command::Clear(_) => true,
            Command::DrawImage { paint, .. }
            | Command::DrawImageRect { paint, .. }
            | Command::DrawImageMatrix { paint, .. }
            | Command::DrawImageNine { paint, .. }
            | Command::DrawSprite { paint, .. }
            | Command::DrawPicture { paint, .. } => {
                let mut filtered = paint.clone().unwrap_or_default();
                let keep = filter.filter(&mut filtered, kind);
                if paint.is_some() || filtered != Paint::default() {
                    *paint = Some(filtered);
                }
                keep
            }
            Command::DrawPaint(paint)
            | Command::DrawPoints { paint, .. }
            | Command::DrawRect { paint, .. }
            | Command::DrawOval { paint, .. }
            | Command::DrawRoundedRect { paint, .. }
            | Command::DrawDoubleRoundedRect { paint, .. }
            | Command::DrawPath { paint, .. }
            | Command::DrawText { paint, .. }
            | Command::DrawPositionedText { paint, .. } => filter.filter(paint, kind),
            _ => true,
        }
    }

    /// Estimated bytes held by this command while it sits in a queue.
    pub fn record_size(&self) -> usize {
        mem::size_of::<Command>() + self.heap_size()
    }

    fn heap_size(&self) -> usize {
        let paint = self.paint().map_or(0, Paint::heap_size);
        let payload = match self {
            Command::ClipPath { path, .. } | Command::DrawPath { path, .. } => path.heap_size(),
            Command::DrawPoints { points, .. } if points.spilled() => {
                points.capacity() * mem::size_of::<Vec2>()
            }
            Command::DrawText { text, .. } => text_heap_size(text),
            Command::DrawPositionedText {
                text, positions, ..
            } => text_heap_size(text) + positions.capacity() * mem::size_of::<Vec2>(),
            _ => 0,
        };
        paint + payload
    }
}

fn text_heap_size(text: &Text) -> usize {
    if text.is_inline() {
        0
    } else {
        text.len()
    }
}
