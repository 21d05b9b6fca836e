use std::{
    mem,
    ops::{Deref, DerefMut},
};

use glam::{Affine2, UVec2, Vec2};

use crate::{
    device::{DeferredDevice, FlushError, FlushOutcome},
    is_paint_opaque,
    queue::PlaybackMode,
    rect_stays_rect, BlendMode, CanvasBuilder, ClipOp, Color, Command, DrawFilter, Image,
    NotificationClient, Paint, Path, Picture, PlaybackHandle, PointMode, Rect, RenderTarget,
    RoundedRect, TargetError,
};

use self::clip::ClipBounds;

mod clip;

/// Whether drawing operations are queued or executed right away.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Deferred,
    Immediate,
}

#[derive(Copy, Clone, Debug, Default)]
struct State {
    transform: Affine2,
    clip: ClipBounds,
    /// A draw filter is installed and may veto or repaint draws on replay.
    filtered: bool,
}

/// A canvas that records drawing operations and replays them
/// onto a [`RenderTarget`] later.
///
/// In deferred mode, every operation is appended to a queue held by
/// the canvas's [`DeferredDevice`]. The queue is replayed when it outgrows its
/// budget, when pixels are read or written, or on an explicit [`flush`].
/// An opaque draw covering the whole surface drops queued draws that it
/// would overdraw.
///
/// Draws whose resources may change before replay (mutable images, or images
/// above the size threshold) are executed immediately, after flushing
/// whatever was queued before them.
///
/// The canvas tracks its own transform and clip stack like other canvases.
/// Many methods return `self` to enable method chaining.
///
/// [`flush`]: DeferredCanvas::flush
pub struct DeferredCanvas<'t> {
    device: DeferredDevice<'t>,
    mode: DrawMode,
    bitmap_size_threshold: usize,
    cached_size: Option<UVec2>,

    state_stack: Vec<State>,
    state: State,
}

impl<'t> DeferredCanvas<'t> {
    /// Creates a canvas drawing to `target` with the default settings.
    pub fn new(target: &'t mut dyn RenderTarget) -> Self {
        Self::builder(target).build()
    }

    pub fn builder(target: &'t mut dyn RenderTarget) -> CanvasBuilder<'t> {
        CanvasBuilder::new(target)
    }

    pub(crate) fn from_device(device: DeferredDevice<'t>, bitmap_size_threshold: usize) -> Self {
        Self {
            device,
            mode: DrawMode::Deferred,
            bitmap_size_threshold,
            cached_size: None,
            state_stack: Vec::new(),
            state: State::default(),
        }
    }

    pub fn device(&self) -> &DeferredDevice<'t> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut DeferredDevice<'t> {
        &mut self.device
    }

    /// The size of the target surface in pixels.
    pub fn size(&mut self) -> UVec2 {
        *self
            .cached_size
            .get_or_insert_with(|| self.device.target_size())
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.mode
    }

    pub fn is_deferred(&self) -> bool {
        self.mode == DrawMode::Deferred
    }

    /// Switches between deferred and immediate drawing.
    ///
    /// Leaving deferred mode first flushes queued commands so they land
    /// before anything drawn immediately. Refused while thread-safe playback
    /// is enabled.
    pub fn set_deferred_drawing(&mut self, deferred: bool) -> &mut Self {
        let mode = if deferred {
            DrawMode::Deferred
        } else {
            DrawMode::Immediate
        };
        if mode == self.mode {
            return self;
        }
        if mode == DrawMode::Immediate {
            if self.device.is_thread_safe() {
                log::warn!("Cannot leave deferred mode while thread-safe playback is enabled");
                return self;
            }
            self.device.flush_pending(PlaybackMode::Normal);
        }
        self.mode = mode;
        self
    }

    /// Images with more bytes of pixels than this are drawn immediately.
    pub fn set_bitmap_size_threshold(&mut self, bytes: usize) -> &mut Self {
        self.bitmap_size_threshold = bytes;
        self
    }

    pub fn bitmap_size_threshold(&self) -> usize {
        self.bitmap_size_threshold
    }

    pub fn set_notification_client(
        &mut self,
        client: Option<&'t dyn NotificationClient>,
    ) -> &mut Self {
        self.device.set_notification_client(client);
        self
    }

    /// Rebinds the canvas to a new primary target, keeping queued commands
    /// and the transform and clip stack.
    pub fn set_target(&mut self, target: &'t mut dyn RenderTarget) -> &mut Self {
        self.device.set_target(target);
        self.cached_size = None;
        self
    }

    pub fn set_playback_target(&mut self, target: Option<&'t mut dyn RenderTarget>) -> &mut Self {
        self.device.set_playback_target(target);
        self
    }

    /// Makes flushes hand commands off to the playback snapshot, to be
    /// replayed by [`thread_safe_flush`](Self::thread_safe_flush) or a
    /// [`PlaybackHandle`]. Only possible in deferred mode.
    pub fn enable_thread_safe_playback(&mut self) -> &mut Self {
        if self.mode != DrawMode::Deferred {
            log::warn!("Thread-safe playback requires deferred drawing");
            return self;
        }
        self.device.enable_thread_safe_playback();
        self
    }

    pub fn playback_handle(&self) -> PlaybackHandle {
        self.device.playback_handle()
    }

    pub fn prepare_for_thread_safe_flush(&mut self) -> FlushOutcome {
        self.device.prepare_for_thread_safe_flush()
    }

    pub fn thread_safe_flush(&mut self) -> Result<usize, FlushError> {
        self.device.thread_safe_flush()
    }

    /// Replays queued commands, then flushes the target.
    pub fn flush(&mut self) -> FlushOutcome {
        self.device.flush()
    }

    /// Drops queued draws without drawing them.
    pub fn silent_flush(&mut self) -> &mut Self {
        self.device.skip_pending_commands();
        self
    }

    pub fn has_pending_commands(&self) -> bool {
        self.device.has_pending_commands()
    }

    /// Returns whether queued draws were dropped since the last call, then
    /// resets the flag. True for a new canvas.
    pub fn is_fresh_frame(&mut self) -> bool {
        self.device.is_fresh_frame()
    }

    pub fn storage_allocated_for_recording(&self) -> usize {
        self.device.storage_allocated_for_recording()
    }

    /// Limits the queue to roughly `bytes` bytes of commands.
    pub fn set_max_recording_storage(&mut self, bytes: usize) -> &mut Self {
        self.device
            .set_max_recording_commands(bytes / mem::size_of::<Command>());
        self
    }

    /// Flushes queued commands to release what they hold. Returns the
    /// number of bytes released, at most `bytes`.
    pub fn free_memory_if_possible(&mut self, bytes: usize) -> usize {
        self.device.free_memory_if_possible(bytes)
    }

    pub fn read_pixels(&mut self, origin: UVec2, size: UVec2) -> Result<Vec<u8>, TargetError> {
        self.device.read_pixels(origin, size)
    }

    /// Overwrites target pixels, ignoring the transform and clip.
    pub fn write_pixels(&mut self, image: &Image, origin: UVec2) -> Result<(), TargetError> {
        self.device.write_pixels(image, origin)
    }

    /// Flushes, then copies the whole surface into a new image.
    pub fn snapshot(&mut self) -> Result<Image, TargetError> {
        self.device.flush();
        let size = self.size();
        let pixels = self.device.read_pixels(UVec2::ZERO, size)?;
        Ok(Image::new(size.x, size.y, pixels)?)
    }

    // State

    /// Pushes the current transform and clip onto the state stack.
    pub fn save(&mut self) -> &mut Self {
        self.state_stack.push(self.state);
        self.submit(Command::Save);
        self
    }

    /// Like [`save`](Self::save), but draws until the matching restore go
    /// into an offscreen layer, composited with `paint` when restored.
    pub fn save_layer(&mut self, bounds: Option<Rect>, paint: Option<&Paint>) -> &mut Self {
        self.state_stack.push(self.state);
        self.submit(Command::SaveLayer {
            bounds,
            paint: paint.cloned(),
        });
        self
    }

    /// Restores the state pushed by the last `save` or `save_layer`.
    ///
    /// # Panics
    /// Panics if there is no state to pop.
    pub fn restore(&mut self) -> &mut Self {
        self.state = self
            .state_stack
            .pop()
            .expect("called DeferredCanvas::restore() with no matching save");
        self.submit(Command::Restore);
        self
    }

    /// The number of saved states plus one.
    pub fn save_count(&self) -> usize {
        self.state_stack.len() + 1
    }

    /// Restores until [`save_count`](Self::save_count) is at most `count`.
    pub fn restore_to_count(&mut self, count: usize) -> &mut Self {
        let count = count.max(1);
        while self.save_count() > count {
            self.restore();
        }
        self
    }

    /// Calls `save()`, executes the closure, and then calls `restore()`.
    pub fn with_save(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        self.save();
        f(self);
        self.restore()
    }

    pub fn transform(&self) -> Affine2 {
        self.state.transform
    }

    /// Pre-multiplies the current transform by `transform`.
    pub fn concat(&mut self, transform: Affine2) -> &mut Self {
        self.state.transform = self.state.transform * transform;
        self.submit(Command::Concat(transform));
        self
    }

    pub fn set_transform(&mut self, transform: Affine2) -> &mut Self {
        self.state.transform = transform;
        self.submit(Command::SetTransform(transform));
        self
    }

    pub fn reset_transform(&mut self) -> &mut Self {
        self.set_transform(Affine2::IDENTITY)
    }

    pub fn translate(&mut self, translation: Vec2) -> &mut Self {
        self.concat(Affine2::from_translation(translation))
    }

    pub fn scale(&mut self, scale: Vec2) -> &mut Self {
        self.concat(Affine2::from_scale(scale))
    }

    /// Rotates the canvas by the given angle in radians.
    pub fn rotate(&mut self, angle_in_radians: f32) -> &mut Self {
        self.concat(Affine2::from_angle(angle_in_radians))
    }

    pub fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) -> &mut Self {
        let transform = self.state.transform;
        let bounds = rect.bbox_transformed(transform);
        match op {
            ClipOp::Intersect if rect_stays_rect(transform) => {
                self.state.clip.intersect_rect(bounds)
            }
            ClipOp::Intersect => self.state.clip.intersect_unknown(),
            ClipOp::Difference => self.state.clip.exclude(bounds),
        }
        self.submit(Command::ClipRect {
            rect,
            op,
            anti_alias,
        });
        self
    }

    pub fn clip_rounded_rect(
        &mut self,
        rect: RoundedRect,
        op: ClipOp,
        anti_alias: bool,
    ) -> &mut Self {
        if rect.is_rect() {
            return self.clip_rect(rect.rect(), op, anti_alias);
        }
        let bounds = rect.rect().bbox_transformed(self.state.transform);
        match op {
            ClipOp::Intersect => self.state.clip.intersect_unknown(),
            ClipOp::Difference => self.state.clip.exclude(bounds),
        }
        self.submit(Command::ClipRoundedRect {
            rect,
            op,
            anti_alias,
        });
        self
    }

    pub fn clip_path(&mut self, path: &Path, op: ClipOp, anti_alias: bool) -> &mut Self {
        match op {
            ClipOp::Intersect => self.state.clip.intersect_unknown(),
            ClipOp::Difference => self
                .state
                .clip
                .exclude(path.bounds().bbox_transformed(self.state.transform)),
        }
        self.submit(Command::ClipPath {
            path: path.clone(),
            op,
            anti_alias,
        });
        self
    }

    /// Installs a filter run on the paint of every subsequent draw.
    pub fn set_draw_filter(&mut self, filter: Option<DrawFilter>) -> &mut Self {
        self.state.filtered = filter.is_some();
        self.submit(Command::SetDrawFilter(filter));
        self
    }

    // Draws

    /// Replaces every pixel inside the clip with `color`.
    pub fn clear(&mut self, color: Color) -> &mut Self {
        // Draw filters never see clears.
        let paint = Paint::solid(color).with_blend_mode(BlendMode::Source);
        if self.mode == DrawMode::Deferred
            && self.is_full_frame(None, Some(&paint), self.state.transform)
        {
            self.device.skip_pending_commands();
        }
        self.submit(Command::Clear(color));
        self
    }

    /// Fills the clip with `paint`.
    pub fn draw_paint(&mut self, paint: &Paint) -> &mut Self {
        self.skip_if_covered(None, Some(paint), None, self.state.transform);
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawPaint(paint.clone()));
        drop(this);
        self
    }

    pub fn draw_points(&mut self, mode: PointMode, points: &[Vec2], paint: &Paint) -> &mut Self {
        if points.is_empty() {
            return self;
        }
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawPoints {
            mode,
            points: points.iter().copied().collect(),
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    pub fn draw_rect(&mut self, rect: Rect, paint: &Paint) -> &mut Self {
        self.skip_if_covered(Some(rect), Some(paint), None, self.state.transform);
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawRect {
            rect,
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    pub fn draw_oval(&mut self, rect: Rect, paint: &Paint) -> &mut Self {
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawOval {
            rect,
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    /// Draws a rounded rectangle, as a plain rectangle or oval when
    /// the corners make it one.
    pub fn draw_rounded_rect(&mut self, rect: RoundedRect, paint: &Paint) -> &mut Self {
        if rect.is_rect() {
            return self.draw_rect(rect.rect(), paint);
        }
        if rect.is_oval() {
            return self.draw_oval(rect.rect(), paint);
        }
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawRoundedRect {
            rect,
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    /// Draws the area between `outer` and `inner`.
    pub fn draw_double_rounded_rect(
        &mut self,
        outer: RoundedRect,
        inner: RoundedRect,
        paint: &Paint,
    ) -> &mut Self {
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawDoubleRoundedRect {
            outer,
            inner,
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    pub fn draw_path(&mut self, path: &Path, paint: &Paint) -> &mut Self {
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawPath {
            path: path.clone(),
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    /// Draws an image with its top-left corner at `pos`.
    pub fn draw_image(&mut self, image: &Image, pos: Vec2, paint: Option<&Paint>) -> &mut Self {
        let bounds = Rect::new(pos, image.size().as_vec2());
        self.skip_if_covered(Some(bounds), paint, Some(image), self.state.transform);
        let mut this = AutoImmediate::new(self, Some(image), paint);
        this.submit(Command::DrawImage {
            image: image.clone(),
            pos,
            paint: paint.cloned(),
        });
        drop(this);
        self
    }

    /// Draws the `src` region of an image, or all of it, scaled into `dst`.
    pub fn draw_image_rect(
        &mut self,
        image: &Image,
        src: Option<Rect>,
        dst: Rect,
        paint: Option<&Paint>,
    ) -> &mut Self {
        self.skip_if_covered(Some(dst), paint, Some(image), self.state.transform);
        let mut this = AutoImmediate::new(self, Some(image), paint);
        this.submit(Command::DrawImageRect {
            image: image.clone(),
            src,
            dst,
            paint: paint.cloned(),
        });
        drop(this);
        self
    }

    pub fn draw_image_matrix(
        &mut self,
        image: &Image,
        matrix: Affine2,
        paint: Option<&Paint>,
    ) -> &mut Self {
        let mut this = AutoImmediate::new(self, Some(image), paint);
        this.submit(Command::DrawImageMatrix {
            image: image.clone(),
            matrix,
            paint: paint.cloned(),
        });
        drop(this);
        self
    }

    /// Draws an image stretched into `dst`, keeping the parts outside
    /// `center` at their natural size.
    pub fn draw_image_nine(
        &mut self,
        image: &Image,
        center: Rect,
        dst: Rect,
        paint: Option<&Paint>,
    ) -> &mut Self {
        let mut this = AutoImmediate::new(self, Some(image), paint);
        this.submit(Command::DrawImageNine {
            image: image.clone(),
            center,
            dst,
            paint: paint.cloned(),
        });
        drop(this);
        self
    }

    /// Draws an image at a device-space position, ignoring the transform.
    pub fn draw_sprite(&mut self, image: &Image, x: i32, y: i32, paint: Option<&Paint>) -> &mut Self {
        let bounds = Rect::new(Vec2::new(x as f32, y as f32), image.size().as_vec2());
        self.skip_if_covered(Some(bounds), paint, Some(image), Affine2::IDENTITY);
        let mut this = AutoImmediate::new(self, Some(image), paint);
        this.submit(Command::DrawSprite {
            image: image.clone(),
            x,
            y,
            paint: paint.cloned(),
        });
        drop(this);
        self
    }

    pub fn draw_text(&mut self, text: &str, origin: Vec2, paint: &Paint) -> &mut Self {
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawText {
            text: text.into(),
            origin,
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    /// Draws text with one position per character.
    pub fn draw_positioned_text(
        &mut self,
        text: &str,
        positions: &[Vec2],
        paint: &Paint,
    ) -> &mut Self {
        let mut this = AutoImmediate::new(self, None, Some(paint));
        this.submit(Command::DrawPositionedText {
            text: text.into(),
            positions: positions.to_vec(),
            paint: paint.clone(),
        });
        drop(this);
        self
    }

    pub fn draw_picture(
        &mut self,
        picture: &Picture,
        matrix: Option<Affine2>,
        paint: Option<&Paint>,
    ) -> &mut Self {
        self.submit(Command::DrawPicture {
            picture: picture.clone(),
            matrix,
            paint: paint.cloned(),
        });
        self
    }

    fn submit(&mut self, command: Command) {
        match self.mode {
            DrawMode::Deferred => self.device.record(command),
            DrawMode::Immediate => self.device.draw_immediate(&command),
        }
    }

    /// Drops queued draws if the upcoming one is opaque and covers
    /// the whole surface.
    ///
    /// Runs before any immediate override so the dropped draws are never
    /// replayed.
    fn skip_if_covered(
        &mut self,
        rect: Option<Rect>,
        paint: Option<&Paint>,
        image: Option<&Image>,
        transform: Affine2,
    ) {
        if self.mode == DrawMode::Deferred
            && !self.state.filtered
            && self.is_full_frame(rect, paint, transform)
            && is_paint_opaque(paint, image)
        {
            log::trace!("Draw covers the whole surface; skipping pending commands");
            self.device.skip_pending_commands();
        }
    }

    /// Returns whether a draw of `rect` (or of the whole clip if `None`) is
    /// known to reach every pixel of the surface.
    fn is_full_frame(&mut self, rect: Option<Rect>, paint: Option<&Paint>, transform: Affine2) -> bool {
        let device = Rect::new(Vec2::ZERO, self.size().as_vec2());
        if let Some(rect) = rect {
            if !rect_stays_rect(transform) || !rect.bbox_transformed(transform).contains_rect(device)
            {
                return false;
            }
        }
        if let Some(paint) = paint {
            if !paint.fills_interior() || paint.has_geometry_effects() {
                return false;
            }
        }
        self.state.clip.contains(device)
    }
}

/// Returns whether a draw must bypass the queue because its pixels
/// may change before replay, or because they are too large to hold on to.
pub(crate) fn should_draw_immediately(
    image: Option<&Image>,
    paint: Option<&Paint>,
    threshold: usize,
) -> bool {
    let unsafe_to_defer =
        |image: &Image| !image.is_immutable() || image.byte_size() > threshold;
    image.map_or(false, unsafe_to_defer)
        || paint
            .and_then(Paint::shader)
            .and_then(|shader| shader.as_image())
            .map_or(false, unsafe_to_defer)
}

/// Switches a canvas to immediate mode for the lifetime of the guard
/// when the draw it wraps cannot be deferred.
struct AutoImmediate<'c, 't> {
    canvas: &'c mut DeferredCanvas<'t>,
    restore: bool,
}

impl<'c, 't> AutoImmediate<'c, 't> {
    fn new(
        canvas: &'c mut DeferredCanvas<'t>,
        image: Option<&Image>,
        paint: Option<&Paint>,
    ) -> Self {
        let restore = canvas.mode == DrawMode::Deferred
            && !canvas.device.is_thread_safe()
            && should_draw_immediately(image, paint, canvas.bitmap_size_threshold);
        if restore {
            log::trace!("Drawing immediately");
            canvas.set_deferred_drawing(false);
        }
        Self { canvas, restore }
    }
}

impl<'t> Deref for AutoImmediate<'_, 't> {
    type Target = DeferredCanvas<'t>;

    fn deref(&self) -> &Self::Target {
        self.canvas
    }
}

impl<'t> DerefMut for AutoImmediate<'_, 't> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.canvas
    }
}

impl Drop for AutoImmediate<'_, '_> {
    fn drop(&mut self) {
        if self.restore {
            self.canvas.set_deferred_drawing(true);
        }
    }
}
