//! A software render target built on [`tiny-skia`](https://docs.rs/tiny-skia).

use glam::{vec2, Affine2, UVec2, Vec2};
use tiny_skia_path::IntSize;
use tiny_skia::{
    ClipMask, FillRule, FilterQuality, LinearGradient, Pattern, Pixmap, PixmapPaint,
    Point, SpreadMode, Stroke, StrokeDash, Transform,
};

use crate::{
    target::check_bounds, BlendMode, ClipOp, Color, Command, DrawFilter, GradientStop, Image,
    Paint, PaintStyle, Path, PathEffect, PathSegment, PointMode, Rect, RenderTarget, RoundedRect,
    Shader, TargetError, TileMode,
};

use super::ContentChange;

const KAPPA: f32 = 0.552_284_8;

/// A render target that rasterizes commands into a `tiny-skia` pixmap.
///
/// Covers fills, strokes, images, clips and layers. Text, mask filters,
/// loopers, image filters and color filters are not rasterized.
pub struct RasterTarget {
    surface: Pixmap,
    /// Offscreen pixmaps of open layers, innermost last.
    layers: Vec<Pixmap>,
    state: State,
    saves: Vec<Saved>,
    clip_mask: Option<ClipMask>,
}

#[derive(Clone, Default)]
struct State {
    transform: Affine2,
    clips: Vec<ClipShape>,
    /// Set once an intersection has removed every pixel.
    clipped_out: bool,
    filter: Option<DrawFilter>,
}

#[derive(Clone)]
struct ClipShape {
    path: tiny_skia::Path,
    fill_rule: FillRule,
    anti_alias: bool,
}

struct Saved {
    state: State,
    layer: Option<LayerPaint>,
}

#[derive(Copy, Clone)]
struct LayerPaint {
    opacity: f32,
    blend_mode: tiny_skia::BlendMode,
}

impl RasterTarget {
    /// Creates a transparent target.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: Pixmap::new(width, height).expect("invalid raster target dimensions"),
            layers: Vec::new(),
            state: State::default(),
            saves: Vec::new(),
            clip_mask: None,
        }
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.surface
    }

    /// Premultiplied RGBA8 pixels of the surface.
    pub fn pixels(&self) -> &[u8] {
        self.surface.data()
    }

    /// The premultiplied color of one surface pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let pixel = self.surface.pixel(x, y)?;
        Some([pixel.red(), pixel.green(), pixel.blue(), pixel.alpha()])
    }

    fn device_rect(&self) -> Rect {
        Rect::new(
            Vec2::ZERO,
            vec2(self.surface.width() as f32, self.surface.height() as f32),
        )
    }

    fn execute(&mut self, command: &Command) {
        match command {
            Command::Save => self.save(None),
            Command::SaveLayer { paint, .. } => {
                let layer = LayerPaint {
                    opacity: paint.as_ref().map_or(1., |p| p.alpha() as f32 / 255.),
                    blend_mode: paint
                        .as_ref()
                        .map_or(tiny_skia::BlendMode::SourceOver, |p| {
                            convert_blend_mode(p.blend_mode())
                        }),
                };
                self.save(Some(layer));
            }
            Command::Restore => self.restore(),
            Command::Concat(transform) => self.state.transform = self.state.transform * *transform,
            Command::SetTransform(transform) => self.state.transform = *transform,
            Command::ClipRect {
                rect,
                op,
                anti_alias,
            } => self.clip(&rect_path(*rect), *op, *anti_alias),
            Command::ClipRoundedRect {
                rect,
                op,
                anti_alias,
            } => self.clip(&rounded_rect_path(*rect), *op, *anti_alias),
            Command::ClipPath {
                path,
                op,
                anti_alias,
            } => self.clip(path, *op, *anti_alias),
            Command::SetDrawFilter(filter) => self.state.filter = filter.clone(),

            Command::Clear(color) => self.clear(*color),
            Command::DrawPaint(paint) => {
                let device = self.device_rect();
                self.fill_rect(device, paint, Affine2::IDENTITY);
            }
            Command::DrawPoints {
                mode,
                points,
                paint,
            } => self.draw_points(*mode, points, paint),
            Command::DrawRect { rect, paint } => self.draw_shape(&rect_path(*rect), paint),
            Command::DrawOval { rect, paint } => self.draw_shape(&oval_path(*rect), paint),
            Command::DrawRoundedRect { rect, paint } => {
                self.draw_shape(&rounded_rect_path(*rect), paint)
            }
            Command::DrawDoubleRoundedRect {
                outer,
                inner,
                paint,
            } => {
                let mut builder = tiny_skia::PathBuilder::new();
                push_segments(&mut builder, rounded_rect_path(*outer).segments(), None);
                push_segments(&mut builder, rounded_rect_path(*inner).segments(), None);
                if let Some(path) = builder.finish() {
                    let transform = self.state.transform;
                    self.fill_path(&path, paint, FillRule::EvenOdd, transform);
                }
            }
            Command::DrawPath { path, paint } => self.draw_shape(path, paint),
            Command::DrawImage { image, pos, paint } => {
                let dst = Rect::new(*pos, image.size().as_vec2());
                self.draw_image(image, None, dst, paint.as_ref(), self.state.transform);
            }
            Command::DrawImageRect {
                image,
                src,
                dst,
                paint,
            } => self.draw_image(image, *src, *dst, paint.as_ref(), self.state.transform),
            Command::DrawImageMatrix {
                image,
                matrix,
                paint,
            } => {
                let dst = Rect::new(Vec2::ZERO, image.size().as_vec2());
                let transform = self.state.transform * *matrix;
                self.draw_image(image, None, dst, paint.as_ref(), transform);
            }
            Command::DrawImageNine {
                image,
                center,
                dst,
                paint,
            } => self.draw_image_nine(image, *center, *dst, paint.as_ref()),
            Command::DrawSprite { image, x, y, paint } => {
                let dst = Rect::new(vec2(*x as f32, *y as f32), image.size().as_vec2());
                self.draw_image(image, None, dst, paint.as_ref(), Affine2::IDENTITY);
            }
            Command::DrawText { text, .. } | Command::DrawPositionedText { text, .. } => {
                log::warn!("Raster target does not rasterize text; skipping {:?}", text);
            }
            Command::DrawPicture {
                picture,
                matrix,
                paint,
            } => {
                match paint {
                    Some(paint) => self.apply(&Command::SaveLayer {
                        bounds: None,
                        paint: Some(paint.clone()),
                    }),
                    None => self.apply(&Command::Save),
                }
                if let Some(matrix) = matrix {
                    self.apply(&Command::Concat(*matrix));
                }
                picture.playback(self);
                self.apply(&Command::Restore);
            }
        }
    }

    fn save(&mut self, layer: Option<LayerPaint>) {
        let layer = layer.and_then(|layer| {
            let pixmap = Pixmap::new(self.surface.width(), self.surface.height())?;
            self.layers.push(pixmap);
            Some(layer)
        });
        self.saves.push(Saved {
            state: self.state.clone(),
            layer,
        });
    }

    fn restore(&mut self) {
        let saved = match self.saves.pop() {
            Some(saved) => saved,
            None => {
                log::warn!("Raster target received a restore with no matching save");
                return;
            }
        };
        if saved.state.clips.len() != self.state.clips.len() {
            self.clip_mask = None;
        }
        self.state = saved.state;
        self.rebuild_clip_mask();

        let layer = match saved.layer {
            Some(layer) => layer,
            None => return,
        };
        if let Some(pixmap) = self.layers.pop() {
            let paint = PixmapPaint {
                opacity: layer.opacity,
                blend_mode: layer.blend_mode,
                quality: FilterQuality::Nearest,
            };
            let clip_mask = self.clip_mask.as_ref();
            let target = self.layers.last_mut().unwrap_or(&mut self.surface);
            target.draw_pixmap(
                0,
                0,
                pixmap.as_ref(),
                &paint,
                Transform::identity(),
                clip_mask,
            );
        }
    }

    fn clip(&mut self, shape: &Path, op: ClipOp, anti_alias: bool) {
        let transform = self.state.transform;
        let mut builder = tiny_skia::PathBuilder::new();
        let fill_rule = match op {
            ClipOp::Intersect => FillRule::Winding,
            ClipOp::Difference => {
                let device = self.device_rect();
                push_segments(&mut builder, rect_path(device).segments(), None);
                FillRule::EvenOdd
            }
        };
        push_segments(&mut builder, shape.segments(), Some(transform));
        match builder.finish() {
            Some(path) => self.state.clips.push(ClipShape {
                path,
                fill_rule,
                anti_alias,
            }),
            None if op == ClipOp::Intersect => self.state.clipped_out = true,
            None => return,
        }
        self.clip_mask = None;
        self.rebuild_clip_mask();
    }

    fn rebuild_clip_mask(&mut self) {
        if self.state.clips.is_empty() {
            self.clip_mask = None;
            return;
        }
        if self.clip_mask.is_some() {
            return;
        }
        let mut mask = ClipMask::new();
        let (width, height) = (self.surface.width(), self.surface.height());
        for (i, clip) in self.state.clips.iter().enumerate() {
            if i == 0 {
                mask.set_path(width, height, &clip.path, clip.fill_rule, clip.anti_alias);
            } else {
                mask.intersect_path(&clip.path, clip.fill_rule, clip.anti_alias);
            }
        }
        self.clip_mask = Some(mask);
    }

    fn clear(&mut self, color: Color) {
        if self.state.clips.is_empty() && !self.state.clipped_out {
            let target = self.layers.last_mut().unwrap_or(&mut self.surface);
            target.fill(convert_color(color));
            return;
        }
        let paint = Paint::solid(color).with_blend_mode(BlendMode::Source);
        let device = self.device_rect();
        self.fill_rect(device, &paint, Affine2::IDENTITY);
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Vec2], paint: &Paint) {
        let mut builder = tiny_skia::PathBuilder::new();
        match mode {
            PointMode::Points => {
                let size = paint.stroke_width().max(1.);
                for point in points {
                    builder.push_rect(point.x - size / 2., point.y - size / 2., size, size);
                }
            }
            PointMode::Lines => {
                for pair in points.chunks_exact(2) {
                    builder.move_to(pair[0].x, pair[0].y);
                    builder.line_to(pair[1].x, pair[1].y);
                }
            }
            PointMode::Polygon => {
                if let Some((first, rest)) = points.split_first() {
                    builder.move_to(first.x, first.y);
                    for point in rest {
                        builder.line_to(point.x, point.y);
                    }
                }
            }
        }
        let path = match builder.finish() {
            Some(path) => path,
            None => return,
        };
        let transform = self.state.transform;
        match mode {
            PointMode::Points => self.fill_path(&path, paint, FillRule::Winding, transform),
            PointMode::Lines | PointMode::Polygon => self.stroke_path(&path, paint, transform),
        }
    }

    fn draw_shape(&mut self, shape: &Path, paint: &Paint) {
        let mut builder = tiny_skia::PathBuilder::new();
        push_segments(&mut builder, shape.segments(), None);
        let path = match builder.finish() {
            Some(path) => path,
            None => return,
        };
        let transform = self.state.transform;
        if paint.fills_interior() {
            self.fill_path(&path, paint, FillRule::Winding, transform);
        }
        if paint.style() != PaintStyle::Fill {
            self.stroke_path(&path, paint, transform);
        }
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint, transform: Affine2) {
        let rect = match convert_rect(rect) {
            Some(rect) if !self.state.clipped_out => rect,
            _ => return,
        };
        let pattern = shader_pixmap(paint);
        let paint = convert_paint(paint, pattern.as_ref());
        let clip_mask = self.clip_mask.as_ref();
        let target = self.layers.last_mut().unwrap_or(&mut self.surface);
        target.fill_rect(rect, &paint, convert_transform(transform), clip_mask);
    }

    fn fill_path(
        &mut self,
        path: &tiny_skia::Path,
        paint: &Paint,
        fill_rule: FillRule,
        transform: Affine2,
    ) {
        if self.state.clipped_out {
            return;
        }
        let pattern = shader_pixmap(paint);
        let paint = convert_paint(paint, pattern.as_ref());
        let clip_mask = self.clip_mask.as_ref();
        let target = self.layers.last_mut().unwrap_or(&mut self.surface);
        target.fill_path(
            path,
            &paint,
            fill_rule,
            convert_transform(transform),
            clip_mask,
        );
    }

    fn stroke_path(&mut self, path: &tiny_skia::Path, paint: &Paint, transform: Affine2) {
        if self.state.clipped_out {
            return;
        }
        let stroke = Stroke {
            width: paint.stroke_width(),
            dash: match paint.path_effect() {
                Some(PathEffect::Dash { on, off, phase }) => StrokeDash::new(vec![on, off], phase),
                _ => None,
            },
            ..Default::default()
        };
        let pattern = shader_pixmap(paint);
        let skia_paint = convert_paint(paint, pattern.as_ref());
        let clip_mask = self.clip_mask.as_ref();
        let target = self.layers.last_mut().unwrap_or(&mut self.surface);
        target.stroke_path(
            path,
            &skia_paint,
            &stroke,
            convert_transform(transform),
            clip_mask,
        );
    }

    /// Draws the `src` region of `image` (all of it if `None`) into `dst`.
    fn draw_image(
        &mut self,
        image: &Image,
        src: Option<Rect>,
        dst: Rect,
        paint: Option<&Paint>,
        transform: Affine2,
    ) {
        let src = src.unwrap_or_else(|| Rect::new(Vec2::ZERO, image.size().as_vec2()));
        let (rect, pixmap) = match (convert_rect(dst), image_pixmap(image)) {
            (Some(rect), Some(pixmap)) if !src.is_empty() && !self.state.clipped_out => {
                (rect, pixmap)
            }
            _ => return,
        };
        let scale = dst.size / src.size;
        let offset = dst.pos - src.pos * scale;
        let quality = if scale == Vec2::ONE {
            FilterQuality::Nearest
        } else {
            FilterQuality::Bilinear
        };
        let shader = Pattern::new(
            pixmap.as_ref(),
            SpreadMode::Pad,
            quality,
            paint.map_or(1., |p| p.alpha() as f32 / 255.),
            Transform::from_row(scale.x, 0., 0., scale.y, offset.x, offset.y),
        );
        let skia_paint = tiny_skia::Paint {
            shader,
            blend_mode: paint.map_or(tiny_skia::BlendMode::SourceOver, |p| {
                convert_blend_mode(p.blend_mode())
            }),
            anti_alias: paint.map_or(false, Paint::anti_alias),
            ..Default::default()
        };
        let clip_mask = self.clip_mask.as_ref();
        let target = self.layers.last_mut().unwrap_or(&mut self.surface);
        target.fill_rect(rect, &skia_paint, convert_transform(transform), clip_mask);
    }

    fn draw_image_nine(&mut self, image: &Image, center: Rect, dst: Rect, paint: Option<&Paint>) {
        let size = image.size().as_vec2();
        let src_x = [0., center.left(), center.right(), size.x];
        let src_y = [0., center.top(), center.bottom(), size.y];
        let dst_x = [
            dst.left(),
            dst.left() + center.left(),
            dst.right() - (size.x - center.right()),
            dst.right(),
        ];
        let dst_y = [
            dst.top(),
            dst.top() + center.top(),
            dst.bottom() - (size.y - center.bottom()),
            dst.bottom(),
        ];
        let transform = self.state.transform;
        for row in 0..3 {
            for column in 0..3 {
                let src = Rect::from_ltrb(
                    src_x[column],
                    src_y[row],
                    src_x[column + 1],
                    src_y[row + 1],
                );
                let dst = Rect::from_ltrb(
                    dst_x[column],
                    dst_y[row],
                    dst_x[column + 1],
                    dst_y[row + 1],
                );
                if !src.is_empty() && !dst.is_empty() {
                    self.draw_image(image, Some(src), dst, paint, transform);
                }
            }
        }
    }
}

impl RenderTarget for RasterTarget {
    fn apply(&mut self, command: &Command) {
        match (&self.state.filter, command.draw_kind()) {
            (Some(filter), Some(_)) => {
                let filter = filter.clone();
                let mut command = command.clone();
                if command.apply_draw_filter(&filter) {
                    self.execute(&command);
                }
            }
            _ => self.execute(command),
        }
    }

    fn size(&self) -> UVec2 {
        UVec2::new(self.surface.width(), self.surface.height())
    }

    fn content_will_change(&mut self, change: ContentChange) {
        log::trace!("Raster target content change: {:?}", change);
    }

    fn read_pixels(&mut self, origin: UVec2, size: UVec2) -> Result<Vec<u8>, TargetError> {
        check_bounds(self.size(), origin, size)?;
        let stride = self.surface.width() as usize * 4;
        let row_bytes = size.x as usize * 4;
        let data = self.surface.data();
        let mut pixels = Vec::with_capacity(row_bytes * size.y as usize);
        for y in origin.y..origin.y + size.y {
            let start = y as usize * stride + origin.x as usize * 4;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        Ok(pixels)
    }

    fn write_pixels(&mut self, image: &Image, origin: UVec2) -> Result<(), TargetError> {
        check_bounds(self.size(), origin, image.size())?;
        let stride = self.surface.width() as usize * 4;
        let row_bytes = image.width() as usize * 4;
        let source = image.pixels();
        let data = self.surface.data_mut();
        for (row, y) in (origin.y..origin.y + image.height()).enumerate() {
            let start = y as usize * stride + origin.x as usize * 4;
            data[start..start + row_bytes]
                .copy_from_slice(&source[row * row_bytes..(row + 1) * row_bytes]);
        }
        Ok(())
    }
}

fn rect_path(rect: Rect) -> Path {
    Path::builder()
        .move_to(rect.pos)
        .line_to(vec2(rect.right(), rect.top()))
        .line_to(vec2(rect.right(), rect.bottom()))
        .line_to(vec2(rect.left(), rect.bottom()))
        .close()
}

fn oval_path(rect: Rect) -> Path {
    let radius = rect.size / 2.;
    corner_path(rect, [radius; 4])
}

fn rounded_rect_path(rect: RoundedRect) -> Path {
    let radii = rect.radii();
    let max = rect.rect().size.x.min(rect.rect().size.y) / 2.;
    let corner = |r: f32| Vec2::splat(r.clamp(0., max.max(0.)));
    corner_path(
        rect.rect(),
        [
            corner(radii.top_left()),
            corner(radii.top_right()),
            corner(radii.bottom_right()),
            corner(radii.bottom_left()),
        ],
    )
}

/// A rectangle with elliptical corners, given as top-left, top-right,
/// bottom-right, bottom-left radii.
fn corner_path(rect: Rect, [tl, tr, br, bl]: [Vec2; 4]) -> Path {
    let (left, top, right, bottom) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    let k = 1. - KAPPA;
    Path::builder()
        .move_to(vec2(left + tl.x, top))
        .line_to(vec2(right - tr.x, top))
        .cubic_to(
            vec2(right - tr.x * k, top),
            vec2(right, top + tr.y * k),
            vec2(right, top + tr.y),
        )
        .line_to(vec2(right, bottom - br.y))
        .cubic_to(
            vec2(right, bottom - br.y * k),
            vec2(right - br.x * k, bottom),
            vec2(right - br.x, bottom),
        )
        .line_to(vec2(left + bl.x, bottom))
        .cubic_to(
            vec2(left + bl.x * k, bottom),
            vec2(left, bottom - bl.y * k),
            vec2(left, bottom - bl.y),
        )
        .line_to(vec2(left, top + tl.y))
        .cubic_to(
            vec2(left, top + tl.y * k),
            vec2(left + tl.x * k, top),
            vec2(left + tl.x, top),
        )
        .close()
}

/// Appends segments to `builder`, mapping every point through `transform` if given.
fn push_segments(
    builder: &mut tiny_skia::PathBuilder,
    segments: impl Iterator<Item = PathSegment>,
    transform: Option<Affine2>,
) {
    let map = |p: Vec2| match transform {
        Some(transform) => transform.transform_point2(p),
        None => p,
    };
    for segment in segments {
        match segment {
            PathSegment::MoveTo(p) => {
                let p = map(p);
                builder.move_to(p.x, p.y);
            }
            PathSegment::LineTo(p) => {
                let p = map(p);
                builder.line_to(p.x, p.y);
            }
            PathSegment::QuadTo { control, end } => {
                let (c, e) = (map(control), map(end));
                builder.quad_to(c.x, c.y, e.x, e.y);
            }
            PathSegment::CubicTo {
                control1,
                control2,
                end,
            } => {
                let (c1, c2, e) = (map(control1), map(control2), map(end));
                builder.cubic_to(c1.x, c1.y, c2.x, c2.y, e.x, e.y);
            }
            PathSegment::Close => builder.close(),
        }
    }
}

/// Copies an image into a pixmap usable as a pattern.
fn image_pixmap(image: &Image) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    Pixmap::from_vec(image.pixels().clone(), size)
}

fn shader_pixmap(paint: &Paint) -> Option<Pixmap> {
    paint
        .shader()
        .and_then(Shader::as_image)
        .and_then(image_pixmap)
}

fn convert_paint<'a>(paint: &Paint, pattern: Option<&'a Pixmap>) -> tiny_skia::Paint<'a> {
    let color = convert_color(paint.color());
    let shader = match (paint.shader(), pattern) {
        (
            Some(Shader::LinearGradient {
                start,
                end,
                stops,
                tile_mode,
            }),
            _,
        ) => LinearGradient::new(
            convert_point(*start),
            convert_point(*end),
            stops.iter().copied().map(convert_gradient_stop).collect(),
            convert_tile_mode(*tile_mode),
            Transform::identity(),
        )
        .unwrap_or(tiny_skia::Shader::SolidColor(color)),
        (
            Some(Shader::Image {
                transform,
                tile_mode,
                ..
            }),
            Some(pixmap),
        ) => Pattern::new(
            pixmap.as_ref(),
            convert_tile_mode(*tile_mode),
            FilterQuality::Bilinear,
            paint.alpha() as f32 / 255.,
            convert_transform(*transform),
        ),
        _ => tiny_skia::Shader::SolidColor(color),
    };
    tiny_skia::Paint {
        shader,
        blend_mode: convert_blend_mode(paint.blend_mode()),
        anti_alias: paint.anti_alias(),
        ..Default::default()
    }
}

fn convert_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.red(), color.green(), color.blue(), color.alpha())
}

fn convert_gradient_stop(stop: GradientStop) -> tiny_skia::GradientStop {
    tiny_skia::GradientStop::new(stop.position(), convert_color(stop.color()))
}

fn convert_transform(transform: Affine2) -> Transform {
    let cols = transform.to_cols_array();
    Transform::from_row(cols[0], cols[1], cols[2], cols[3], cols[4], cols[5])
}

fn convert_point(point: Vec2) -> Point {
    Point::from_xy(point.x, point.y)
}

fn convert_rect(rect: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(rect.pos.x, rect.pos.y, rect.size.x, rect.size.y)
}

fn convert_tile_mode(mode: TileMode) -> SpreadMode {
    match mode {
        TileMode::Clamp | TileMode::Decal => SpreadMode::Pad,
        TileMode::Repeat => SpreadMode::Repeat,
        TileMode::Mirror => SpreadMode::Reflect,
    }
}

fn convert_blend_mode(mode: BlendMode) -> tiny_skia::BlendMode {
    match mode {
        BlendMode::Clear => tiny_skia::BlendMode::Clear,
        BlendMode::Source => tiny_skia::BlendMode::Source,
        BlendMode::SourceOver => tiny_skia::BlendMode::SourceOver,
        BlendMode::DestinationOver => tiny_skia::BlendMode::DestinationOver,
        BlendMode::SourceIn => tiny_skia::BlendMode::SourceIn,
        BlendMode::SourceAtop => tiny_skia::BlendMode::SourceAtop,
        BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
        BlendMode::Screen => tiny_skia::BlendMode::Screen,
        BlendMode::Plus => tiny_skia::BlendMode::Plus,
    }
}

#[cfg(test)]
mod tests {
    use glam::uvec2;

    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn clear_and_fill() {
        let mut target = RasterTarget::new(8, 8);
        target.apply(&Command::Clear(Color::WHITE));
        target.apply(&Command::DrawRect {
            rect: Rect::new(vec2(2., 2.), vec2(4., 4.)),
            paint: Paint::solid(Color::rgb(255, 0, 0)),
        });
        assert_eq!(target.pixel(0, 0), Some(WHITE));
        assert_eq!(target.pixel(3, 3), Some(RED));
        assert_eq!(target.pixel(6, 6), Some(WHITE));
    }

    #[test]
    fn transform_and_clip_are_scoped() {
        let mut target = RasterTarget::new(8, 8);
        target.apply(&Command::Save);
        target.apply(&Command::Concat(Affine2::from_translation(vec2(4., 0.))));
        target.apply(&Command::ClipRect {
            rect: Rect::new(Vec2::ZERO, vec2(4., 8.)),
            op: ClipOp::Intersect,
            anti_alias: false,
        });
        target.apply(&Command::Clear(Color::rgb(255, 0, 0)));
        target.apply(&Command::Restore);
        assert_eq!(target.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(target.pixel(5, 1), Some(RED));

        target.apply(&Command::DrawRect {
            rect: Rect::new(Vec2::ZERO, vec2(1., 1.)),
            paint: Paint::solid(Color::WHITE),
        });
        assert_eq!(target.pixel(0, 0), Some(WHITE));
    }

    #[test]
    fn layers_composite_with_opacity() {
        let mut target = RasterTarget::new(4, 4);
        target.apply(&Command::SaveLayer {
            bounds: None,
            paint: Some(Paint::new().with_alpha(128)),
        });
        target.apply(&Command::DrawPaint(Paint::solid(Color::rgb(255, 0, 0))));
        assert_eq!(target.pixel(0, 0), Some([0, 0, 0, 0]));
        target.apply(&Command::Restore);

        let [r, g, b, a] = target.pixel(0, 0).unwrap();
        assert!((126..=130).contains(&a));
        assert_eq!(r, a);
        assert_eq!((g, b), (0, 0));
    }

    #[test]
    fn draw_filter_can_veto() {
        let mut target = RasterTarget::new(4, 4);
        target.apply(&Command::Save);
        target.apply(&Command::SetDrawFilter(Some(DrawFilter::new(|_, _| false))));
        target.apply(&Command::DrawPaint(Paint::solid(Color::WHITE)));
        target.apply(&Command::Restore);
        assert_eq!(target.pixel(0, 0), Some([0, 0, 0, 0]));
        target.apply(&Command::DrawPaint(Paint::solid(Color::WHITE)));
        assert_eq!(target.pixel(0, 0), Some(WHITE));
    }

    #[test]
    fn pixel_round_trip_through_images() {
        let mut target = RasterTarget::new(4, 4);
        let image = Image::from_color(2, 2, Color::rgb(255, 0, 0));
        target.write_pixels(&image, uvec2(2, 2)).unwrap();
        assert_eq!(target.pixel(3, 3), Some(RED));
        assert_eq!(
            target.read_pixels(uvec2(2, 2), uvec2(2, 2)).unwrap(),
            image.pixels().clone()
        );
        assert!(target.read_pixels(uvec2(3, 3), uvec2(2, 2)).is_err());

        let mut other = RasterTarget::new(4, 4);
        other.apply(&Command::DrawSprite {
            image,
            x: 2,
            y: 2,
            paint: None,
        });
        assert_eq!(other.pixels(), target.pixels());
    }
}
