//! Paints and the opacity analysis used by full-frame occlusion.

use glam::{Affine2, Vec2};
use smallvec::SmallVec;

use crate::{Color, Image};

/// Whether a shape is filled, stroked, or both.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
    StrokeAndFill,
}

/// How source pixels combine with the destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Writes transparent black, ignoring the source.
    Clear,
    /// Replaces the destination with the source.
    Source,
    #[default]
    SourceOver,
    DestinationOver,
    SourceIn,
    SourceAtop,
    Multiply,
    Screen,
    Plus,
}

impl BlendMode {
    /// Returns whether the blended result is independent of the destination
    /// for a source of the given opacity.
    pub fn replaces_destination(self, source: SourceOpacity) -> bool {
        match self {
            BlendMode::Clear | BlendMode::Source => true,
            BlendMode::SourceOver => source == SourceOpacity::Opaque,
            _ => false,
        }
    }
}

/// What is known about the alpha of the source color before blending.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceOpacity {
    /// Every source pixel is fully opaque.
    Opaque,
    /// Every source pixel is transparent black.
    TransparentBlack,
    /// Every source pixel has zero alpha, color unknown.
    TransparentAlpha,
    Unknown,
}

/// A "stop" in a gradient, consisting
/// of a position (0.0..=1.0) along the gradient
/// and the color value at that position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    position: f32,
    color: Color,
}

impl GradientStop {
    pub fn new(position: f32, color: impl Into<Color>) -> Self {
        Self {
            position,
            color: color.into(),
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// How a shader fills the area outside its natural bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TileMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
    /// Transparent outside the bounds.
    Decal,
}

/// Source of color other than the paint's solid color.
#[derive(Clone, Debug, PartialEq)]
pub enum Shader {
    LinearGradient {
        start: Vec2,
        end: Vec2,
        stops: SmallVec<[GradientStop; 4]>,
        tile_mode: TileMode,
    },
    Image {
        image: Image,
        transform: Affine2,
        tile_mode: TileMode,
    },
}

impl Shader {
    pub fn linear_gradient(
        start: Vec2,
        end: Vec2,
        stops: impl IntoIterator<Item = GradientStop>,
    ) -> Self {
        Shader::LinearGradient {
            start,
            end,
            stops: stops.into_iter().collect(),
            tile_mode: TileMode::Clamp,
        }
    }

    pub fn image(image: Image, transform: Affine2) -> Self {
        Shader::Image {
            image,
            transform,
            tile_mode: TileMode::Clamp,
        }
    }

    /// Returns whether every pixel produced by the shader is opaque.
    pub fn is_opaque(&self) -> bool {
        match self {
            Shader::LinearGradient {
                stops, tile_mode, ..
            } => {
                *tile_mode != TileMode::Decal
                    && !stops.is_empty()
                    && stops.iter().all(|stop| stop.color().is_opaque())
            }
            Shader::Image {
                image, tile_mode, ..
            } => *tile_mode != TileMode::Decal && image.is_opaque(),
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Shader::Image { image, .. } => Some(image),
            Shader::LinearGradient { .. } => None,
        }
    }

    fn heap_size(&self) -> usize {
        match self {
            Shader::LinearGradient { stops, .. } if stops.spilled() => {
                stops.capacity() * std::mem::size_of::<GradientStop>()
            }
            _ => 0,
        }
    }
}

/// Filters the coverage mask of a draw before it is blended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MaskFilter {
    Blur { sigma: f32 },
}

/// Alters the geometry of a path before it is drawn.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathEffect {
    Dash { on: f32, off: f32, phase: f32 },
    Corner { radius: f32 },
}

/// Draws a shape more than once, e.g. to add a drop shadow.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DrawLooper {
    Shadow { offset: Vec2, blur: f32, color: Color },
}

/// Filters the rendered result of a draw as an image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ImageFilter {
    Blur { sigma: f32 },
    Offset(Vec2),
}

/// Transforms the source color before blending.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ColorFilter {
    /// Multiplies every channel, alpha included, by the color.
    Modulate(Color),
    /// Replaces the color channels, keeping source alpha.
    Tint(Color),
}

impl ColorFilter {
    fn preserves_alpha(&self) -> bool {
        match self {
            ColorFilter::Modulate(color) => color.is_opaque(),
            ColorFilter::Tint(_) => true,
        }
    }
}

/// Describes how a draw is colored and composited.
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    color: Color,
    style: PaintStyle,
    stroke_width: f32,
    blend_mode: BlendMode,
    anti_alias: bool,
    shader: Option<Shader>,
    color_filter: Option<ColorFilter>,
    mask_filter: Option<MaskFilter>,
    path_effect: Option<PathEffect>,
    looper: Option<DrawLooper>,
    image_filter: Option<ImageFilter>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            style: PaintStyle::default(),
            stroke_width: 1.,
            blend_mode: BlendMode::default(),
            anti_alias: false,
            shader: None,
            color_filter: None,
            mask_filter: None,
            path_effect: None,
            looper: None,
            image_filter: None,
        }
    }
}

impl Paint {
    /// An opaque black fill with source-over blending.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fill of the given solid color.
    pub fn solid(color: Color) -> Self {
        Self::new().with_color(color)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Replaces only the alpha of the paint color.
    pub fn with_alpha(mut self, alpha: u8) -> Self {
        self.color = self.color.with_alpha(alpha);
        self
    }

    pub fn with_style(mut self, style: PaintStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }

    pub fn with_shader(mut self, shader: Shader) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_color_filter(mut self, filter: ColorFilter) -> Self {
        self.color_filter = Some(filter);
        self
    }

    pub fn with_mask_filter(mut self, filter: MaskFilter) -> Self {
        self.mask_filter = Some(filter);
        self
    }

    pub fn with_path_effect(mut self, effect: PathEffect) -> Self {
        self.path_effect = Some(effect);
        self
    }

    pub fn with_looper(mut self, looper: DrawLooper) -> Self {
        self.looper = Some(looper);
        self
    }

    pub fn with_image_filter(mut self, filter: ImageFilter) -> Self {
        self.image_filter = Some(filter);
        self
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn alpha(&self) -> u8 {
        self.color.alpha()
    }

    pub fn style(&self) -> PaintStyle {
        self.style
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn anti_alias(&self) -> bool {
        self.anti_alias
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    pub fn color_filter(&self) -> Option<ColorFilter> {
        self.color_filter
    }

    pub fn mask_filter(&self) -> Option<MaskFilter> {
        self.mask_filter
    }

    pub fn path_effect(&self) -> Option<PathEffect> {
        self.path_effect
    }

    pub fn looper(&self) -> Option<DrawLooper> {
        self.looper
    }

    pub fn image_filter(&self) -> Option<ImageFilter> {
        self.image_filter
    }

    /// Returns whether any effect may move, blur, or repeat
    /// the coverage of a draw.
    pub fn has_geometry_effects(&self) -> bool {
        self.mask_filter.is_some()
            || self.path_effect.is_some()
            || self.looper.is_some()
            || self.image_filter.is_some()
    }

    /// Returns whether the style paints the interior of a shape.
    pub fn fills_interior(&self) -> bool {
        matches!(self.style, PaintStyle::Fill | PaintStyle::StrokeAndFill)
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.shader.as_ref().map_or(0, Shader::heap_size)
    }
}

/// Returns whether drawing with `paint` fully replaces the destination pixels
/// it covers.
///
/// `image` is the image drawn by the operation, if any; its pixels take the
/// place of the paint's shader. A missing paint draws the image as-is.
/// Anything that cannot be proven opaque is reported as not opaque.
pub fn is_paint_opaque(paint: Option<&Paint>, image: Option<&Image>) -> bool {
    let paint = match paint {
        Some(paint) => paint,
        None => return image.map_or(true, Image::is_opaque),
    };

    let mut opacity = SourceOpacity::Unknown;
    let alpha_preserved = paint
        .color_filter()
        .map_or(true, |filter| filter.preserves_alpha());

    if alpha_preserved {
        if paint.alpha() == u8::MAX
            && image.map_or(true, Image::is_opaque)
            && paint.shader().map_or(true, Shader::is_opaque)
        {
            opacity = SourceOpacity::Opaque;
        } else if paint.alpha() == 0 {
            opacity = if paint.shader().is_none() && image.is_none() {
                SourceOpacity::TransparentBlack
            } else {
                SourceOpacity::TransparentAlpha
            };
        }
    }

    paint.blend_mode().replaces_destination(opacity)
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;

    #[test]
    fn solid_paints() {
        assert!(is_paint_opaque(Some(&Paint::solid(Color::WHITE)), None));
        assert!(!is_paint_opaque(
            Some(&Paint::solid(Color::WHITE).with_alpha(254)),
            None
        ));
        // Source replaces the destination whatever its alpha.
        assert!(is_paint_opaque(
            Some(&Paint::solid(Color::TRANSPARENT).with_blend_mode(BlendMode::Source)),
            None
        ));
        assert!(!is_paint_opaque(
            Some(&Paint::solid(Color::WHITE).with_blend_mode(BlendMode::Multiply)),
            None
        ));
    }

    #[test]
    fn shaders_and_filters() {
        let opaque_gradient = Shader::linear_gradient(
            Vec2::ZERO,
            vec2(10., 0.),
            [
                GradientStop::new(0., Color::BLACK),
                GradientStop::new(1., Color::WHITE),
            ],
        );
        let paint = Paint::new().with_shader(opaque_gradient);
        assert!(is_paint_opaque(Some(&paint), None));

        let translucent = Shader::linear_gradient(
            Vec2::ZERO,
            vec2(10., 0.),
            [GradientStop::new(0., Color::rgba(0, 0, 0, 12))],
        );
        assert!(!is_paint_opaque(
            Some(&Paint::new().with_shader(translucent)),
            None
        ));

        let modulated = Paint::new().with_color_filter(ColorFilter::Modulate(Color::rgba(
            255, 255, 255, 128,
        )));
        assert!(!is_paint_opaque(Some(&modulated), None));
        let tinted = Paint::new().with_color_filter(ColorFilter::Tint(Color::WHITE));
        assert!(is_paint_opaque(Some(&tinted), None));
    }

    #[test]
    fn images() {
        let opaque = Image::from_color(2, 2, Color::WHITE);
        let translucent = Image::from_color(2, 2, Color::rgba(0, 0, 0, 100));
        assert!(is_paint_opaque(None, Some(&opaque)));
        assert!(!is_paint_opaque(None, Some(&translucent)));
        assert!(!is_paint_opaque(
            Some(&Paint::new().with_alpha(128)),
            Some(&opaque)
        ));
    }
}
