use glam::{vec2, Affine2, Vec2};

/// A rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rect {
    /// The position of the top-left corner
    /// of this rectangle.
    pub pos: Vec2,
    /// The side lengths of this rectangle.
    pub size: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self { pos, size }
    }

    /// Creates a rectangle from its left, top, right and bottom edges.
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            pos: vec2(left, top),
            size: vec2(right - left, bottom - top),
        }
    }

    pub fn left(&self) -> f32 {
        self.pos.x
    }

    pub fn top(&self) -> f32 {
        self.pos.y
    }

    pub fn right(&self) -> f32 {
        self.pos.x + self.size.x
    }

    pub fn bottom(&self) -> f32 {
        self.pos.y + self.size.y
    }

    pub fn is_empty(&self) -> bool {
        !(self.size.x > 0. && self.size.y > 0.)
    }

    pub fn offset(self, offset: Vec2) -> Self {
        Self {
            pos: self.pos + offset,
            size: self.size,
        }
    }

    pub fn contains(self, pos: Vec2) -> bool {
        pos.x >= self.pos.x
            && pos.y >= self.pos.y
            && pos.x < (self.pos.x + self.size.x)
            && pos.y < (self.pos.y + self.size.y)
    }

    /// Returns whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(self, other: Rect) -> bool {
        self.left() <= other.left()
            && self.top() <= other.top()
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Returns whether the two rectangles share any area.
    pub fn intersects(self, other: Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Computes the overlap of two rectangles. The result
    /// is empty (but never has negative size) if they do not overlap.
    pub fn intersection(self, other: Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right()).max(left);
        let bottom = self.bottom().min(other.bottom()).max(top);
        Rect::from_ltrb(left, top, right, bottom)
    }

    /// Flips negative side lengths so that `pos` is the top-left corner.
    pub fn normalize_negative_size(&mut self) {
        if self.size.x < 0. {
            self.pos.x += self.size.x;
            self.size.x = -self.size.x;
        }
        if self.size.y < 0. {
            self.pos.y += self.size.y;
            self.size.y = -self.size.y;
        }
    }

    pub fn bbox_transformed(self, transform: Affine2) -> Self {
        let points = [
            self.pos,
            self.pos + vec2(0., self.size.y),
            self.pos + vec2(self.size.x, 0.),
            self.pos + self.size,
        ]
        .map(|p| transform.transform_point2(p));

        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(-f32::INFINITY);
        for point in points {
            min = min.min(point);
            max = max.max(point);
        }

        Self {
            pos: min,
            size: max - min,
        }
    }
}

/// Returns whether `transform` maps axis-aligned rectangles
/// to axis-aligned rectangles (no skew, rotation only by multiples of 90 degrees).
pub fn rect_stays_rect(transform: Affine2) -> bool {
    let m = transform.matrix2;
    if !m.is_finite() || !transform.translation.is_finite() || m.determinant() == 0. {
        return false;
    }
    (m.x_axis.y == 0. && m.y_axis.x == 0.) || (m.x_axis.x == 0. && m.y_axis.y == 0.)
}

/// The rounding radius applied to each corner of a rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct BorderRadii {
    top_left: f32,
    top_right: f32,
    bottom_left: f32,
    bottom_right: f32,
}

impl BorderRadii {
    /// All corners have the same border radius.
    pub fn all(radius: f32) -> Self {
        Self {
            top_left: radius,
            top_right: radius,
            bottom_left: radius,
            bottom_right: radius,
        }
    }

    /// Explicitly set each corner's radius.
    pub fn new(top_left: f32, top_right: f32, bottom_right: f32, bottom_left: f32) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    pub fn top_left(&self) -> f32 {
        self.top_left
    }

    pub fn top_right(&self) -> f32 {
        self.top_right
    }

    pub fn bottom_left(&self) -> f32 {
        self.bottom_left
    }

    pub fn bottom_right(&self) -> f32 {
        self.bottom_right
    }

    fn as_array(&self) -> [f32; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// A rectangle with rounded corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RoundedRect {
    rect: Rect,
    radii: BorderRadii,
}

impl RoundedRect {
    pub fn new(mut rect: Rect, radii: BorderRadii) -> Self {
        rect.normalize_negative_size();
        Self { rect, radii }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn radii(&self) -> BorderRadii {
        self.radii
    }

    /// Returns whether every corner is square.
    pub fn is_rect(&self) -> bool {
        self.radii.as_array().iter().all(|&r| r <= 0.)
    }

    /// Returns whether the corners meet to form a circle.
    pub fn is_oval(&self) -> bool {
        let size = self.rect.size;
        let half = size.x / 2.;
        size.x > 0. && size.x == size.y && self.radii.as_array().iter().all(|&r| r >= half)
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat2;

    use super::*;

    #[test]
    fn intersection_never_negative() {
        let a = Rect::new(vec2(0., 0.), vec2(10., 10.));
        let b = Rect::new(vec2(20., 20.), vec2(5., 5.));
        assert!(!a.intersects(b));
        assert!(a.intersection(b).is_empty());

        let c = Rect::new(vec2(5., 5.), vec2(10., 10.));
        assert_eq!(a.intersection(c), Rect::new(vec2(5., 5.), vec2(5., 5.)));
    }

    #[test]
    fn axis_alignment() {
        assert!(rect_stays_rect(Affine2::IDENTITY));
        assert!(rect_stays_rect(Affine2::from_scale(vec2(2., -1.))));
        assert!(rect_stays_rect(Affine2::from_mat2(Mat2::from_cols(
            vec2(0., 1.),
            vec2(-1., 0.)
        ))));
        assert!(!rect_stays_rect(Affine2::from_angle(0.3)));
        assert!(!rect_stays_rect(Affine2::from_scale(vec2(0., 1.))));
    }

    #[test]
    fn rounded_rect_degenerates() {
        let rect = Rect::new(Vec2::ZERO, vec2(10., 10.));
        assert!(RoundedRect::new(rect, BorderRadii::all(0.)).is_rect());
        assert!(RoundedRect::new(rect, BorderRadii::all(5.)).is_oval());
        assert!(!RoundedRect::new(rect, BorderRadii::all(2.)).is_oval());
    }
}
