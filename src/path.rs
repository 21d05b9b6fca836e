use glam::Vec2;

use crate::Rect;

/// An outline made of lines and Bezier curves, in local coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn builder() -> PathBuilder {
        PathBuilder::default()
    }

    pub fn segments(&self) -> impl Iterator<Item = PathSegment> + '_ {
        self.segments.iter().copied()
    }

    /// Axis-aligned box around every point of the path, control points
    /// included. Empty paths have an empty box at the origin.
    pub fn bounds(&self) -> Rect {
        let mut points = self.segments.iter().flat_map(PathSegment::points);
        let first = match points.next() {
            Some(point) => point,
            None => return Rect::default(),
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Rect::new(min, max - min)
    }

    pub(crate) fn heap_size(&self) -> usize {
        self.segments.capacity() * std::mem::size_of::<PathSegment>()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathSegment {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo {
        control: Vec2,
        end: Vec2,
    },
    CubicTo {
        control1: Vec2,
        control2: Vec2,
        end: Vec2,
    },
    Close,
}

impl PathSegment {
    fn points(&self) -> impl Iterator<Item = Vec2> {
        let points = match *self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => [Some(p), None, None],
            PathSegment::QuadTo { control, end } => [Some(control), Some(end), None],
            PathSegment::CubicTo {
                control1,
                control2,
                end,
            } => [Some(control1), Some(control2), Some(end)],
            PathSegment::Close => [None; 3],
        };
        points.into_iter().flatten()
    }
}

/// Builds a [`Path`] by chaining segment calls.
#[derive(Default)]
pub struct PathBuilder {
    segments: Vec<PathSegment>,
}

impl PathBuilder {
    /// Starts a new contour at `point`.
    pub fn move_to(self, point: Vec2) -> Self {
        self.push(PathSegment::MoveTo(point))
    }

    pub fn line_to(self, point: Vec2) -> Self {
        self.push(PathSegment::LineTo(point))
    }

    pub fn quad_to(self, control: Vec2, end: Vec2) -> Self {
        self.push(PathSegment::QuadTo { control, end })
    }

    pub fn cubic_to(self, control1: Vec2, control2: Vec2, end: Vec2) -> Self {
        self.push(PathSegment::CubicTo {
            control1,
            control2,
            end,
        })
    }

    /// Closes the current contour and returns the path.
    pub fn close(self) -> Path {
        self.push(PathSegment::Close).finish()
    }

    /// Returns the path, leaving the last contour open.
    pub fn finish(self) -> Path {
        Path {
            segments: self.segments,
        }
    }

    fn push(mut self, segment: PathSegment) -> Self {
        self.segments.push(segment);
        self
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;

    #[test]
    fn bounds_include_control_points() {
        let path = Path::builder()
            .move_to(vec2(10., 10.))
            .quad_to(vec2(50., -20.), vec2(30., 30.))
            .close();
        assert_eq!(path.bounds(), Rect::from_ltrb(10., -20., 50., 30.));
        assert_eq!(Path::default().bounds(), Rect::default());
    }

    #[test]
    fn open_paths_have_no_close() {
        let path = Path::builder()
            .move_to(Vec2::ZERO)
            .line_to(vec2(1., 1.))
            .finish();
        assert_eq!(path.segments().last(), Some(PathSegment::LineTo(vec2(1., 1.))));
    }
}
