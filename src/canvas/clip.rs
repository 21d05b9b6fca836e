use crate::Rect;

/// What the canvas knows about the region its clip keeps, in device space.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Kept {
    Everything,
    /// Exactly this rectangle, the result of axis-aligned intersections.
    Rect(Rect),
    /// Something that is not a rectangle.
    Unknown,
}

/// A conservative model of the canvas clip, used to decide whether a draw
/// can reach every pixel of the surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct ClipBounds {
    kept: Kept,
    /// Bounding box of every shape cut out by a difference clip.
    excluded: Option<Rect>,
}

impl Default for ClipBounds {
    fn default() -> Self {
        Self {
            kept: Kept::Everything,
            excluded: None,
        }
    }
}

impl ClipBounds {
    /// Intersects with a device-space rectangle.
    pub fn intersect_rect(&mut self, rect: Rect) {
        self.kept = match self.kept {
            Kept::Everything => Kept::Rect(rect),
            Kept::Rect(current) => Kept::Rect(current.intersection(rect)),
            Kept::Unknown => Kept::Unknown,
        };
    }

    /// Intersects with a shape that is not an axis-aligned rectangle.
    pub fn intersect_unknown(&mut self) {
        self.kept = Kept::Unknown;
    }

    /// Cuts out a shape whose device-space bounding box is `bounds`.
    pub fn exclude(&mut self, bounds: Rect) {
        if bounds.is_empty() {
            return;
        }
        self.excluded = Some(match self.excluded {
            Some(excluded) => Rect::from_ltrb(
                excluded.left().min(bounds.left()),
                excluded.top().min(bounds.top()),
                excluded.right().max(bounds.right()),
                excluded.bottom().max(bounds.bottom()),
            ),
            None => bounds,
        });
    }

    /// Returns whether every pixel of `device` is known to survive the clip.
    pub fn contains(&self, device: Rect) -> bool {
        let kept = match self.kept {
            Kept::Everything => true,
            Kept::Rect(rect) => rect.contains_rect(device),
            Kept::Unknown => false,
        };
        kept && self.excluded.map_or(true, |excluded| !excluded.intersects(device))
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;

    fn device() -> Rect {
        Rect::new(vec2(0., 0.), vec2(100., 100.))
    }

    #[test]
    fn intersections() {
        let mut clip = ClipBounds::default();
        assert!(clip.contains(device()));
        clip.intersect_rect(Rect::from_ltrb(-10., -10., 200., 200.));
        assert!(clip.contains(device()));
        clip.intersect_rect(Rect::from_ltrb(0., 0., 50., 100.));
        assert!(!clip.contains(device()));

        let mut clip = ClipBounds::default();
        clip.intersect_unknown();
        clip.intersect_rect(device());
        assert!(!clip.contains(device()));
    }

    #[test]
    fn exclusions_outside_device_are_harmless() {
        let mut clip = ClipBounds::default();
        clip.exclude(Rect::from_ltrb(200., 200., 300., 300.));
        assert!(clip.contains(device()));
        clip.exclude(Rect::from_ltrb(90., 90., 95., 95.));
        assert!(!clip.contains(device()));
        assert!(clip.contains(Rect::from_ltrb(0., 0., 50., 50.)));
    }
}
