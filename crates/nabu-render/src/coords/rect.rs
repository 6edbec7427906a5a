use super::Vec2;

/// Axis-aligned rectangle in logical pixels, stored as its two corners.
///
/// `min` is the top-left corner for rectangles built with a non-negative
/// extent; [`normalized`](Self::normalized) restores that for the rest.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Rectangle at `(x, y)` extending `w` right and `h` down.
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            min: Vec2::new(x, y),
            max: Vec2::new(x + w, y + h),
        }
    }

    #[inline]
    pub fn width(self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(self) -> f32 {
        self.max.y - self.min.y
    }

    /// True for zero, negative or NaN extents.
    #[inline]
    pub fn is_empty(self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    #[inline]
    pub fn normalized(self) -> Self {
        Self {
            min: Vec2::new(self.min.x.min(self.max.x), self.min.y.min(self.max.y)),
            max: Vec2::new(self.min.x.max(self.max.x), self.min.y.max(self.max.y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stores_far_corner() {
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.max, Vec2::new(4.0, 6.0));
        assert_eq!((r.width(), r.height()), (3.0, 4.0));
    }

    #[test]
    fn flipped_extent_normalizes_to_same_area() {
        let n = Rect::new(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, Rect::new(6.0, 7.0, 4.0, 3.0));
        assert!(!n.is_empty());
    }

    #[test]
    fn degenerate_rects_are_empty() {
        assert!(Rect::new(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(Rect::new(0.0, 0.0, -1.0, 5.0).is_empty());
        assert!(Rect::new(0.0, 0.0, f32::NAN, 5.0).is_empty());
    }
}
