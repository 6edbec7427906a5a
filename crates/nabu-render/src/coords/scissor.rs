/// Clip rectangle in physical pixels.
///
/// Integer-valued so that two render states compare bit-equal exactly when
/// they clip to the same region.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    fn right(self) -> u32 {
        self.x.saturating_add(self.width)
    }

    #[inline]
    fn bottom(self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Overlap of two clips. Disjoint clips yield `None`.
    pub fn intersect(self, other: ScissorRect) -> Option<ScissorRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(ScissorRect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// Clamps the clip to a `width` x `height` target.
    ///
    /// Returns `None` if nothing of the clip remains visible.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<ScissorRect> {
        self.intersect(ScissorRect::new(0, 0, width, height))
    }
}
