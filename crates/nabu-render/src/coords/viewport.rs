/// Render target size in logical pixels plus the logical-to-physical scale.
///
/// Vertex positions are logical px; the shader maps them to NDC against
/// `width` x `height`. Scissor rects are physical px and get clamped to
/// [`physical_size`](Self::physical_size).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        Self { width, height, scale_factor }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.scale_factor > 0.0
    }

    /// Target size in physical pixels, at least 1x1.
    pub fn physical_size(self) -> (u32, u32) {
        let w = (self.width * self.scale_factor).max(1.0) as u32;
        let h = (self.height * self.scale_factor).max(1.0) as u32;
        (w, h)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size_applies_scale() {
        assert_eq!(Viewport::new(400.0, 300.0, 2.0).physical_size(), (800, 600));
    }

    #[test]
    fn physical_size_is_never_zero() {
        assert_eq!(Viewport::default().physical_size(), (1, 1));
        assert!(!Viewport::default().is_valid());
    }
}
