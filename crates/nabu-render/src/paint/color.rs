/// Linear RGBA with premultiplied alpha, as written into vertex colors.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::premul(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::premul(0.0, 0.0, 0.0, 0.0);

    /// Components already multiplied by `a`.
    #[inline]
    pub const fn premul(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Straight-alpha components, clamped to `[0, 1]` and premultiplied.
    pub fn straight(r: f32, g: f32, b: f32, a: f32) -> Self {
        let a = a.clamp(0.0, 1.0);
        Self::premul(r.clamp(0.0, 1.0) * a, g.clamp(0.0, 1.0) * a, b.clamp(0.0, 1.0) * a, a)
    }

    /// Straight-alpha 8-bit components, e.g. `0xff8800ff` split into bytes.
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let f = |c: u8| c as f32 / 255.0;
        Self::straight(f(r), f(g), f(b), f(a))
    }

    /// Scales every component; premultiplied colors fade uniformly.
    #[inline]
    pub fn with_opacity(self, opacity: f32) -> Self {
        let k = opacity.clamp(0.0, 1.0);
        Self::premul(self.r * k, self.g * k, self.b * k, self.a * k)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}
