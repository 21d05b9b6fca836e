/// An 8-bit sRGB color, not premultiplied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color([u8; 4]);

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(u8::MAX, u8::MAX, u8::MAX);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    /// An opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, u8::MAX)
    }

    pub fn red(&self) -> u8 {
        self.0[0]
    }

    pub fn green(&self) -> u8 {
        self.0[1]
    }

    pub fn blue(&self) -> u8 {
        self.0[2]
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha() == u8::MAX
    }

    /// The color as premultiplied RGBA8, the layout of image pixels.
    pub fn to_premultiplied(&self) -> [u8; 4] {
        let [r, g, b, a] = self.0;
        let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        [mul(r), mul(g), mul(b), a]
    }
}

#[cfg(test)]
mod tests {
    use super::Color;

    #[test]
    fn premultiply() {
        assert_eq!(Color::rgba(255, 0, 100, 0).to_premultiplied(), [0, 0, 0, 0]);
        assert_eq!(Color::rgb(12, 34, 56).to_premultiplied(), [12, 34, 56, 255]);
        assert_eq!(Color::rgba(255, 255, 255, 128).to_premultiplied()[0], 128);
        assert!(!Color::WHITE.with_alpha(254).is_opaque());
    }
}
