//! Small shared types used throughout the crate.

/// Tolerance for floating-point comparisons.
pub const EPSILON: f32 = 1e-6;

/// Geometry inputs smaller than this are treated as degenerate.
pub const DEGENERATE_TOLERANCE: f64 = 1e-5;

/// Separator between name segments in an item's fullname ("root:arm:target").
pub const SEPARATOR: char = ':';

/// An RGBA color with components in `[0, 1]`.
///
/// `#[repr(C)]` + `Pod` so hosts can upload color data to the GPU zero-copy.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RgbaColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl RgbaColor {
    pub const WHITE: Self = Self::opaque(1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::opaque(0.0, 0.0, 0.0);
    pub const RED: Self = Self::opaque(1.0, 0.0, 0.0);
    pub const GREEN: Self = Self::opaque(0.0, 1.0, 0.0);
    pub const BLUE: Self = Self::opaque(0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// A fully opaque color.
    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

impl Default for RgbaColor {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_constants() {
        assert_eq!(RgbaColor::WHITE, RgbaColor::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(RgbaColor::RED.a, 1.0);
        assert_eq!(RgbaColor::default(), RgbaColor::WHITE);
    }

    #[test]
    fn test_color_is_pod() {
        let colors = [RgbaColor::RED, RgbaColor::BLUE];
        let bytes: &[u8] = bytemuck::cast_slice(&colors);
        assert_eq!(bytes.len(), 2 * 4 * std::mem::size_of::<f32>());
    }
}
