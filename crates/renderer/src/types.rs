//! Plain data types serialized into frame buffers.
//!
//! All of them are `#[repr(C)]` and [`Pod`], so their byte image is exactly
//! what shaders read.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

/// Axis-aligned rectangle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `[x, y, width, height]` with the origin moved by `offset`.
    #[inline]
    pub fn to_float(&self, offset: Vec2) -> [f32; 4] {
        [
            self.x + offset.x,
            self.y + offset.y,
            self.width,
            self.height,
        ]
    }
}

/// Non-premultiplied color, each channel in `0.0..=1.0`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Rgba {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }
}

/// One stop of a gradient: position along the gradient and its color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Rgba,
}

impl ColorStop {
    pub const fn new(offset: f32, color: Rgba) -> Self {
        Self { offset, color }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_to_float_applies_offset_to_origin_only() {
        let rect = Rect::new(1.0, 2.0, 30.0, 40.0);
        assert_eq!(
            rect.to_float(Vec2::new(10.0, 20.0)),
            [11.0, 22.0, 30.0, 40.0]
        );
    }

    #[test]
    fn test_rgba_channel_order() {
        let color = Rgba::new(0.1, 0.2, 0.3, 0.4);
        assert_eq!(color.to_array(), [0.1, 0.2, 0.3, 0.4]);
        assert_eq!(bytemuck::bytes_of(&color), bytemuck::bytes_of(&color.to_array()));
    }

    #[test]
    fn test_color_stop_layout() {
        assert_eq!(std::mem::size_of::<ColorStop>(), 20);
        assert_eq!(std::mem::align_of::<ColorStop>(), 4);
    }
}
