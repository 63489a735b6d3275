//! Math utilities and types
//!
//! Provides the small set of math types the render core needs: nalgebra
//! vector aliases, integer/float rectangles for scissor and texture regions,
//! a linear RGBA color and an axis-aligned bounding box.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Axis-aligned rectangle described by its top-left corner and its extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect<T> {
    /// Left edge
    pub x: T,
    /// Top edge
    pub y: T,
    /// Horizontal extent
    pub width: T,
    /// Vertical extent
    pub height: T,
}

/// Integer rectangle, used for scissor boxes and viewports
pub type Recti = Rect<i32>;

/// Floating point rectangle, used for texture coordinates and glyph bounds
pub type Rectf = Rect<f32>;

impl<T> Rect<T> {
    /// Create a new rectangle
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Self { x, y, width, height }
    }
}

impl Recti {
    /// Rectangle covering a render target of the given size, anchored at the origin
    ///
    /// Fractional sizes are floored, so a 800.7 x 600.2 target yields 800 x 600.
    pub fn from_target_size(size: Vec2) -> Self {
        Self::new(0, 0, size.x.floor() as i32, size.y.floor() as i32)
    }

    /// A rectangle with a negative extent is the "unset" sentinel some callers still pass around
    ///
    /// A negative height marks it unset as well as a negative width, so a
    /// rectangle is only valid when both extents are non-negative.
    pub const fn is_valid(&self) -> bool {
        self.width >= 0 && self.height >= 0
    }
}

impl Rectf {
    /// Top-left corner
    pub fn left_top(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Bottom-right corner
    pub fn right_bottom(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }
}

/// Linear RGBA color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
    /// Alpha channel
    pub a: f32,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque black
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from its four channels
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Degenerate box at the origin
    pub fn zero() -> Self {
        Self::from_point(Vec3::zeros())
    }

    /// Degenerate box containing a single point
    pub const fn from_point(point: Vec3) -> Self {
        Self { min: point, max: point }
    }

    /// Grow the box so it contains `point`
    pub fn extend_to(&mut self, point: Vec3) {
        self.min = self.min.inf(&point);
        self.max = self.max.sup(&point);
    }

    /// Box extent along each axis
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rect_from_target_size_floors() {
        let rect = Recti::from_target_size(Vec2::new(800.7, 600.2));
        assert_eq!(rect, Recti::new(0, 0, 800, 600));
    }

    #[test]
    fn test_negative_extent_is_invalid() {
        assert!(Recti::new(0, 0, 10, 10).is_valid());
        assert!(!Recti::new(-1, -1, -1, -1).is_valid());
        assert!(!Recti::new(0, 0, 10, -1).is_valid());
        assert!(!Recti::new(0, 0, -1, 10).is_valid());
    }

    #[test]
    fn test_bounding_box_extend() {
        let mut aabb = BoundingBox::from_point(Vec3::new(1.0, 1.0, 0.0));
        aabb.extend_to(Vec3::new(-2.0, 3.0, 0.5));

        assert_relative_eq!(aabb.min, Vec3::new(-2.0, 1.0, 0.0));
        assert_relative_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert_relative_eq!(aabb.size().x, 3.0);
    }
}
