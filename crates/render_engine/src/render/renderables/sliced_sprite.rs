//! Nine-slice sprites
//!
//! A sliced sprite keeps its corners at a fixed size while the edges and
//! center stretch, which is what UI panels and buttons need. The quad is cut
//! into a 3x3 grid; every cell with a positive extent becomes one sprite of
//! the chain.

use std::sync::Arc;

use super::{ElementData, InstancedRenderable};
use crate::foundation::math::{BoundingBox, Color, Rectf, Vec2, Vec3};
use crate::render::element::{RenderElement, RenderSpriteChain, SpriteVertex};
use crate::render::material::MaterialInstance;
use crate::render::resources::{RenderDevice, VertexDeclarationHandle};

/// Texture property whose size drives pixel-space texture rects
const BASE_COLOR_MAP: &str = "BaseColorMap";

/// Fixed-size corner of a sliced sprite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    /// Size in world units
    pub size: Vec2,
    /// Size as a fraction of the texture rectangle
    pub texture_coords: Vec2,
}

impl Corner {
    /// Create a corner
    pub const fn new(size: Vec2, texture_coords: Vec2) -> Self {
        Self { size, texture_coords }
    }
}

impl Default for Corner {
    fn default() -> Self {
        Self::new(Vec2::zeros(), Vec2::zeros())
    }
}

/// Sprite whose corners do not stretch
#[derive(Debug, Clone)]
pub struct SlicedSprite {
    material: Arc<MaterialInstance>,
    vertex_declaration: VertexDeclarationHandle,
    top_left: Corner,
    bottom_right: Corner,
    color: Color,
    size: Vec2,
    texture_coords: Rectf,
    render_layer: i32,
    vertices: Arc<[SpriteVertex]>,
    bounding_box: BoundingBox,
}

impl SlicedSprite {
    /// A 64x64 white sprite with empty corners, showing the whole texture
    pub fn new(material: Arc<MaterialInstance>, vertex_declaration: VertexDeclarationHandle) -> Self {
        let mut sprite = Self {
            material,
            vertex_declaration,
            top_left: Corner::default(),
            bottom_right: Corner::default(),
            color: Color::WHITE,
            size: Vec2::new(64.0, 64.0),
            texture_coords: Rectf::new(0.0, 0.0, 1.0, 1.0),
            render_layer: 0,
            vertices: Arc::from(Vec::new()),
            bounding_box: BoundingBox::zero(),
        };
        sprite.update_vertices();
        sprite
    }

    /// Set both fixed corners
    pub fn set_corners(&mut self, top_left: Corner, bottom_right: Corner) {
        self.top_left = top_left;
        self.bottom_right = bottom_right;
        self.update_vertices();
    }

    /// Set the overall size in world units
    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
        self.update_vertices();
    }

    /// Set the vertex color
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.update_vertices();
    }

    /// Set the normalized texture rectangle shown
    pub fn set_texture_coords(&mut self, texture_coords: Rectf) {
        self.texture_coords = texture_coords;
        self.update_vertices();
    }

    /// Set the texture rectangle in texels of the base color texture
    pub fn set_texture_rect(&mut self, texture_rect: Rectf, device: &dyn RenderDevice) {
        let [width, height, _] = self.texture_size(device);
        let (width, height) = (width as f32, height as f32);
        self.set_texture_coords(Rectf::new(
            texture_rect.x / width,
            texture_rect.y / height,
            texture_rect.width / width,
            texture_rect.height / height,
        ));
    }

    /// Set the render layer
    pub fn set_render_layer(&mut self, render_layer: i32) {
        self.render_layer = render_layer;
    }

    /// Number of non-empty cells
    pub fn sprite_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Current vertices, four per non-empty cell
    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    /// Size of the material's base color texture
    ///
    /// Falls back to one texel in every dimension, so dividing by it is
    /// always safe.
    pub fn texture_size(&self, device: &dyn RenderDevice) -> [u32; 3] {
        self.material
            .texture_property(BASE_COLOR_MAP)
            .and_then(|texture| device.texture_size(texture))
            .unwrap_or([1, 1, 1])
    }

    fn update_vertices(&mut self) {
        let (top_left, bottom_right) = (self.top_left, self.bottom_right);
        let texture_coords = self.texture_coords;

        let heights = [
            top_left.size.y,
            self.size.y - top_left.size.y - bottom_right.size.y,
            bottom_right.size.y,
        ];
        let widths = [
            top_left.size.x,
            self.size.x - top_left.size.x - bottom_right.size.x,
            bottom_right.size.x,
        ];
        let uv_widths = slice_extent(texture_coords.width, top_left.texture_coords.x, bottom_right.texture_coords.x);
        let uv_heights = slice_extent(texture_coords.height, top_left.texture_coords.y, bottom_right.texture_coords.y);

        let mut vertices = Vec::with_capacity(9 * 4);
        let mut origin = Vec3::zeros();
        let mut top_left_uv = texture_coords.left_top();

        for (row, &height) in heights.iter().enumerate() {
            if height > 0.0 {
                for (column, &width) in widths.iter().enumerate() {
                    if width > 0.0 {
                        let uv_size = Vec2::new(uv_widths[column], uv_heights[row]);
                        let cell = [
                            (Vec3::zeros(), Vec2::zeros()),
                            (Vec3::new(width, 0.0, 0.0), Vec2::new(uv_size.x, 0.0)),
                            (Vec3::new(0.0, height, 0.0), Vec2::new(0.0, uv_size.y)),
                            (Vec3::new(width, height, 0.0), uv_size),
                        ];

                        for (offset, uv_offset) in cell {
                            let position = origin + offset;
                            let uv = top_left_uv + uv_offset;
                            // Texture space grows downward, world space upward
                            let flipped_v = texture_coords.height - uv.y;
                            vertices.push(SpriteVertex::new(
                                [position.x, position.y, position.z],
                                self.color,
                                [uv.x, flipped_v],
                            ));
                        }

                        origin.x += width;
                    }

                    top_left_uv.x += uv_widths[column];
                }

                origin.y += height;
            }

            origin.x = 0.0;
            top_left_uv.x = texture_coords.x;
            top_left_uv.y += uv_heights[row];
        }

        self.bounding_box = vertices
            .iter()
            .map(|vertex| Vec3::from(vertex.position))
            .fold(None, |aabb: Option<BoundingBox>, point| {
                let mut aabb = aabb.unwrap_or_else(|| BoundingBox::from_point(point));
                aabb.extend_to(point);
                Some(aabb)
            })
            .unwrap_or_else(BoundingBox::zero);
        self.vertices = vertices.into();
    }
}

/// Split a texture extent into start corner, stretched middle and end corner
fn slice_extent(extent: f32, start_fraction: f32, end_fraction: f32) -> [f32; 3] {
    let start = start_fraction * extent;
    let end = end_fraction * extent;
    [start, extent - start - end, end]
}

impl InstancedRenderable for SlicedSprite {
    fn build_elements(&self, pass_index: usize, element_data: &ElementData<'_>, elements: &mut Vec<RenderElement>) {
        let Some(pipeline) = self.material.pipeline(pass_index) else {
            return;
        };
        if self.vertices.is_empty() {
            return;
        }

        elements.push(RenderElement::SpriteChain(RenderSpriteChain {
            render_layer: self.render_layer,
            material_instance: Arc::clone(&self.material),
            pipeline,
            world_instance: Arc::clone(element_data.world_instance),
            vertex_declaration: self.vertex_declaration,
            texture_overlay: None,
            vertices: Arc::clone(&self.vertices),
            scissor_box: element_data.scissor_box,
        }));
    }

    fn material_count(&self) -> usize {
        1
    }

    fn material(&self, index: usize) -> Option<&Arc<MaterialInstance>> {
        (index == 0).then_some(&self.material)
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    fn render_layer(&self) -> i32 {
        self.render_layer
    }
}
