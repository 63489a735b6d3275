//! Single textured quads

use std::sync::Arc;

use super::{ElementData, InstancedRenderable};
use crate::foundation::math::{BoundingBox, Color, Rectf, Vec2, Vec3};
use crate::render::element::{RenderElement, RenderSpriteChain, SpriteVertex};
use crate::render::material::MaterialInstance;
use crate::render::resources::VertexDeclarationHandle;

/// A textured, colored quad
#[derive(Debug, Clone)]
pub struct Sprite {
    material: Arc<MaterialInstance>,
    vertex_declaration: VertexDeclarationHandle,
    color: Color,
    size: Vec2,
    origin: Vec3,
    texture_coords: Rectf,
    render_layer: i32,
    vertices: Arc<[SpriteVertex]>,
    bounding_box: BoundingBox,
}

impl Sprite {
    /// A 64x64 white sprite showing the whole texture
    ///
    /// `vertex_declaration` is the sprite vertex layout registered with the
    /// device, usually the one from the default resources.
    pub fn new(material: Arc<MaterialInstance>, vertex_declaration: VertexDeclarationHandle) -> Self {
        let mut sprite = Self {
            material,
            vertex_declaration,
            color: Color::WHITE,
            size: Vec2::new(64.0, 64.0),
            origin: Vec3::zeros(),
            texture_coords: Rectf::new(0.0, 0.0, 1.0, 1.0),
            render_layer: 0,
            vertices: Arc::from(Vec::new()),
            bounding_box: BoundingBox::zero(),
        };
        sprite.update_vertices();
        sprite
    }

    /// Set the size in world units
    pub fn set_size(&mut self, size: Vec2) {
        self.size = size;
        self.update_vertices();
    }

    /// Set the vertex color
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.update_vertices();
    }

    /// Set the point of the quad placed at the node's position
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
        self.update_vertices();
    }

    /// Set the normalized texture rectangle shown
    pub fn set_texture_coords(&mut self, texture_coords: Rectf) {
        self.texture_coords = texture_coords;
        self.update_vertices();
    }

    /// Set the render layer
    pub fn set_render_layer(&mut self, render_layer: i32) {
        self.render_layer = render_layer;
    }

    /// Current vertices
    pub fn vertices(&self) -> &[SpriteVertex] {
        &self.vertices
    }

    fn update_vertices(&mut self) {
        let left_top = self.texture_coords.left_top();
        let right_bottom = self.texture_coords.right_bottom();
        let corners = [
            (Vec3::zeros(), [left_top.x, right_bottom.y]),
            (Vec3::new(self.size.x, 0.0, 0.0), [right_bottom.x, right_bottom.y]),
            (Vec3::new(0.0, self.size.y, 0.0), [left_top.x, left_top.y]),
            (Vec3::new(self.size.x, self.size.y, 0.0), [right_bottom.x, left_top.y]),
        ];

        let vertices: Vec<SpriteVertex> = corners
            .iter()
            .map(|(position, uv)| {
                let position = position - self.origin;
                SpriteVertex::new([position.x, position.y, position.z], self.color, *uv)
            })
            .collect();

        let mut bounding_box = BoundingBox::from_point(-self.origin);
        bounding_box.extend_to(Vec3::new(self.size.x, self.size.y, 0.0) - self.origin);

        self.bounding_box = bounding_box;
        self.vertices = vertices.into();
    }
}

impl InstancedRenderable for Sprite {
    fn build_elements(&self, pass_index: usize, element_data: &ElementData<'_>, elements: &mut Vec<RenderElement>) {
        let Some(pipeline) = self.material.pipeline(pass_index) else {
            return;
        };

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::Key;
    use crate::render::material::Material;
    use approx::assert_relative_eq;

    fn sprite() -> Sprite {
        let material = Arc::new(MaterialInstance::new(Arc::new(Material::new("sprite"))));
        Sprite::new(material, VertexDeclarationHandle::null())
    }

    #[test]
    fn test_quad_corners_and_uvs() {
        let mut sprite = sprite();
        sprite.set_size(Vec2::new(10.0, 20.0));
        let vertices = sprite.vertices();

        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[3].position, [10.0, 20.0, 0.0]);
        assert_eq!(vertices[0].uv, [0.0, 1.0]);
        assert_eq!(vertices[3].uv, [1.0, 0.0]);
    }

    #[test]
    fn test_origin_offsets_vertices_and_bounds() {
        let mut sprite = sprite();
        sprite.set_size(Vec2::new(10.0, 10.0));
        sprite.set_origin(Vec3::new(5.0, 5.0, 0.0));

        assert_eq!(sprite.vertices()[0].position, [-5.0, -5.0, 0.0]);
        let bounds = sprite.bounding_box();
        assert_relative_eq!(bounds.min, Vec3::new(-5.0, -5.0, 0.0));
        assert_relative_eq!(bounds.size(), Vec3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn test_no_element_without_pipeline() {
        let mut device = crate::render::backends::HeadlessDevice::new();
        let world = Arc::new(
            crate::render::instances::WorldInstance::create(&mut device, crate::foundation::math::Mat4::identity()).unwrap(),
        );

        let mut elements = Vec::new();
        sprite().build_elements(0, &ElementData::new(&world), &mut elements);
        assert!(elements.is_empty());
    }
}
