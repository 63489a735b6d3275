//! Laid-out text
//!
//! Glyphs arrive already positioned by a text layout step. Each glyph is a
//! quad sampling one atlas texture; quads sharing an atlas are drawn as one
//! sprite chain with the atlas bound as the texture overlay.

use std::sync::Arc;

use super::{ElementData, InstancedRenderable};
use crate::foundation::math::{BoundingBox, Color, Rectf, Vec3};
use crate::render::element::{RenderElement, RenderSpriteChain, SpriteVertex};
use crate::render::material::MaterialInstance;
use crate::render::resources::{TextureHandle, VertexDeclarationHandle};

/// A positioned glyph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Atlas texture holding the glyph image
    pub atlas: TextureHandle,
    /// Quad in object space
    pub bounds: Rectf,
    /// Normalized region of the atlas
    pub texture_coords: Rectf,
    /// Glyph color
    pub color: Color,
}

#[derive(Debug, Clone)]
struct AtlasChain {
    atlas: TextureHandle,
    vertices: Arc<[SpriteVertex]>,
}

/// Renderable for a block of text
#[derive(Debug, Clone)]
pub struct TextSprite {
    material: Arc<MaterialInstance>,
    vertex_declaration: VertexDeclarationHandle,
    chains: Vec<AtlasChain>,
    render_layer: i32,
    bounding_box: BoundingBox,
}

impl TextSprite {
    /// Create an empty text sprite
    pub fn new(material: Arc<MaterialInstance>, vertex_declaration: VertexDeclarationHandle) -> Self {
        Self {
            material,
            vertex_declaration,
            chains: Vec::new(),
            render_layer: 0,
            bounding_box: BoundingBox::zero(),
        }
    }

    /// Set the render layer
    pub fn set_render_layer(&mut self, render_layer: i32) {
        self.render_layer = render_layer;
    }

    /// Replace the displayed glyphs
    ///
    /// Atlases keep the order in which they first appear in `glyphs`, so
    /// rebuilding the same text yields the same element order.
    pub fn update(&mut self, glyphs: &[Glyph]) {
        let mut grouped: Vec<(TextureHandle, Vec<SpriteVertex>)> = Vec::new();
        let mut bounding_box: Option<BoundingBox> = None;

        for glyph in glyphs {
            let group = match grouped.iter().position(|(atlas, _)| *atlas == glyph.atlas) {
                Some(group) => group,
                None => {
                    grouped.push((glyph.atlas, Vec::new()));
                    grouped.len() - 1
                }
            };
            let vertices = &mut grouped[group].1;

            let bounds = glyph.bounds;
            let uv = glyph.texture_coords;
            let corners = [
                (Vec3::new(bounds.x, bounds.y, 0.0), [uv.x, uv.y + uv.height]),
                (Vec3::new(bounds.x + bounds.width, bounds.y, 0.0), [uv.x + uv.width, uv.y + uv.height]),
                (Vec3::new(bounds.x, bounds.y + bounds.height, 0.0), [uv.x, uv.y]),
                (
                    Vec3::new(bounds.x + bounds.width, bounds.y + bounds.height, 0.0),
                    [uv.x + uv.width, uv.y],
                ),
            ];

            for (position, uv) in corners {
                let aabb = bounding_box.get_or_insert_with(|| BoundingBox::from_point(position));
                aabb.extend_to(position);
                vertices.push(SpriteVertex::new([position.x, position.y, position.z], glyph.color, uv));
            }
        }

        self.chains = grouped
            .into_iter()
            .map(|(atlas, vertices)| AtlasChain {
                atlas,
                vertices: vertices.into(),
            })
            .collect();
        self.bounding_box = bounding_box.unwrap_or_else(BoundingBox::zero);
    }

    /// Remove every glyph
    pub fn clear(&mut self) {
        self.chains.clear();
        self.bounding_box = BoundingBox::zero();
    }

    /// Number of distinct atlases in use
    pub fn atlas_count(&self) -> usize {
        self.chains.len()
    }

    /// Total number of glyph quads
    pub fn glyph_count(&self) -> usize {
        self.chains.iter().map(|chain| chain.vertices.len() / 4).sum()
    }
}

impl InstancedRenderable for TextSprite {
    fn build_elements(&self, pass_index: usize, element_data: &ElementData<'_>, elements: &mut Vec<RenderElement>) {
        let Some(pipeline) = self.material.pipeline(pass_index) else {
            return;
        };

        for chain in &self.chains {
            elements.push(RenderElement::SpriteChain(RenderSpriteChain {
                render_layer: self.render_layer,
                material_instance: Arc::clone(&self.material),
                pipeline,
                world_instance: Arc::clone(element_data.world_instance),
                vertex_declaration: self.vertex_declaration,
                texture_overlay: Some(chain.atlas),
                vertices: Arc::clone(&chain.vertices),
                scissor_box: element_data.scissor_box,
            }));
        }
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
    use crate::foundation::math::Mat4;
    use crate::render::backends::HeadlessDevice;
    use crate::render::instances::WorldInstance;
    use crate::render::material::{Material, MaterialPass};
    use crate::render::resources::{PipelineLayoutInfo, RenderDevice, RenderPipelineInfo, TextureInfo};

    fn glyph(atlas: TextureHandle, x: f32) -> Glyph {
        Glyph {
            atlas,
            bounds: Rectf::new(x, 0.0, 8.0, 12.0),
            texture_coords: Rectf::new(0.0, 0.0, 0.1, 0.1),
            color: Color::BLACK,
        }
    }

    #[test]
    fn test_one_chain_per_atlas() {
        let mut device = HeadlessDevice::new();
        let first = device.create_texture(&TextureInfo::new_2d(256, 256)).unwrap();
        let second = device.create_texture(&TextureInfo::new_2d(256, 256)).unwrap();
        let layout = device.create_pipeline_layout(&PipelineLayoutInfo::default()).unwrap();
        let pipeline = device
            .create_render_pipeline(&RenderPipelineInfo {
                layout,
                vertex_declarations: Vec::new(),
            })
            .unwrap();

        let material = Arc::new(MaterialInstance::new(Arc::new(
            Material::new("text").with_pass(0, MaterialPass::new(pipeline)),
        )));
        let mut text = TextSprite::new(material, VertexDeclarationHandle::null());
        text.update(&[glyph(first, 0.0), glyph(second, 8.0), glyph(first, 16.0)]);

        assert_eq!(text.atlas_count(), 2);
        assert_eq!(text.glyph_count(), 3);
        assert_eq!(text.bounding_box().max, Vec3::new(24.0, 12.0, 0.0));

        let world = Arc::new(WorldInstance::create(&mut device, Mat4::identity()).unwrap());
        let mut elements = Vec::new();
        text.build_elements(0, &ElementData::new(&world), &mut elements);

        assert_eq!(elements.len(), 2);
        match &elements[0] {
            RenderElement::SpriteChain(chain) => {
                assert_eq!(chain.texture_overlay, Some(first));
                assert_eq!(chain.sprite_count(), 2);
            }
            RenderElement::Submesh(_) => panic!("text must produce sprite chains"),
        }
    }

    #[test]
    fn test_clear_drops_glyphs() {
        let material = Arc::new(MaterialInstance::new(Arc::new(Material::new("text"))));
        let mut text = TextSprite::new(material, VertexDeclarationHandle::null());
        text.update(&[glyph(TextureHandle::null(), 0.0)]);
        text.clear();

        assert_eq!(text.glyph_count(), 0);
        assert_eq!(text.bounding_box(), BoundingBox::zero());
    }
}
