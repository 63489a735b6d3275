//! Render elements
//!
//! A [`RenderElement`] is one drawable unit for the current frame, produced
//! by a renderable and owned by the render queue until the frame is reset.
//! Elements are never mutated by the element renderers; everything they need
//! is read through shared references and `Arc`s.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Color, Recti};
use crate::render::instances::{SkeletonInstance, WorldInstance};
use crate::render::material::MaterialInstance;
use crate::render::registry::RenderQueueRegistry;
use crate::render::resources::{
    BufferHandle, IndexType, RenderBufferView, RenderPipeline, TextureHandle, VertexDeclarationHandle,
};

/// Which element renderer handles an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// Indexed or non-indexed mesh geometry living in GPU buffers
    Submesh = 0,
    /// Quads whose vertices are supplied inline every frame
    SpriteChain = 1,
}

impl ElementKind {
    /// Number of element kinds
    pub const COUNT: usize = 2;

    /// Every kind, in index order
    pub const ALL: [Self; Self::COUNT] = [Self::Submesh, Self::SpriteChain];

    /// Dense index of the kind
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Per-element state supplied alongside the element in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStates {
    /// Clipping rectangle; `None` means the full viewer target
    pub scissor_box: Option<Recti>,
    /// Dynamic light data; `None` means no dynamic lights
    pub light_data: Option<RenderBufferView>,
}

impl RenderStates {
    /// Clip to `scissor_box`
    pub const fn with_scissor(mut self, scissor_box: Recti) -> Self {
        self.scissor_box = Some(scissor_box);
        self
    }

    /// Use `light_data` as the light buffer
    pub const fn with_light_data(mut self, light_data: RenderBufferView) -> Self {
        self.light_data = Some(light_data);
        self
    }

    /// Scissor box an element ends up with
    ///
    /// The element's own scissor wins over the render state's. Rectangles
    /// with a negative extent count as unset.
    pub fn resolve_scissor(&self, element_scissor: Option<Recti>) -> Option<Recti> {
        element_scissor
            .filter(Recti::is_valid)
            .or_else(|| self.scissor_box.filter(Recti::is_valid))
    }
}

/// GPU geometry of a submesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmeshGeometry {
    /// Vertex buffer bound at binding 0
    pub vertex_buffer: BufferHandle,
    /// Index buffer and the width of its indices, for indexed geometry
    pub index_buffer: Option<(BufferHandle, IndexType)>,
    /// Number of indices, or of vertices for non-indexed geometry
    pub index_count: u32,
}

impl SubmeshGeometry {
    /// Indexed geometry
    pub const fn indexed(vertex_buffer: BufferHandle, index_buffer: BufferHandle, index_type: IndexType, index_count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer: Some((index_buffer, index_type)),
            index_count,
        }
    }

    /// Non-indexed geometry drawing `vertex_count` vertices
    pub const fn non_indexed(vertex_buffer: BufferHandle, vertex_count: u32) -> Self {
        Self {
            vertex_buffer,
            index_buffer: None,
            index_count: vertex_count,
        }
    }
}

/// One submesh of a model, drawn with one material
#[derive(Debug, Clone)]
pub struct RenderSubmesh {
    /// Coarse sort order; lower layers are drawn first
    pub render_layer: i32,
    /// Material the submesh is drawn with
    pub material_instance: Arc<MaterialInstance>,
    /// Pipeline of the material pass being drawn
    pub pipeline: RenderPipeline,
    /// Transform of the owning object
    pub world_instance: Arc<WorldInstance>,
    /// Skeleton of the owning object, when skinned
    pub skeleton_instance: Option<Arc<SkeletonInstance>>,
    /// Buffers to draw
    pub geometry: SubmeshGeometry,
    /// Element-specific clipping rectangle
    pub scissor_box: Option<Recti>,
}

/// Vertex layout of inline sprite geometry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    /// Position in object space
    pub position: [f32; 3],
    /// Vertex color
    pub color: Color,
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl SpriteVertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: Color, uv: [f32; 2]) -> Self {
        Self { position, color, uv }
    }
}

/// A run of textured quads drawn in one go
///
/// Vertices come four per sprite: the corner at the sprite origin, then
/// one step along +X, one step along +Y and the opposite corner, matching
/// the shared quad index buffer.
#[derive(Debug, Clone)]
pub struct RenderSpriteChain {
    /// Coarse sort order; lower layers are drawn first
    pub render_layer: i32,
    /// Material the sprites are drawn with
    pub material_instance: Arc<MaterialInstance>,
    /// Pipeline of the material pass being drawn
    pub pipeline: RenderPipeline,
    /// Transform of the owning object
    pub world_instance: Arc<WorldInstance>,
    /// Layout of [`SpriteVertex`] as registered with the device
    pub vertex_declaration: VertexDeclarationHandle,
    /// Texture bound to the overlay slot, e.g. a glyph atlas
    pub texture_overlay: Option<TextureHandle>,
    /// Four vertices per sprite
    pub vertices: Arc<[SpriteVertex]>,
    /// Element-specific clipping rectangle
    pub scissor_box: Option<Recti>,
}

impl RenderSpriteChain {
    /// Number of complete sprites in the chain
    pub fn sprite_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// A drawable unit queued for the frame
#[derive(Debug, Clone)]
pub enum RenderElement {
    /// Mesh geometry
    Submesh(RenderSubmesh),
    /// Inline quads
    SpriteChain(RenderSpriteChain),
}

const LAYER_BITS: u32 = 8;
const KIND_BITS: u32 = 4;
const PIPELINE_BITS: u32 = 16;
const GEOMETRY_BITS: u32 = 16;
const MATERIAL_BITS: u32 = 20;

fn key_field(value: u64, bits: u32) -> u64 {
    value.min((1 << bits) - 1)
}

impl RenderElement {
    /// Kind tag selecting the element renderer
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Submesh(_) => ElementKind::Submesh,
            Self::SpriteChain(_) => ElementKind::SpriteChain,
        }
    }

    /// Render layer
    pub const fn render_layer(&self) -> i32 {
        match self {
            Self::Submesh(submesh) => submesh.render_layer,
            Self::SpriteChain(chain) => chain.render_layer,
        }
    }

    /// Material instance
    pub const fn material_instance(&self) -> &Arc<MaterialInstance> {
        match self {
            Self::Submesh(submesh) => &submesh.material_instance,
            Self::SpriteChain(chain) => &chain.material_instance,
        }
    }

    /// Pipeline
    pub const fn pipeline(&self) -> RenderPipeline {
        match self {
            Self::Submesh(submesh) => submesh.pipeline,
            Self::SpriteChain(chain) => chain.pipeline,
        }
    }

    /// World instance
    pub const fn world_instance(&self) -> &Arc<WorldInstance> {
        match self {
            Self::Submesh(submesh) => &submesh.world_instance,
            Self::SpriteChain(chain) => &chain.world_instance,
        }
    }

    /// Element-specific scissor box
    pub const fn scissor_box(&self) -> Option<Recti> {
        match self {
            Self::Submesh(submesh) => submesh.scissor_box,
            Self::SpriteChain(chain) => chain.scissor_box,
        }
    }

    /// Register every identity this element's sorting key reads
    pub fn register(&self, registry: &mut RenderQueueRegistry) {
        registry.register_layer(self.render_layer());
        registry.register_pipeline(self.pipeline().handle);

        match self {
            Self::Submesh(submesh) => {
                registry.register_vertex_buffer(submesh.geometry.vertex_buffer);
            }
            Self::SpriteChain(chain) => {
                registry.register_vertex_declaration(chain.vertex_declaration);
            }
        }
    }

    /// 64-bit key ordering elements by layer, kind, pipeline, geometry and material
    ///
    /// Indices that do not fit their field saturate, which only costs
    /// batching opportunities, never correctness.
    ///
    /// # Panics
    ///
    /// Panics if [`register`](Self::register) was not called with this
    /// registry since it was last cleared.
    pub fn sorting_key(&self, registry: &RenderQueueRegistry) -> u64 {
        let layer = registry.fetch_layer_index(self.render_layer()) as u64;
        let pipeline = registry.fetch_pipeline_index(self.pipeline().handle) as u64;
        let geometry = match self {
            Self::Submesh(submesh) => registry.fetch_vertex_buffer_index(submesh.geometry.vertex_buffer),
            Self::SpriteChain(chain) => registry.fetch_vertex_declaration_index(chain.vertex_declaration),
        } as u64;
        let material = self.material_instance().id();

        let mut key = key_field(layer, LAYER_BITS);
        key = (key << KIND_BITS) | self.kind().index() as u64;
        key = (key << PIPELINE_BITS) | key_field(pipeline, PIPELINE_BITS);
        key = (key << GEOMETRY_BITS) | key_field(geometry, GEOMETRY_BITS);
        (key << MATERIAL_BITS) | (material & ((1 << MATERIAL_BITS) - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprite_vertex_matches_declared_stride() {
        use crate::render::resources::VertexDeclaration;

        assert_eq!(
            std::mem::size_of::<SpriteVertex>(),
            VertexDeclaration::xyz_color_uv().stride() as usize
        );
    }

    #[test]
    fn test_element_scissor_wins() {
        let states = RenderStates::default().with_scissor(Recti::new(0, 0, 10, 10));
        let own = Recti::new(5, 5, 20, 20);

        assert_eq!(states.resolve_scissor(Some(own)), Some(own));
        assert_eq!(states.resolve_scissor(None), Some(Recti::new(0, 0, 10, 10)));
    }

    #[test]
    fn test_negative_extent_is_unset() {
        let states = RenderStates::default().with_scissor(Recti::new(0, 0, -1, -1));

        assert_eq!(states.resolve_scissor(Some(Recti::new(0, 0, -1, 4))), None);
        assert_eq!(RenderStates::default().resolve_scissor(None), None);
    }

    #[test]
    fn test_key_field_saturates() {
        assert_eq!(key_field(300, LAYER_BITS), 255);
        assert_eq!(key_field(3, LAYER_BITS), 3);
    }

    #[test]
    fn test_key_layout_fills_sixty_four_bits() {
        assert_eq!(LAYER_BITS + KIND_BITS + PIPELINE_BITS + GEOMETRY_BITS + MATERIAL_BITS, 64);
    }
}
