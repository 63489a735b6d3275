//! GPU resource handles and descriptions
//!
//! Every backend object the render core touches is referred to by a
//! generational slotmap key. Keys are issued by the [`RenderDevice`] that
//! owns the object, compare by identity, and become stale once the object is
//! destroyed, so the core never holds a dangling reference to GPU memory.

mod device;
mod shader_binding;

pub use device::{GpuResource, RenderDevice};
pub use shader_binding::{ShaderBindingContent, ShaderBindingEntry};

use crate::foundation::collections::new_key_type;

new_key_type! {
    /// Handle to a GPU buffer (vertex, index, uniform, storage)
    pub struct BufferHandle;
    /// Handle to a texture
    pub struct TextureHandle;
    /// Handle to a texture sampler
    pub struct SamplerHandle;
    /// Handle to a vertex declaration (vertex layout)
    pub struct VertexDeclarationHandle;
    /// Handle to a pipeline layout
    pub struct PipelineLayoutHandle;
    /// Handle to a render pipeline
    pub struct PipelineHandle;
    /// Handle to a shader binding allocated from a pipeline layout
    pub struct ShaderBindingHandle;
    /// Handle to a framebuffer
    pub struct FramebufferHandle;
    /// Handle to a render pass
    pub struct RenderPassHandle;
}

/// Intended use of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Index data
    Index,
    /// Vertex data
    Vertex,
    /// Uniform (constant) data
    Uniform,
    /// Shader storage data
    Storage,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    /// Intended use
    pub buffer_type: BufferType,
    /// Size in bytes
    pub size: u64,
}

impl BufferInfo {
    /// Create buffer parameters
    pub const fn new(buffer_type: BufferType, size: u64) -> Self {
        Self { buffer_type, size }
    }
}

/// A byte range inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderBufferView {
    /// Viewed buffer
    pub buffer: BufferHandle,
    /// Offset of the range in bytes
    pub offset: u64,
    /// Length of the range in bytes
    pub size: u64,
}

impl RenderBufferView {
    /// View a byte range of a buffer
    pub const fn new(buffer: BufferHandle, offset: u64, size: u64) -> Self {
        Self { buffer, offset, size }
    }

    /// View a whole buffer of the given size
    pub const fn whole(buffer: BufferHandle, size: u64) -> Self {
        Self::new(buffer, 0, size)
    }
}

/// Width of indices in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexType {
    /// 16-bit indices
    #[default]
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub const fn size(self) -> u64 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Depth or layer count
    pub depth: u32,
}

impl TextureInfo {
    /// Parameters of a 2D texture
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self { width, height, depth: 1 }
    }
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear interpolation
    #[default]
    Linear,
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerInfo {
    /// Magnification filter
    pub mag_filter: SamplerFilter,
    /// Minification filter
    pub min_filter: SamplerFilter,
}

/// A single attribute of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexComponent {
    /// 3D position, three floats
    Position,
    /// Linear RGBA color, four floats
    Color,
    /// Normal, three floats
    Normal,
    /// Texture coordinates, two floats
    TexCoord,
    /// Skinning joint indices, four u32
    JointIndices,
    /// Skinning joint weights, four floats
    JointWeights,
}

impl VertexComponent {
    /// Size of the attribute in bytes
    pub const fn size(self) -> u32 {
        match self {
            Self::Position | Self::Normal => 12,
            Self::TexCoord => 8,
            Self::Color | Self::JointIndices | Self::JointWeights => 16,
        }
    }
}

/// Vertex layout: tightly packed components in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexDeclaration {
    components: Vec<VertexComponent>,
}

impl VertexDeclaration {
    /// Declare a layout from its components
    pub fn new(components: impl Into<Vec<VertexComponent>>) -> Self {
        Self {
            components: components.into(),
        }
    }

    /// Position, color, texture coordinates; the sprite vertex layout
    pub fn xyz_color_uv() -> Self {
        Self::new([VertexComponent::Position, VertexComponent::Color, VertexComponent::TexCoord])
    }

    /// Components in order
    pub fn components(&self) -> &[VertexComponent] {
        &self.components
    }

    /// Size of one vertex in bytes
    pub fn stride(&self) -> u32 {
        self.components.iter().map(|c| c.size()).sum()
    }
}

/// Kind of resource a pipeline layout slot expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    /// Uniform buffer
    UniformBuffer,
    /// Storage buffer
    StorageBuffer,
    /// Sampled texture
    Texture,
}

/// One slot of a shader binding set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingSlot {
    /// Binding index inside the set
    pub index: u32,
    /// Expected resource type
    pub binding_type: BindingType,
}

/// Pipeline layout creation parameters: one list of slots per set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineLayoutInfo {
    /// Slots of each set, indexed by set number
    pub sets: Vec<Vec<BindingSlot>>,
}

/// Render pipeline creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPipelineInfo {
    /// Layout the pipeline's shaders were built against
    pub layout: PipelineLayoutHandle,
    /// Vertex layouts consumed, one per vertex buffer binding
    pub vertex_declarations: Vec<VertexDeclarationHandle>,
}

/// A created pipeline together with the layout its shader bindings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipeline {
    /// Pipeline handle
    pub handle: PipelineHandle,
    /// Layout of the pipeline
    pub layout: PipelineLayoutHandle,
}

/// Framebuffer creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}
