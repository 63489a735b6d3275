//! Backend-agnostic command recording
//!
//! [`CommandBufferBuilder`] is the capability set every backend implements to
//! record GPU work. Element renderers only emit through this trait and never
//! branch on which backend sits behind it; OpenGL-style backends replay the
//! stream against global state, Vulkan-style backends record it into a
//! native command buffer.

use bitflags::bitflags;

use crate::foundation::math::{Color, Recti};
use crate::render::frame::UploadAllocation;
use crate::render::resources::{
    BufferHandle, FramebufferHandle, IndexType, PipelineHandle, PipelineLayoutHandle,
    RenderBufferView, RenderPassHandle, SamplerFilter, ShaderBindingHandle, TextureHandle,
};

bitflags! {
    /// Pipeline stages used to scope a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStageFlags: u32 {
        /// Start of the pipeline
        const TOP_OF_PIPE = 1 << 0;
        /// Vertex and index fetch
        const VERTEX_INPUT = 1 << 1;
        /// Vertex shading
        const VERTEX_SHADER = 1 << 2;
        /// Fragment shading
        const FRAGMENT_SHADER = 1 << 3;
        /// Color attachment writes
        const COLOR_OUTPUT = 1 << 4;
        /// Copies and blits
        const TRANSFER = 1 << 5;
        /// End of the pipeline
        const BOTTOM_OF_PIPE = 1 << 6;
    }
}

bitflags! {
    /// Memory accesses made visible or available by a barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryAccessFlags: u32 {
        /// Index buffer reads
        const INDEX_READ = 1 << 0;
        /// Vertex buffer reads
        const VERTEX_ATTRIBUTE_READ = 1 << 1;
        /// Uniform buffer reads
        const UNIFORM_READ = 1 << 2;
        /// Sampled or storage reads from shaders
        const SHADER_READ = 1 << 3;
        /// Color attachment writes
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        /// Transfer reads
        const TRANSFER_READ = 1 << 5;
        /// Transfer writes
        const TRANSFER_WRITE = 1 << 6;
    }
}

/// Layout a texture is in for a given usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    /// Contents are undefined
    Undefined,
    /// Color attachment
    ColorOutput,
    /// Depth/stencil attachment
    DepthStencilOutput,
    /// Sampled from shaders
    ColorInput,
    /// Source of a copy or blit
    TransferSource,
    /// Destination of a copy or blit
    TransferDestination,
    /// Ready for presentation
    Present,
}

/// Clear values of one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// Color clear value
    pub color: Color,
    /// Depth clear value
    pub depth: f32,
    /// Stencil clear value
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// A 3D texel region of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureRegion {
    /// Origin of the region
    pub origin: [u32; 3],
    /// Extent of the region
    pub extent: [u32; 3],
}

/// Ordered stream of GPU commands
///
/// Implementations translate each call one-to-one into native commands.
/// Callers are responsible for not emitting redundant binds.
pub trait CommandBufferBuilder {
    /// Open a named debug region
    fn begin_debug_region(&mut self, name: &str, color: Color);

    /// Close the innermost debug region
    fn end_debug_region(&mut self);

    /// Begin a render pass on a framebuffer
    fn begin_render_pass(
        &mut self,
        framebuffer: FramebufferHandle,
        render_pass: RenderPassHandle,
        render_rect: Recti,
        clear_values: &[ClearValues],
    );

    /// End the current render pass
    fn end_render_pass(&mut self);

    /// Move on to the next subpass of the current render pass
    fn next_subpass(&mut self);

    /// Bind a render pipeline
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    /// Bind a shader binding to a set of the bound pipeline's layout
    fn bind_shader_binding(&mut self, set: u32, binding: ShaderBindingHandle);

    /// Bind a shader binding to a set of an explicit pipeline layout
    fn bind_shader_binding_with_layout(&mut self, layout: PipelineLayoutHandle, set: u32, binding: ShaderBindingHandle);

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: BufferHandle, index_type: IndexType, offset: u64);

    /// Bind a vertex buffer to a binding point
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferHandle, offset: u64);

    /// Blit (scaled copy) between two textures
    fn blit_texture(
        &mut self,
        from: TextureHandle,
        from_region: TextureRegion,
        from_layout: TextureLayout,
        to: TextureHandle,
        to_region: TextureRegion,
        to_layout: TextureLayout,
        filter: SamplerFilter,
    );

    /// Copy between two buffer ranges
    fn copy_buffer(&mut self, source: RenderBufferView, target: RenderBufferView, size: u64, source_offset: u64, target_offset: u64);

    /// Copy from an upload pool allocation into a buffer range
    fn copy_upload(&mut self, allocation: UploadAllocation, target: RenderBufferView, size: u64, source_offset: u64, target_offset: u64);

    /// Copy a texture region into another texture
    fn copy_texture(
        &mut self,
        from: TextureHandle,
        from_region: TextureRegion,
        from_layout: TextureLayout,
        to: TextureHandle,
        to_position: [u32; 3],
        to_layout: TextureLayout,
    );

    /// Non-indexed draw
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);

    /// Indexed draw using the bound index buffer
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, first_instance: u32);

    /// Barrier placed before a batch of transfers
    fn pre_transfer_barrier(&mut self);

    /// Barrier placed after a batch of transfers
    fn post_transfer_barrier(&mut self);

    /// Set the scissor rectangle
    fn set_scissor(&mut self, rect: Recti);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, rect: Recti);

    /// Memory and layout barrier on a texture
    fn texture_barrier(
        &mut self,
        src_stages: PipelineStageFlags,
        dst_stages: PipelineStageFlags,
        src_access: MemoryAccessFlags,
        dst_access: MemoryAccessFlags,
        old_layout: TextureLayout,
        new_layout: TextureLayout,
        texture: TextureHandle,
    );
}
