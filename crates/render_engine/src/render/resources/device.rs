//! Backend resource factory
//!
//! [`RenderDevice`] is the seam between the render core and a graphics
//! backend for everything that is not command recording: creating and
//! destroying GPU objects and filling shader bindings. The core only ever
//! sees handles; the backend owns the native objects behind them.

use crate::render::RenderResult;

use super::{
    BufferHandle, BufferInfo, FramebufferHandle, FramebufferInfo, PipelineHandle,
    PipelineLayoutHandle, PipelineLayoutInfo, RenderPassHandle, RenderPipeline,
    RenderPipelineInfo, SamplerHandle, SamplerInfo, ShaderBindingEntry, ShaderBindingHandle,
    TextureHandle, TextureInfo, VertexDeclaration, VertexDeclarationHandle,
};

/// Any GPU object that can be handed back to the device for destruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    /// A buffer
    Buffer(BufferHandle),
    /// A texture
    Texture(TextureHandle),
    /// A sampler
    Sampler(SamplerHandle),
    /// A vertex declaration
    VertexDeclaration(VertexDeclarationHandle),
    /// A pipeline layout
    PipelineLayout(PipelineLayoutHandle),
    /// A render pipeline
    Pipeline(PipelineHandle),
    /// A shader binding
    ShaderBinding(ShaderBindingHandle),
}

/// Resource factory implemented by each graphics backend
///
/// Creation failures are reported as errors and must be propagated by the
/// caller; the core never swallows them.
pub trait RenderDevice {
    /// Create a buffer
    fn create_buffer(&mut self, info: &BufferInfo) -> RenderResult<BufferHandle>;

    /// Create a texture
    fn create_texture(&mut self, info: &TextureInfo) -> RenderResult<TextureHandle>;

    /// Create a sampler
    fn create_sampler(&mut self, info: &SamplerInfo) -> RenderResult<SamplerHandle>;

    /// Register a vertex layout
    fn create_vertex_declaration(&mut self, declaration: &VertexDeclaration) -> RenderResult<VertexDeclarationHandle>;

    /// Create a pipeline layout
    fn create_pipeline_layout(&mut self, info: &PipelineLayoutInfo) -> RenderResult<PipelineLayoutHandle>;

    /// Create a render pipeline
    fn create_render_pipeline(&mut self, info: &RenderPipelineInfo) -> RenderResult<RenderPipeline>;

    /// Create a framebuffer
    fn create_framebuffer(&mut self, info: &FramebufferInfo) -> RenderResult<FramebufferHandle>;

    /// Create a render pass
    fn create_render_pass(&mut self) -> RenderResult<RenderPassHandle>;

    /// Allocate an empty shader binding from one set of a pipeline layout
    fn allocate_shader_binding(&mut self, layout: PipelineLayoutHandle, set_index: u32) -> RenderResult<ShaderBindingHandle>;

    /// Replace the contents of a shader binding
    fn update_shader_binding(&mut self, binding: ShaderBindingHandle, entries: &[ShaderBindingEntry]) -> RenderResult<()>;

    /// Size of a texture, if the handle is alive
    fn texture_size(&self, texture: TextureHandle) -> Option<[u32; 3]>;

    /// Destroy a resource
    ///
    /// Only call this once the GPU no longer uses the resource; the frame
    /// scheduler does so when it drains its deferred-release queue.
    fn destroy(&mut self, resource: GpuResource);
}
