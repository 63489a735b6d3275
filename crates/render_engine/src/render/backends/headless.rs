//! CPU-only render device
//!
//! Keeps the description of every created object in a slotmap, so handles
//! it issues behave exactly like a real backend's: they are unique, they go
//! stale when destroyed, and shader binding updates are checked against the
//! layout set the binding was allocated from.

use crate::foundation::collections::SlotMap;
use crate::render::resources::{
    BindingSlot, BindingType, BufferHandle, BufferInfo, FramebufferHandle, FramebufferInfo, GpuResource, PipelineHandle,
    PipelineLayoutHandle, PipelineLayoutInfo, RenderDevice, RenderPassHandle, RenderPipeline,
    RenderPipelineInfo, SamplerHandle, SamplerInfo, ShaderBindingContent, ShaderBindingEntry,
    ShaderBindingHandle, TextureHandle, TextureInfo, VertexDeclaration, VertexDeclarationHandle,
};
use crate::render::{RenderError, RenderResult};

#[derive(Debug)]
struct ShaderBindingRecord {
    layout: PipelineLayoutHandle,
    set_index: u32,
    entries: Vec<ShaderBindingEntry>,
}

/// Render device without a GPU
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    buffers: SlotMap<BufferHandle, BufferInfo>,
    textures: SlotMap<TextureHandle, TextureInfo>,
    samplers: SlotMap<SamplerHandle, SamplerInfo>,
    vertex_declarations: SlotMap<VertexDeclarationHandle, VertexDeclaration>,
    pipeline_layouts: SlotMap<PipelineLayoutHandle, PipelineLayoutInfo>,
    pipelines: SlotMap<PipelineHandle, RenderPipelineInfo>,
    framebuffers: SlotMap<FramebufferHandle, FramebufferInfo>,
    render_passes: SlotMap<RenderPassHandle, ()>,
    shader_bindings: SlotMap<ShaderBindingHandle, ShaderBindingRecord>,
    shader_bindings_allocated: usize,
}

impl HeadlessDevice {
    /// Create a device with no resources
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a buffer handle is alive
    pub fn contains_buffer(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(buffer)
    }

    /// Creation parameters of a live buffer
    pub fn buffer_info(&self, buffer: BufferHandle) -> Option<&BufferInfo> {
        self.buffers.get(buffer)
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live shader bindings
    pub fn live_shader_bindings(&self) -> usize {
        self.shader_bindings.len()
    }

    /// Shader bindings allocated over the device's lifetime
    pub const fn shader_bindings_allocated(&self) -> usize {
        self.shader_bindings_allocated
    }

    /// Current entries of a live shader binding
    pub fn shader_binding_entries(&self, binding: ShaderBindingHandle) -> Option<&[ShaderBindingEntry]> {
        self.shader_bindings.get(binding).map(|record| record.entries.as_slice())
    }

    fn check_entry(&self, slots: &[BindingSlot], entry: &ShaderBindingEntry) -> RenderResult<()> {
        let Some(slot) = slots.iter().find(|slot| slot.index == entry.binding_index) else {
            return Err(RenderError::BackendError(format!(
                "binding index {} is not declared by the layout set",
                entry.binding_index
            )));
        };

        let (expected, live) = match entry.content {
            ShaderBindingContent::UniformBuffer(view) => (BindingType::UniformBuffer, self.buffers.contains_key(view.buffer)),
            ShaderBindingContent::StorageBuffer(view) => (BindingType::StorageBuffer, self.buffers.contains_key(view.buffer)),
            ShaderBindingContent::Texture { texture, sampler } => (
                BindingType::Texture,
                self.textures.contains_key(texture) && self.samplers.contains_key(sampler),
            ),
        };

        if slot.binding_type != expected {
            return Err(RenderError::BackendError(format!(
                "binding index {} expects {:?}, got {:?}",
                entry.binding_index, slot.binding_type, expected
            )));
        }
        if !live {
            return Err(RenderError::InvalidHandle {
                kind: "shader binding resource",
            });
        }

        Ok(())
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_buffer(&mut self, info: &BufferInfo) -> RenderResult<BufferHandle> {
        if info.size == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "{:?} buffer of size zero",
                info.buffer_type
            )));
        }
        Ok(self.buffers.insert(info.clone()))
    }

    fn create_texture(&mut self, info: &TextureInfo) -> RenderResult<TextureHandle> {
        if info.width == 0 || info.height == 0 || info.depth == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "texture of size {}x{}x{}",
                info.width, info.height, info.depth
            )));
        }
        Ok(self.textures.insert(*info))
    }

    fn create_sampler(&mut self, info: &SamplerInfo) -> RenderResult<SamplerHandle> {
        Ok(self.samplers.insert(*info))
    }

    fn create_vertex_declaration(&mut self, declaration: &VertexDeclaration) -> RenderResult<VertexDeclarationHandle> {
        if declaration.components().is_empty() {
            return Err(RenderError::ResourceCreationFailed("empty vertex declaration".to_string()));
        }
        Ok(self.vertex_declarations.insert(declaration.clone()))
    }

    fn create_pipeline_layout(&mut self, info: &PipelineLayoutInfo) -> RenderResult<PipelineLayoutHandle> {
        Ok(self.pipeline_layouts.insert(info.clone()))
    }

    fn create_render_pipeline(&mut self, info: &RenderPipelineInfo) -> RenderResult<RenderPipeline> {
        if !self.pipeline_layouts.contains_key(info.layout) {
            return Err(RenderError::InvalidHandle { kind: "pipeline layout" });
        }
        if !info
            .vertex_declarations
            .iter()
            .all(|declaration| self.vertex_declarations.contains_key(*declaration))
        {
            return Err(RenderError::InvalidHandle {
                kind: "vertex declaration",
            });
        }

        Ok(RenderPipeline {
            handle: self.pipelines.insert(info.clone()),
            layout: info.layout,
        })
    }

    fn create_framebuffer(&mut self, info: &FramebufferInfo) -> RenderResult<FramebufferHandle> {
        Ok(self.framebuffers.insert(*info))
    }

    fn create_render_pass(&mut self) -> RenderResult<RenderPassHandle> {
        Ok(self.render_passes.insert(()))
    }

    fn allocate_shader_binding(&mut self, layout: PipelineLayoutHandle, set_index: u32) -> RenderResult<ShaderBindingHandle> {
        let info = self
            .pipeline_layouts
            .get(layout)
            .ok_or(RenderError::InvalidHandle { kind: "pipeline layout" })?;

        if set_index as usize >= info.sets.len() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "pipeline layout has {} sets, cannot allocate from set {}",
                info.sets.len(),
                set_index
            )));
        }

        self.shader_bindings_allocated += 1;
        Ok(self.shader_bindings.insert(ShaderBindingRecord {
            layout,
            set_index,
            entries: Vec::new(),
        }))
    }

    fn update_shader_binding(&mut self, binding: ShaderBindingHandle, entries: &[ShaderBindingEntry]) -> RenderResult<()> {
        let record = self
            .shader_bindings
            .get(binding)
            .ok_or(RenderError::InvalidHandle { kind: "shader binding" })?;
        let slots = self
            .pipeline_layouts
            .get(record.layout)
            .and_then(|info| info.sets.get(record.set_index as usize))
            .ok_or(RenderError::InvalidHandle { kind: "pipeline layout" })?;

        for entry in entries {
            self.check_entry(slots, entry)?;
        }

        if let Some(record) = self.shader_bindings.get_mut(binding) {
            record.entries = entries.to_vec();
        }
        Ok(())
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<[u32; 3]> {
        self.textures.get(texture).map(|info| [info.width, info.height, info.depth])
    }

    fn destroy(&mut self, resource: GpuResource) {
        let existed = match resource {
            GpuResource::Buffer(handle) => self.buffers.remove(handle).is_some(),
            GpuResource::Texture(handle) => self.textures.remove(handle).is_some(),
            GpuResource::Sampler(handle) => self.samplers.remove(handle).is_some(),
            GpuResource::VertexDeclaration(handle) => self.vertex_declarations.remove(handle).is_some(),
            GpuResource::PipelineLayout(handle) => self.pipeline_layouts.remove(handle).is_some(),
            GpuResource::Pipeline(handle) => self.pipelines.remove(handle).is_some(),
            GpuResource::ShaderBinding(handle) => self.shader_bindings.remove(handle).is_some(),
        };

        if !existed {
            log::warn!("Destroying {:?} which is not alive", resource);
        }
    }
}
