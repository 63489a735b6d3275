//! Materials and material instances
//!
//! A [`Material`] describes how a family of surfaces is drawn: one pipeline
//! per render pass, the binding indices the engine fills in automatically
//! (instance, light, skeletal and viewer data plus the overlay texture) and
//! the named texture slots instances may fill. A [`MaterialInstance`] is a
//! material with concrete textures and uniform buffers attached, shared by
//! every element that draws with it.

use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::collections::IdAllocator;
use crate::render::defaults::DefaultResources;
use crate::render::resources::{
    RenderBufferView, RenderPipeline, SamplerHandle, ShaderBindingEntry, TextureHandle,
};

static MATERIAL_INSTANCE_IDS: IdAllocator = IdAllocator::new();

/// Binding slots the engine fills on behalf of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineShaderBinding {
    /// Per-object transform data
    InstanceDataUbo,
    /// Dynamic light data
    LightDataUbo,
    /// Joint matrices of a skinned object
    SkeletalDataUbo,
    /// Camera and render target data
    ViewerDataUbo,
    /// Texture laid over the material, e.g. a glyph atlas
    OverlayTexture,
}

impl EngineShaderBinding {
    /// Number of engine slots
    pub const COUNT: usize = 5;

    /// Every engine slot, in the order they are filled
    pub const ALL: [Self; Self::COUNT] = [
        Self::InstanceDataUbo,
        Self::LightDataUbo,
        Self::SkeletalDataUbo,
        Self::ViewerDataUbo,
        Self::OverlayTexture,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// Per-pass behavior switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialPassFlags: u32 {
        /// Elements of this pass are sorted back to front
        const SORT_BY_DISTANCE = 1 << 0;
    }
}

/// How a material is drawn in one render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialPass {
    /// Pipeline used in this pass
    pub pipeline: RenderPipeline,
    /// Pass behavior
    pub flags: MaterialPassFlags,
}

impl MaterialPass {
    /// Pass drawn with `pipeline` and no flags
    pub const fn new(pipeline: RenderPipeline) -> Self {
        Self {
            pipeline,
            flags: MaterialPassFlags::empty(),
        }
    }

    /// Set the pass flags
    pub const fn with_flags(mut self, flags: MaterialPassFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A named texture input of a material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    /// Property name instances refer to
    pub name: String,
    /// Binding index inside the material's shader binding set
    pub binding_index: u32,
}

/// Shared description of how surfaces are drawn
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    engine_bindings: [Option<u32>; EngineShaderBinding::COUNT],
    passes: Vec<Option<MaterialPass>>,
    texture_slots: Vec<TextureSlot>,
}

impl Material {
    /// Create a material with no passes and no declared slots
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine_bindings: [None; EngineShaderBinding::COUNT],
            passes: Vec::new(),
            texture_slots: Vec::new(),
        }
    }

    /// Declare the binding index of an engine slot
    pub fn with_engine_binding(mut self, binding: EngineShaderBinding, binding_index: u32) -> Self {
        self.engine_bindings[binding.index()] = Some(binding_index);
        self
    }

    /// Use `pass` when drawing in render pass `pass_index`
    pub fn with_pass(mut self, pass_index: usize, pass: MaterialPass) -> Self {
        if self.passes.len() <= pass_index {
            self.passes.resize(pass_index + 1, None);
        }
        self.passes[pass_index] = Some(pass);
        self
    }

    /// Declare a named texture input
    pub fn with_texture_slot(mut self, name: impl Into<String>, binding_index: u32) -> Self {
        self.texture_slots.push(TextureSlot {
            name: name.into(),
            binding_index,
        });
        self
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binding index of an engine slot, or `None` if the material does not use it
    pub const fn engine_binding_index(&self, binding: EngineShaderBinding) -> Option<u32> {
        self.engine_bindings[binding.index()]
    }

    /// Pass used in render pass `pass_index`
    pub fn pass(&self, pass_index: usize) -> Option<&MaterialPass> {
        self.passes.get(pass_index).and_then(Option::as_ref)
    }

    /// Declared texture inputs
    pub fn texture_slots(&self) -> &[TextureSlot] {
        &self.texture_slots
    }
}

#[derive(Debug, Clone, Copy)]
struct TextureValue {
    texture: TextureHandle,
    sampler: Option<SamplerHandle>,
}

/// A material with concrete inputs attached
///
/// Instances are shared between elements behind an `Arc`; their id is what
/// the element renderers compare when deciding whether a shader binding can
/// be reused.
#[derive(Debug)]
pub struct MaterialInstance {
    id: u64,
    material: Arc<Material>,
    textures: Vec<Option<TextureValue>>,
    uniform_buffers: Vec<(u32, RenderBufferView)>,
}

impl MaterialInstance {
    /// Instance of `material` with every texture unset
    pub fn new(material: Arc<Material>) -> Self {
        let textures = vec![None; material.texture_slots().len()];

        Self {
            id: MATERIAL_INSTANCE_IDS.allocate(),
            material,
            textures,
            uniform_buffers: Vec::new(),
        }
    }

    /// Stable identity of this instance
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Parent material
    pub const fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Pipeline used in render pass `pass_index`
    pub fn pipeline(&self, pass_index: usize) -> Option<RenderPipeline> {
        self.material.pass(pass_index).map(|pass| pass.pipeline)
    }

    /// Flags of render pass `pass_index`
    pub fn pass_flags(&self, pass_index: usize) -> MaterialPassFlags {
        self.material
            .pass(pass_index)
            .map_or(MaterialPassFlags::empty(), |pass| pass.flags)
    }

    /// Binding index of an engine slot of the parent material
    pub fn engine_binding_index(&self, binding: EngineShaderBinding) -> Option<u32> {
        self.material.engine_binding_index(binding)
    }

    /// Assign a texture to a named property
    ///
    /// Returns `false` and leaves the instance untouched when the material
    /// has no slot of that name.
    pub fn set_texture_property(&mut self, name: &str, texture: TextureHandle, sampler: Option<SamplerHandle>) -> bool {
        match self.slot_index(name) {
            Some(index) => {
                self.textures[index] = Some(TextureValue { texture, sampler });
                true
            }
            None => {
                log::warn!("Material '{}' has no texture property '{}'", self.material.name(), name);
                false
            }
        }
    }

    /// Texture assigned to a named property, if any
    pub fn texture_property(&self, name: &str) -> Option<TextureHandle> {
        self.slot_index(name)
            .and_then(|index| self.textures[index])
            .map(|value| value.texture)
    }

    /// Attach a uniform buffer range at a binding index
    pub fn set_uniform_buffer(&mut self, binding_index: u32, view: RenderBufferView) {
        match self.uniform_buffers.iter_mut().find(|(index, _)| *index == binding_index) {
            Some(entry) => entry.1 = view,
            None => self.uniform_buffers.push((binding_index, view)),
        }
    }

    /// Append the material's own entries to a shader binding being assembled
    ///
    /// Texture slots without a texture fall back to the default white texture.
    pub fn fill_shader_binding(&self, entries: &mut Vec<ShaderBindingEntry>, defaults: &DefaultResources) {
        for (slot, value) in self.material.texture_slots().iter().zip(&self.textures) {
            let (texture, sampler) = value.map_or((defaults.white_texture, defaults.default_sampler), |value| {
                (value.texture, value.sampler.unwrap_or(defaults.default_sampler))
            });
            entries.push(ShaderBindingEntry::texture(slot.binding_index, texture, sampler));
        }

        entries.extend(
            self.uniform_buffers
                .iter()
                .map(|&(binding_index, view)| ShaderBindingEntry::uniform_buffer(binding_index, view)),
        );
    }

    fn slot_index(&self, name: &str) -> Option<usize> {
        self.material.texture_slots().iter().position(|slot| slot.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::Key;
    use crate::render::resources::{
        BufferHandle, PipelineHandle, PipelineLayoutHandle, ShaderBindingContent, VertexDeclarationHandle,
    };

    fn defaults() -> DefaultResources {
        DefaultResources {
            white_texture: TextureHandle::null(),
            default_sampler: SamplerHandle::null(),
            quad_index_buffer: BufferHandle::null(),
            quad_capacity: 0,
            sprite_vertex_declaration: VertexDeclarationHandle::null(),
        }
    }

    fn pipeline() -> RenderPipeline {
        RenderPipeline {
            handle: PipelineHandle::null(),
            layout: PipelineLayoutHandle::null(),
        }
    }

    #[test]
    fn test_engine_bindings_default_to_absent() {
        let material = Material::new("basic").with_engine_binding(EngineShaderBinding::ViewerDataUbo, 5);

        assert_eq!(material.engine_binding_index(EngineShaderBinding::ViewerDataUbo), Some(5));
        assert_eq!(material.engine_binding_index(EngineShaderBinding::InstanceDataUbo), None);
    }

    #[test]
    fn test_passes_are_sparse() {
        let material = Material::new("basic")
            .with_pass(2, MaterialPass::new(pipeline()).with_flags(MaterialPassFlags::SORT_BY_DISTANCE));
        let instance = MaterialInstance::new(Arc::new(material));

        assert!(instance.pipeline(0).is_none());
        assert!(instance.pipeline(2).is_some());
        assert!(instance.pass_flags(2).contains(MaterialPassFlags::SORT_BY_DISTANCE));
        assert!(instance.pass_flags(7).is_empty());
    }

    #[test]
    fn test_unknown_texture_property_is_rejected() {
        let material = Arc::new(Material::new("basic").with_texture_slot("BaseColorMap", 0));
        let mut instance = MaterialInstance::new(material);

        assert!(!instance.set_texture_property("NormalMap", TextureHandle::null(), None));
        assert!(instance.texture_property("BaseColorMap").is_none());
    }

    #[test]
    fn test_missing_texture_falls_back_to_white() {
        let material = Arc::new(Material::new("basic").with_texture_slot("BaseColorMap", 3));
        let instance = MaterialInstance::new(material);
        let defaults = defaults();

        let mut entries = Vec::new();
        instance.fill_shader_binding(&mut entries, &defaults);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].binding_index, 3);
        assert_eq!(
            entries[0].content,
            ShaderBindingContent::Texture {
                texture: defaults.white_texture,
                sampler: defaults.default_sampler,
            }
        );
    }

    #[test]
    fn test_uniform_buffer_is_replaced_in_place() {
        let mut instance = MaterialInstance::new(Arc::new(Material::new("basic")));
        let view = RenderBufferView::whole(BufferHandle::null(), 16);
        instance.set_uniform_buffer(1, view);
        instance.set_uniform_buffer(1, RenderBufferView::whole(BufferHandle::null(), 32));

        let mut entries = Vec::new();
        instance.fill_shader_binding(&mut entries, &defaults());
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].content,
            ShaderBindingContent::UniformBuffer(RenderBufferView::whole(BufferHandle::null(), 32))
        );
    }
}
