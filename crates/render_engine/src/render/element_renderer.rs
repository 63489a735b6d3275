//! # Element Renderers
//!
//! One [`ElementRenderer`] exists per [`ElementKind`]. For every frame it
//! runs a three step protocol over the batches the forward pass hands it:
//!
//! ```text
//! Idle ──prepare──► Prepared ──render──► Rendered ──reset──► Idle
//! ```
//!
//! - **prepare** walks a batch once, keeps the state of the previous element
//!   in a [`BatchState`], builds shader bindings only when the binding inputs
//!   change, and appends exactly one [`DrawCall`] per element
//! - **render** replays the batch's draw calls, emitting a bind command only
//!   when the bound value actually changes
//! - **reset** hands every shader binding to the frame's deferred release
//!   and empties the per-frame data
//!
//! Per-frame scratch storage lives in an [`ElementRendererData`] created by
//! [`ElementRenderer::instantiate_data`], so one renderer can serve several
//! frames in flight.

use std::any::Any;
use std::collections::HashMap;

use bitflags::bitflags;

use crate::config::RendererConfig;
use crate::foundation::math::Recti;
use crate::render::command_buffer::CommandBufferBuilder;
use crate::render::defaults::DefaultResources;
use crate::render::element::{ElementKind, RenderStates};
use crate::render::frame::RenderFrame;
use crate::render::instances::{SkeletonInstance, ViewerInstance, WorldInstance};
use crate::render::material::{EngineShaderBinding, MaterialInstance};
use crate::render::render_queue::{ElementId, ElementRef};
use crate::render::resources::{
    BufferHandle, GpuResource, IndexType, PipelineHandle, PipelineLayoutHandle, RenderBufferView,
    RenderDevice, RenderPipeline, ShaderBindingEntry, ShaderBindingHandle, TextureHandle, VertexDeclarationHandle,
};
use crate::render::sprite_chain_renderer::SpriteChainRenderer;
use crate::render::submesh_renderer::SubmeshRenderer;
use crate::render::RenderResult;

/// Per-frame scratch storage of an element renderer
pub trait ElementRendererData: Any {
    /// Upcast for downcasting to the concrete data type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete data type
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Draw calls prepared since the last reset
    fn draw_call_count(&self) -> usize;

    /// Shader bindings built since the last reset
    fn shader_binding_count(&self) -> usize;

    /// Groups of consecutive draw calls sharing every bound value
    fn state_group_count(&self) -> usize;
}

/// Downcast renderer data to the type its renderer instantiated
///
/// # Panics
///
/// Panics if `data` was instantiated by a renderer of another kind.
pub fn downcast_data<T: 'static>(data: &dyn ElementRendererData) -> &T {
    match data.as_any().downcast_ref::<T>() {
        Some(data) => data,
        None => panic!("element renderer data is not a {}", std::any::type_name::<T>()),
    }
}

/// Mutable variant of [`downcast_data`]
///
/// # Panics
///
/// Panics if `data` was instantiated by a renderer of another kind.
pub fn downcast_data_mut<T: 'static>(data: &mut dyn ElementRendererData) -> &mut T {
    match data.as_any_mut().downcast_mut::<T>() {
        Some(data) => data,
        None => panic!("element renderer data is not a {}", std::any::type_name::<T>()),
    }
}

/// Per-kind Prepare / Render / Reset stage
pub trait ElementRenderer {
    /// Kind of elements this renderer accepts
    fn kind(&self) -> ElementKind;

    /// Allocate empty per-frame data
    fn instantiate_data(&self) -> Box<dyn ElementRendererData>;

    /// Build draw calls and shader bindings for a non-empty same-kind batch
    ///
    /// Nothing reaches the GPU here; uploads are only staged on the frame.
    fn prepare(
        &mut self,
        viewer: &ViewerInstance,
        data: &mut dyn ElementRendererData,
        frame: &mut RenderFrame<'_>,
        elements: &[ElementRef<'_>],
        render_states: &[RenderStates],
    ) -> RenderResult<()>;

    /// Emit the draw calls prepared for `elements`
    ///
    /// # Panics
    ///
    /// Panics if [`prepare`](Self::prepare) was not called for this exact
    /// batch since the last reset.
    fn render(
        &self,
        viewer: &ViewerInstance,
        data: &dyn ElementRendererData,
        command_buffer: &mut dyn CommandBufferBuilder,
        elements: &[ElementRef<'_>],
    );

    /// Release the frame's resources and empty `data`
    ///
    /// Safe to call repeatedly and without a prior prepare.
    fn reset(&mut self, data: &mut dyn ElementRendererData, frame: &mut RenderFrame<'_>);

    /// Destroy resources the renderer keeps across frames
    ///
    /// Called once the device is idle, before the renderer is dropped.
    fn release_resources(&mut self, _device: &mut dyn RenderDevice) {}
}

/// Description of one GPU draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Vertex buffer bound at binding 0
    pub vertex_buffer: BufferHandle,
    /// Index buffer, for indexed draws
    pub index_buffer: Option<(BufferHandle, IndexType)>,
    /// Indices to draw, or vertices for non-indexed draws
    pub index_count: u32,
    /// First index, or first vertex for non-indexed draws
    pub first_index: u32,
    /// Pipeline to bind
    pub pipeline: PipelineHandle,
    /// Shader binding bound at set 0
    pub shader_binding: ShaderBindingHandle,
    /// Clipping rectangle; `None` resolves to the viewer target at render time
    pub scissor_box: Option<Recti>,
}

/// Draw calls produced by one prepare invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCallRange {
    /// Index of the first draw call
    pub start: usize,
    /// Number of draw calls
    pub count: usize,
}

impl DrawCallRange {
    /// Slice the range out of a draw call list
    pub fn of<'a>(&self, draw_calls: &'a [DrawCall]) -> &'a [DrawCall] {
        &draw_calls[self.start..self.start + self.count]
    }
}

bitflags! {
    /// What has to end when the tracked state changes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlushFlags: u8 {
        /// The current group of draw calls ends
        const DRAW_CALL = 1 << 0;
        /// The current shader binding can no longer be used
        const SHADER_BINDING = 1 << 1;
    }
}

/// The values the batching loop tracks from one element to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchKey {
    /// Pipeline and its layout
    pub pipeline: RenderPipeline,
    /// Material instance id
    pub material: u64,
    /// World instance id
    pub world: u64,
    /// Skeleton instance id
    pub skeleton: Option<u64>,
    /// Light data view
    pub light_data: Option<RenderBufferView>,
    /// Overlay texture
    pub texture_overlay: Option<TextureHandle>,
    /// Index buffer and index width
    pub index_buffer: Option<(BufferHandle, IndexType)>,
    /// Vertex buffer
    pub vertex_buffer: Option<BufferHandle>,
    /// Vertex declaration
    pub vertex_declaration: Option<VertexDeclarationHandle>,
    /// Resolved scissor box
    pub scissor_box: Option<Recti>,
}

impl BatchKey {
    /// Flushes needed to go from `self` to `next`
    ///
    /// Every differing dimension contributes its flushes; the result is
    /// their union. Binding inputs also end the draw call group since the
    /// next draw call references a different binding.
    pub fn diff(&self, next: &Self) -> FlushFlags {
        let binding = FlushFlags::SHADER_BINDING | FlushFlags::DRAW_CALL;
        let mut flags = FlushFlags::empty();

        if self.pipeline.layout != next.pipeline.layout {
            flags |= binding;
        }
        if self.material != next.material {
            flags |= binding;
        }
        if self.world != next.world {
            flags |= binding;
        }
        if self.skeleton != next.skeleton {
            flags |= binding;
        }
        if self.light_data != next.light_data {
            flags |= binding;
        }
        if self.texture_overlay != next.texture_overlay {
            flags |= binding;
        }
        if self.pipeline.handle != next.pipeline.handle {
            flags |= FlushFlags::DRAW_CALL;
        }
        if self.index_buffer != next.index_buffer {
            flags |= FlushFlags::DRAW_CALL;
        }
        if self.vertex_buffer != next.vertex_buffer {
            flags |= FlushFlags::DRAW_CALL;
        }
        if self.vertex_declaration != next.vertex_declaration {
            flags |= FlushFlags::DRAW_CALL;
        }
        if self.scissor_box != next.scissor_box {
            flags |= FlushFlags::DRAW_CALL;
        }

        flags
    }

    /// Inputs a shader binding built for this key depends on
    ///
    /// `viewer` is the id of the viewer being prepared, whose buffer the
    /// viewer slot points at.
    pub const fn binding_key(&self, viewer: u64) -> ShaderBindingKey {
        ShaderBindingKey {
            layout: self.pipeline.layout,
            viewer,
            material: self.material,
            world: self.world,
            skeleton: self.skeleton,
            light_data: self.light_data,
            texture_overlay: self.texture_overlay,
        }
    }
}

/// Sticky "current value" state of a prepare pass
#[derive(Debug, Default)]
pub struct BatchState {
    current: Option<BatchKey>,
}

impl BatchState {
    /// Adopt `next` and return the flushes the change triggers
    ///
    /// The first element of a batch flushes everything.
    pub fn advance(&mut self, next: BatchKey) -> FlushFlags {
        let flags = self.current.as_ref().map_or(FlushFlags::all(), |current| current.diff(&next));
        self.current = Some(next);
        flags
    }
}

/// Identity of a shader binding's inputs within one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderBindingKey {
    layout: PipelineLayoutHandle,
    viewer: u64,
    material: u64,
    world: u64,
    skeleton: Option<u64>,
    light_data: Option<RenderBufferView>,
    texture_overlay: Option<TextureHandle>,
}

/// Shader bindings built during one frame, keyed by their inputs
#[derive(Debug, Default)]
pub struct ShaderBindingCache {
    bindings: Vec<ShaderBindingHandle>,
    lookup: HashMap<ShaderBindingKey, ShaderBindingHandle>,
}

impl ShaderBindingCache {
    /// Binding previously built for `key` this frame
    pub fn get(&self, key: &ShaderBindingKey) -> Option<ShaderBindingHandle> {
        self.lookup.get(key).copied()
    }

    /// Allocate a binding from set 0 of the key's layout and fill it
    pub fn build(
        &mut self,
        key: ShaderBindingKey,
        frame: &mut RenderFrame<'_>,
        entries: &[ShaderBindingEntry],
    ) -> RenderResult<ShaderBindingHandle> {
        let device = frame.device();
        let binding = device.allocate_shader_binding(key.layout, 0)?;
        if let Err(error) = device.update_shader_binding(binding, entries) {
            device.destroy(GpuResource::ShaderBinding(binding));
            return Err(error);
        }

        self.bindings.push(binding);
        self.lookup.insert(key, binding);
        Ok(binding)
    }

    /// Binding for `key`, assembled from `sources` into `scratch` on a miss
    pub fn acquire(
        &mut self,
        key: ShaderBindingKey,
        sources: &EngineBindingSources<'_>,
        defaults: &DefaultResources,
        scratch: &mut Vec<ShaderBindingEntry>,
        frame: &mut RenderFrame<'_>,
    ) -> RenderResult<ShaderBindingHandle> {
        if let Some(binding) = self.get(&key) {
            return Ok(binding);
        }

        fill_shader_binding_entries(sources, defaults, scratch);
        self.build(key, frame, scratch)
    }

    /// Number of bindings built
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing was built
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Hand every binding to the frame's deferred release
    pub fn release_all(&mut self, frame: &mut RenderFrame<'_>) {
        for binding in self.bindings.drain(..) {
            frame.push_for_release(GpuResource::ShaderBinding(binding));
        }
        self.lookup.clear();
    }
}

/// Everything the engine binding slots are filled from
#[derive(Debug, Clone, Copy)]
pub struct EngineBindingSources<'a> {
    /// Material of the element
    pub material: &'a MaterialInstance,
    /// Transform of the element
    pub world: &'a WorldInstance,
    /// Skeleton of the element, when skinned
    pub skeleton: Option<&'a SkeletonInstance>,
    /// Light data from the render states
    pub light_data: Option<RenderBufferView>,
    /// Viewer being rendered
    pub viewer: &'a ViewerInstance,
    /// Overlay texture of the element
    pub texture_overlay: Option<TextureHandle>,
}

/// Assemble the entries of a shader binding
///
/// Engine slots come first, each only when the material declares it and the
/// data exists; the overlay slot falls back to the white texture. The
/// material's own textures and buffers follow.
pub fn fill_shader_binding_entries(
    sources: &EngineBindingSources<'_>,
    defaults: &DefaultResources,
    entries: &mut Vec<ShaderBindingEntry>,
) {
    entries.clear();

    for slot in EngineShaderBinding::ALL {
        let Some(binding_index) = sources.material.engine_binding_index(slot) else {
            continue;
        };

        let entry = match slot {
            EngineShaderBinding::InstanceDataUbo => Some(ShaderBindingEntry::uniform_buffer(
                binding_index,
                sources.world.instance_buffer(),
            )),
            EngineShaderBinding::LightDataUbo => sources
                .light_data
                .map(|view| ShaderBindingEntry::uniform_buffer(binding_index, view)),
            EngineShaderBinding::SkeletalDataUbo => sources
                .skeleton
                .map(|skeleton| ShaderBindingEntry::uniform_buffer(binding_index, skeleton.skeletal_buffer())),
            EngineShaderBinding::ViewerDataUbo => Some(ShaderBindingEntry::uniform_buffer(
                binding_index,
                sources.viewer.viewer_buffer(),
            )),
            EngineShaderBinding::OverlayTexture => Some(ShaderBindingEntry::texture(
                binding_index,
                sources.texture_overlay.unwrap_or(defaults.white_texture),
                defaults.default_sampler,
            )),
        };

        entries.extend(entry);
    }

    sources.material.fill_shader_binding(entries, defaults);
}

/// Replay draw calls, binding each value only when it changes
pub fn replay_draw_calls(viewer: &ViewerInstance, draw_calls: &[DrawCall], command_buffer: &mut dyn CommandBufferBuilder) {
    let full_target = Recti::from_target_size(viewer.target_size());

    let mut pipeline = None;
    let mut shader_binding = None;
    let mut index_buffer = None;
    let mut vertex_buffer = None;
    let mut scissor_box = None;

    for draw_call in draw_calls {
        if pipeline != Some(draw_call.pipeline) {
            command_buffer.bind_pipeline(draw_call.pipeline);
            pipeline = Some(draw_call.pipeline);
        }

        if shader_binding != Some(draw_call.shader_binding) {
            command_buffer.bind_shader_binding(0, draw_call.shader_binding);
            shader_binding = Some(draw_call.shader_binding);
        }

        if let Some((buffer, index_type)) = draw_call.index_buffer {
            if index_buffer != draw_call.index_buffer {
                command_buffer.bind_index_buffer(buffer, index_type, 0);
                index_buffer = draw_call.index_buffer;
            }
        }

        if vertex_buffer != Some(draw_call.vertex_buffer) {
            command_buffer.bind_vertex_buffer(0, draw_call.vertex_buffer, 0);
            vertex_buffer = Some(draw_call.vertex_buffer);
        }

        let scissor = draw_call.scissor_box.unwrap_or(full_target);
        if scissor_box != Some(scissor) {
            command_buffer.set_scissor(scissor);
            scissor_box = Some(scissor);
        }

        if draw_call.index_buffer.is_some() {
            command_buffer.draw_indexed(draw_call.index_count, 1, draw_call.first_index, 0);
        } else {
            command_buffer.draw(draw_call.index_count, 1, draw_call.first_index, 0);
        }
    }
}

/// Draw calls and bookkeeping shared by the built-in renderers' data
#[derive(Debug, Default)]
pub struct DrawCallList {
    draw_calls: Vec<DrawCall>,
    ranges: HashMap<ElementId, DrawCallRange>,
    state_groups: usize,
}

impl DrawCallList {
    /// Empty list with room for `capacity` draw calls
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            draw_calls: Vec::with_capacity(capacity),
            ranges: HashMap::new(),
            state_groups: 0,
        }
    }

    /// Index the next pushed draw call will get
    pub fn next_index(&self) -> usize {
        self.draw_calls.len()
    }

    /// Append a draw call; `flush` tells whether it starts a new state group
    pub fn push(&mut self, draw_call: DrawCall, flush: FlushFlags) {
        if flush.contains(FlushFlags::DRAW_CALL) {
            self.state_groups += 1;
        }
        self.draw_calls.push(draw_call);
    }

    /// Record the range produced for a batch starting with `first`
    pub fn record_range(&mut self, first: ElementId, start: usize) {
        self.ranges.insert(
            first,
            DrawCallRange {
                start,
                count: self.draw_calls.len() - start,
            },
        );
    }

    /// Draw calls prepared for a batch starting with `first`
    ///
    /// # Panics
    ///
    /// Panics if no batch starting with `first` was prepared since the last clear.
    pub fn batch(&self, first: ElementId) -> &[DrawCall] {
        match self.ranges.get(&first) {
            Some(range) => range.of(&self.draw_calls),
            None => panic!("render called for batch {first:?} that was not prepared this frame"),
        }
    }

    /// Every draw call
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Number of draw calls
    pub fn len(&self) -> usize {
        self.draw_calls.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.draw_calls.is_empty()
    }

    /// Number of state groups
    pub const fn state_groups(&self) -> usize {
        self.state_groups
    }

    /// Forget everything, keeping allocations
    pub fn clear(&mut self) {
        self.draw_calls.clear();
        self.ranges.clear();
        self.state_groups = 0;
    }
}

/// Element renderers indexed by the kind they handle
#[derive(Default)]
pub struct ElementRendererRegistry {
    renderers: Vec<Option<Box<dyn ElementRenderer>>>,
}

impl std::fmt::Debug for ElementRendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.renderers.iter().flatten().map(|renderer| renderer.kind()).collect();
        f.debug_struct("ElementRendererRegistry").field("kinds", &kinds).finish()
    }
}

impl ElementRendererRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the submesh and sprite chain renderers
    pub fn with_default_renderers(defaults: DefaultResources, config: &RendererConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SubmeshRenderer::new(defaults, config)));
        registry.register(Box::new(SpriteChainRenderer::new(defaults, config)));
        registry
    }

    /// Register a renderer for its kind, returning the one it replaces
    pub fn register(&mut self, renderer: Box<dyn ElementRenderer>) -> Option<Box<dyn ElementRenderer>> {
        let index = renderer.kind().index();
        if self.renderers.len() <= index {
            self.renderers.resize_with(index + 1, || None);
        }
        self.renderers[index].replace(renderer)
    }

    /// Renderer for a kind
    pub fn get(&self, kind: ElementKind) -> Option<&dyn ElementRenderer> {
        self.renderers.get(kind.index()).and_then(Option::as_deref)
    }

    /// Mutable renderer for a kind
    pub fn get_mut(&mut self, kind: ElementKind) -> Option<&mut (dyn ElementRenderer + 'static)> {
        self.renderers.get_mut(kind.index()).and_then(Option::as_deref_mut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;
    use crate::foundation::math::Vec2;
    use crate::render::backends::{HeadlessDevice, RecordedCommand, RecordingCommandBuffer};

    struct Handles {
        pipelines: SlotMap<PipelineHandle, ()>,
        buffers: SlotMap<BufferHandle, ()>,
        bindings: SlotMap<ShaderBindingHandle, ()>,
    }

    impl Handles {
        fn new() -> Self {
            Self {
                pipelines: SlotMap::with_key(),
                buffers: SlotMap::with_key(),
                bindings: SlotMap::with_key(),
            }
        }
    }

    fn draw_call(pipeline: PipelineHandle, vertex_buffer: BufferHandle, shader_binding: ShaderBindingHandle) -> DrawCall {
        DrawCall {
            vertex_buffer,
            index_buffer: None,
            index_count: 3,
            first_index: 0,
            pipeline,
            shader_binding,
            scissor_box: None,
        }
    }

    fn viewer(width: f32, height: f32) -> ViewerInstance {
        ViewerInstance::create(&mut HeadlessDevice::new(), Vec2::new(width, height)).unwrap()
    }

    fn key(pipeline: RenderPipeline) -> BatchKey {
        BatchKey {
            pipeline,
            material: 1,
            world: 1,
            skeleton: None,
            light_data: None,
            texture_overlay: None,
            index_buffer: None,
            vertex_buffer: None,
            vertex_declaration: None,
            scissor_box: None,
        }
    }

    #[test]
    fn test_first_element_flushes_everything() {
        let mut handles = Handles::new();
        let mut layouts: SlotMap<PipelineLayoutHandle, ()> = SlotMap::with_key();
        let pipeline = RenderPipeline {
            handle: handles.pipelines.insert(()),
            layout: layouts.insert(()),
        };

        let mut state = BatchState::default();
        assert_eq!(state.advance(key(pipeline)), FlushFlags::all());
        assert_eq!(state.advance(key(pipeline)), FlushFlags::empty());
    }

    #[test]
    fn test_flush_flags_per_dimension() {
        let mut handles = Handles::new();
        let mut layouts: SlotMap<PipelineLayoutHandle, ()> = SlotMap::with_key();
        let layout = layouts.insert(());
        let p1 = RenderPipeline {
            handle: handles.pipelines.insert(()),
            layout,
        };
        let p2 = RenderPipeline {
            handle: handles.pipelines.insert(()),
            layout,
        };
        let base = key(p1);

        assert_eq!(base.diff(&key(p2)), FlushFlags::DRAW_CALL);
        assert_eq!(base.diff(&BatchKey { material: 2, ..base }), FlushFlags::all());
        assert_eq!(base.diff(&BatchKey { skeleton: Some(4), ..base }), FlushFlags::all());
        assert_eq!(
            base.diff(&BatchKey {
                scissor_box: Some(Recti::new(0, 0, 4, 4)),
                ..base
            }),
            FlushFlags::DRAW_CALL
        );
        assert_eq!(
            base.diff(&BatchKey {
                vertex_buffer: Some(handles.buffers.insert(())),
                ..base
            }),
            FlushFlags::DRAW_CALL
        );
    }

    #[test]
    fn test_simultaneous_changes_union() {
        let mut handles = Handles::new();
        let mut layouts: SlotMap<PipelineLayoutHandle, ()> = SlotMap::with_key();
        let layout = layouts.insert(());
        let p1 = RenderPipeline {
            handle: handles.pipelines.insert(()),
            layout,
        };
        let p2 = RenderPipeline {
            handle: handles.pipelines.insert(()),
            layout,
        };

        let next = BatchKey { material: 9, ..key(p2) };
        assert_eq!(key(p1).diff(&next), FlushFlags::all());
    }

    #[test]
    fn test_pipeline_runs_bind_once_each() {
        let mut handles = Handles::new();
        let p1 = handles.pipelines.insert(());
        let p2 = handles.pipelines.insert(());
        let v1 = handles.buffers.insert(());
        let binding = handles.bindings.insert(());

        let draw_calls = [
            draw_call(p1, v1, binding),
            draw_call(p1, v1, binding),
            draw_call(p2, v1, binding),
        ];
        let mut commands = RecordingCommandBuffer::new();
        replay_draw_calls(&viewer(800.0, 600.0), &draw_calls, &mut commands);

        let relevant: Vec<_> = commands
            .commands()
            .iter()
            .filter(|command| {
                matches!(command, RecordedCommand::BindPipeline(_) | RecordedCommand::Draw { .. })
            })
            .cloned()
            .collect();
        let draw = RecordedCommand::Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        };
        assert_eq!(
            relevant,
            vec![
                RecordedCommand::BindPipeline(p1),
                draw.clone(),
                draw.clone(),
                RecordedCommand::BindPipeline(p2),
                draw,
            ]
        );
        assert_eq!(
            commands.count_matching(|command| matches!(command, RecordedCommand::BindVertexBuffer { .. })),
            1
        );
    }

    #[test]
    fn test_unset_scissor_resolves_to_target_once() {
        let mut handles = Handles::new();
        let pipeline = handles.pipelines.insert(());
        let buffer = handles.buffers.insert(());
        let binding = handles.bindings.insert(());

        let draw_calls = [draw_call(pipeline, buffer, binding), draw_call(pipeline, buffer, binding)];
        let mut commands = RecordingCommandBuffer::new();
        replay_draw_calls(&viewer(800.0, 600.0), &draw_calls, &mut commands);

        let scissors: Vec<_> = commands
            .commands()
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::SetScissor(rect) => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(scissors, vec![Recti::new(0, 0, 800, 600)]);
    }

    #[test]
    fn test_explicit_scissor_equal_to_target_is_not_rebound() {
        let mut handles = Handles::new();
        let pipeline = handles.pipelines.insert(());
        let buffer = handles.buffers.insert(());
        let binding = handles.bindings.insert(());

        let mut clipped = draw_call(pipeline, buffer, binding);
        clipped.scissor_box = Some(Recti::new(0, 0, 800, 600));
        let draw_calls = [draw_call(pipeline, buffer, binding), clipped];

        let mut commands = RecordingCommandBuffer::new();
        replay_draw_calls(&viewer(800.0, 600.0), &draw_calls, &mut commands);
        assert_eq!(
            commands.count_matching(|command| matches!(command, RecordedCommand::SetScissor(_))),
            1
        );
    }

    #[test]
    fn test_indexed_draw_calls_bind_index_buffer_once() {
        let mut handles = Handles::new();
        let pipeline = handles.pipelines.insert(());
        let vertices = handles.buffers.insert(());
        let indices = handles.buffers.insert(());
        let binding = handles.bindings.insert(());

        let mut indexed = draw_call(pipeline, vertices, binding);
        indexed.index_buffer = Some((indices, IndexType::U16));
        indexed.index_count = 6;
        let mut second = indexed;
        second.first_index = 6;

        let mut commands = RecordingCommandBuffer::new();
        replay_draw_calls(&viewer(64.0, 64.0), &[indexed, second], &mut commands);

        assert_eq!(
            commands.count_matching(|command| matches!(command, RecordedCommand::BindIndexBuffer { .. })),
            1
        );
        assert!(commands.commands().contains(&RecordedCommand::DrawIndexed {
            index_count: 6,
            instance_count: 1,
            first_index: 6,
            first_instance: 0,
        }));
    }

    #[test]
    fn test_draw_call_list_ranges() {
        let mut handles = Handles::new();
        let mut elements: SlotMap<ElementId, ()> = SlotMap::with_key();
        let first = elements.insert(());
        let second = elements.insert(());
        let call = draw_call(handles.pipelines.insert(()), handles.buffers.insert(()), handles.bindings.insert(()));

        let mut list = DrawCallList::default();
        list.push(call, FlushFlags::all());
        list.push(call, FlushFlags::empty());
        list.record_range(first, 0);
        let start = list.next_index();
        list.push(call, FlushFlags::DRAW_CALL);
        list.record_range(second, start);

        assert_eq!(list.batch(first).len(), 2);
        assert_eq!(list.batch(second).len(), 1);
        assert_eq!(list.state_groups(), 2);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.state_groups(), 0);
    }

    #[test]
    #[should_panic(expected = "not prepared")]
    fn test_unprepared_batch_panics() {
        let mut elements: SlotMap<ElementId, ()> = SlotMap::with_key();
        DrawCallList::default().batch(elements.insert(()));
    }
}
