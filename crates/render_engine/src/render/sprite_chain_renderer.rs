//! Sprite chain element renderer
//!
//! Sprite chains carry their vertices inline. During prepare the vertices
//! are staged on the frame's upload pool and copied into pooled vertex
//! buffers; every chain is then drawn with the shared quad index buffer.
//! Vertex buffers go back to the pool only once the frame that used them
//! has completed on the GPU.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RendererConfig;
use crate::render::command_buffer::CommandBufferBuilder;
use crate::render::defaults::DefaultResources;
use crate::render::element::{ElementKind, RenderElement, RenderSpriteChain, RenderStates, SpriteVertex};
use crate::render::element_renderer::{
    downcast_data, downcast_data_mut, replay_draw_calls, BatchKey, BatchState, DrawCall, DrawCallList,
    ElementRenderer, ElementRendererData, EngineBindingSources, FlushFlags, ShaderBindingCache,
};
use crate::render::frame::RenderFrame;
use crate::render::instances::ViewerInstance;
use crate::render::render_queue::ElementRef;
use crate::render::resources::{
    BufferHandle, BufferInfo, BufferType, GpuResource, RenderBufferView, RenderDevice, ShaderBindingEntry,
    ShaderBindingHandle,
};
use crate::render::RenderResult;

const VERTICES_PER_SPRITE: u32 = 4;
const INDICES_PER_SPRITE: u32 = 6;

/// Vertex buffers of a fixed size, recycled across frames
#[derive(Debug)]
struct VertexBufferPool {
    buffer_size: u64,
    free: Mutex<Vec<BufferHandle>>,
}

impl VertexBufferPool {
    fn acquire(&self, device: &mut dyn RenderDevice) -> RenderResult<BufferHandle> {
        let recycled = self.free.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match recycled {
            Some(buffer) => Ok(buffer),
            None => {
                log::debug!("Allocating sprite vertex buffer of {} bytes", self.buffer_size);
                device.create_buffer(&BufferInfo::new(BufferType::Vertex, self.buffer_size))
            }
        }
    }

    fn release(&self, buffers: Vec<BufferHandle>) {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).extend(buffers);
    }

    fn take_all(&self) -> Vec<BufferHandle> {
        std::mem::take(&mut *self.free.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn free_count(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Per-frame data of the [`SpriteChainRenderer`]
#[derive(Debug, Default)]
pub struct SpriteChainRendererData {
    draw_calls: DrawCallList,
    shader_bindings: ShaderBindingCache,
    vertex_buffers: Vec<BufferHandle>,
    current_vertex_buffer: Option<(BufferHandle, u32)>,
}

impl SpriteChainRendererData {
    /// Every draw call prepared this frame
    pub fn draw_calls(&self) -> &[DrawCall] {
        self.draw_calls.draw_calls()
    }

    /// Pooled vertex buffers in use this frame
    pub fn vertex_buffers(&self) -> &[BufferHandle] {
        &self.vertex_buffers
    }
}

impl ElementRendererData for SpriteChainRendererData {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn draw_call_count(&self) -> usize {
        self.draw_calls.len()
    }

    fn shader_binding_count(&self) -> usize {
        self.shader_bindings.len()
    }

    fn state_group_count(&self) -> usize {
        self.draw_calls.state_groups()
    }
}

/// Element renderer for [`ElementKind::SpriteChain`]
#[derive(Debug)]
pub struct SpriteChainRenderer {
    defaults: DefaultResources,
    max_sprites: u32,
    draw_call_capacity: usize,
    pool: Arc<VertexBufferPool>,
    binding_entries: Vec<ShaderBindingEntry>,
}

impl SpriteChainRenderer {
    /// Create the renderer
    ///
    /// Pooled vertex buffers hold as many sprites as the configuration asks
    /// for, capped by what the shared quad index buffer can address.
    pub fn new(defaults: DefaultResources, config: &RendererConfig) -> Self {
        let max_sprites = config.sprite_chain.max_sprites_per_buffer.min(defaults.quad_capacity).max(1);
        let vertex_size = std::mem::size_of::<SpriteVertex>() as u64;

        Self {
            defaults,
            max_sprites,
            draw_call_capacity: config.initial_draw_call_capacity,
            pool: Arc::new(VertexBufferPool {
                buffer_size: u64::from(max_sprites * VERTICES_PER_SPRITE) * vertex_size,
                free: Mutex::new(Vec::new()),
            }),
            binding_entries: Vec::new(),
        }
    }

    /// Sprites one vertex buffer holds
    pub const fn max_sprites_per_buffer(&self) -> u32 {
        self.max_sprites
    }

    /// Vertex buffers waiting in the pool
    pub fn pooled_buffer_count(&self) -> usize {
        self.pool.free_count()
    }

    /// Destroy every pooled vertex buffer
    ///
    /// Buffers still owned by a frame in flight return to the pool when that
    /// frame completes and are not affected.
    pub fn destroy_pooled_buffers(&self, device: &mut dyn RenderDevice) {
        for buffer in self.pool.take_all() {
            device.destroy(GpuResource::Buffer(buffer));
        }
    }

    fn clamped_sprite_count(&self, chain: &RenderSpriteChain) -> u32 {
        let count = u32::try_from(chain.sprite_count()).unwrap_or(u32::MAX);
        if count > self.max_sprites {
            log::warn!(
                "Sprite chain of {} sprites exceeds the {} sprite buffer capacity, extra sprites are dropped",
                count,
                self.max_sprites
            );
            return self.max_sprites;
        }
        count
    }

    /// Place `sprite_count` sprites, switching to a fresh buffer when the current one is full
    fn reserve_vertices(
        &self,
        data: &mut SpriteChainRendererData,
        frame: &mut RenderFrame<'_>,
        sprite_count: u32,
    ) -> RenderResult<(BufferHandle, u32)> {
        let (buffer, used) = match data.current_vertex_buffer {
            Some((buffer, used)) if used + sprite_count <= self.max_sprites => (buffer, used),
            _ => {
                let buffer = self.pool.acquire(frame.device())?;
                data.vertex_buffers.push(buffer);
                (buffer, 0)
            }
        };

        data.current_vertex_buffer = Some((buffer, used + sprite_count));
        Ok((buffer, used))
    }
}

fn as_sprite_chain<'a>(element: &ElementRef<'a>) -> &'a RenderSpriteChain {
    match element.element {
        RenderElement::SpriteChain(chain) => chain,
        other => panic!("sprite chain renderer received a {:?} element", other.kind()),
    }
}

impl ElementRenderer for SpriteChainRenderer {
    fn kind(&self) -> ElementKind {
        ElementKind::SpriteChain
    }

    fn instantiate_data(&self) -> Box<dyn ElementRendererData> {
        Box::new(SpriteChainRendererData {
            draw_calls: DrawCallList::with_capacity(self.draw_call_capacity),
            ..SpriteChainRendererData::default()
        })
    }

    fn prepare(
        &mut self,
        viewer: &ViewerInstance,
        data: &mut dyn ElementRendererData,
        frame: &mut RenderFrame<'_>,
        elements: &[ElementRef<'_>],
        render_states: &[RenderStates],
    ) -> RenderResult<()> {
        assert!(!elements.is_empty(), "prepare called with an empty batch");
        assert_eq!(elements.len(), render_states.len(), "every element needs its render states");

        let data = downcast_data_mut::<SpriteChainRendererData>(data);
        let start = data.draw_calls.next_index();
        let quad_indices = Some((self.defaults.quad_index_buffer, DefaultResources::QUAD_INDEX_TYPE));
        let mut state = BatchState::default();
        let mut current_binding: Option<ShaderBindingHandle> = None;

        for (element, states) in elements.iter().zip(render_states) {
            let chain = as_sprite_chain(element);
            let sprite_count = self.clamped_sprite_count(chain);
            let (vertex_buffer, first_sprite) = self.reserve_vertices(data, frame, sprite_count)?;

            if sprite_count > 0 {
                let vertices = &chain.vertices[..(sprite_count * VERTICES_PER_SPRITE) as usize];
                let bytes: &[u8] = bytemuck::cast_slice(vertices);
                let offset = u64::from(first_sprite * VERTICES_PER_SPRITE) * std::mem::size_of::<SpriteVertex>() as u64;
                frame.upload(bytes, RenderBufferView::new(vertex_buffer, offset, bytes.len() as u64));
            }

            let key = BatchKey {
                pipeline: chain.pipeline,
                material: chain.material_instance.id(),
                world: chain.world_instance.id(),
                skeleton: None,
                light_data: states.light_data,
                texture_overlay: chain.texture_overlay,
                index_buffer: quad_indices,
                vertex_buffer: Some(vertex_buffer),
                vertex_declaration: Some(chain.vertex_declaration),
                scissor_box: states.resolve_scissor(chain.scissor_box),
            };
            let flush = state.advance(key);

            if flush.contains(FlushFlags::SHADER_BINDING) {
                current_binding = None;
            }

            let shader_binding = match current_binding {
                Some(binding) => binding,
                None => {
                    let sources = EngineBindingSources {
                        material: &chain.material_instance,
                        world: &chain.world_instance,
                        skeleton: None,
                        light_data: states.light_data,
                        viewer,
                        texture_overlay: chain.texture_overlay,
                    };
                    let binding = data.shader_bindings.acquire(
                        key.binding_key(viewer.id()),
                        &sources,
                        &self.defaults,
                        &mut self.binding_entries,
                        frame,
                    )?;
                    current_binding = Some(binding);
                    binding
                }
            };

            data.draw_calls.push(
                DrawCall {
                    vertex_buffer,
                    index_buffer: quad_indices,
                    index_count: sprite_count * INDICES_PER_SPRITE,
                    first_index: first_sprite * INDICES_PER_SPRITE,
                    pipeline: chain.pipeline.handle,
                    shader_binding,
                    scissor_box: key.scissor_box,
                },
                flush,
            );
        }

        data.draw_calls.record_range(elements[0].id, start);
        log::trace!(
            "Prepared {} sprite chains into {} vertex buffers",
            elements.len(),
            data.vertex_buffers.len()
        );

        Ok(())
    }

    fn render(
        &self,
        viewer: &ViewerInstance,
        data: &dyn ElementRendererData,
        command_buffer: &mut dyn CommandBufferBuilder,
        elements: &[ElementRef<'_>],
    ) {
        assert!(!elements.is_empty(), "render called with an empty batch");

        let data = downcast_data::<SpriteChainRendererData>(data);
        replay_draw_calls(viewer, data.draw_calls.batch(elements[0].id), command_buffer);
    }

    fn reset(&mut self, data: &mut dyn ElementRendererData, frame: &mut RenderFrame<'_>) {
        let data = downcast_data_mut::<SpriteChainRendererData>(data);
        data.shader_bindings.release_all(frame);
        data.draw_calls.clear();
        data.current_vertex_buffer = None;

        if !data.vertex_buffers.is_empty() {
            let buffers = std::mem::take(&mut data.vertex_buffers);
            let pool = Arc::clone(&self.pool);
            frame.push_release_callback(move |_| pool.release(buffers));
        }
    }

    fn release_resources(&mut self, device: &mut dyn RenderDevice) {
        self.destroy_pooled_buffers(device);
    }
}
