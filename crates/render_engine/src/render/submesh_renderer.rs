//! Submesh element renderer
//!
//! Draws [`RenderSubmesh`] elements straight out of their own vertex and
//! index buffers. Per batch, it tracks the state of the previous element and
//! rebuilds the shader binding only when a binding input changes.

use std::any::Any;

use crate::config::RendererConfig;
use crate::render::command_buffer::CommandBufferBuilder;
use crate::render::defaults::DefaultResources;
use crate::render::element::{ElementKind, RenderElement, RenderStates, RenderSubmesh};
use crate::render::element_renderer::{
    downcast_data, downcast_data_mut, replay_draw_calls, BatchKey, BatchState, DrawCall, DrawCallList,
    ElementRenderer, ElementRendererData, EngineBindingSources, FlushFlags, ShaderBindingCache,
};
use crate::render::frame::RenderFrame;
use crate::render::instances::ViewerInstance;
use crate::render::render_queue::ElementRef;
use crate::render::resources::{ShaderBindingEntry, ShaderBindingHandle};
use crate::render::RenderResult;

/// Per-frame data of the [`SubmeshRenderer`]
#[derive(Debug, Default)]
pub struct SubmeshRendererData {
    draw_calls: DrawCallList,
    shader_bindings: ShaderBindingCache,
}

impl SubmeshRendererData {
    /// Every draw call prepared this frame
    pub fn draw_calls(&self) -> &[DrawCall] {
        self.draw_calls.draw_calls()
    }
}

impl ElementRendererData for SubmeshRendererData {
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

/// Element renderer for [`ElementKind::Submesh`]
#[derive(Debug)]
pub struct SubmeshRenderer {
    defaults: DefaultResources,
    draw_call_capacity: usize,
    binding_entries: Vec<ShaderBindingEntry>,
}

impl SubmeshRenderer {
    /// Create the renderer
    pub fn new(defaults: DefaultResources, config: &RendererConfig) -> Self {
        Self {
            defaults,
            draw_call_capacity: config.initial_draw_call_capacity,
            binding_entries: Vec::new(),
        }
    }

    fn batch_key(submesh: &RenderSubmesh, states: &RenderStates) -> BatchKey {
        BatchKey {
            pipeline: submesh.pipeline,
            material: submesh.material_instance.id(),
            world: submesh.world_instance.id(),
            skeleton: submesh.skeleton_instance.as_ref().map(|skeleton| skeleton.id()),
            light_data: states.light_data,
            texture_overlay: None,
            index_buffer: submesh.geometry.index_buffer,
            vertex_buffer: Some(submesh.geometry.vertex_buffer),
            vertex_declaration: None,
            scissor_box: states.resolve_scissor(submesh.scissor_box),
        }
    }
}

fn as_submesh<'a>(element: &ElementRef<'a>) -> &'a RenderSubmesh {
    match element.element {
        RenderElement::Submesh(submesh) => submesh,
        other => panic!("submesh renderer received a {:?} element", other.kind()),
    }
}

impl ElementRenderer for SubmeshRenderer {
    fn kind(&self) -> ElementKind {
        ElementKind::Submesh
    }

    fn instantiate_data(&self) -> Box<dyn ElementRendererData> {
        Box::new(SubmeshRendererData {
            draw_calls: DrawCallList::with_capacity(self.draw_call_capacity),
            shader_bindings: ShaderBindingCache::default(),
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

        let data = downcast_data_mut::<SubmeshRendererData>(data);
        let start = data.draw_calls.next_index();
        let mut state = BatchState::default();
        let mut current_binding: Option<ShaderBindingHandle> = None;

        for (element, states) in elements.iter().zip(render_states) {
            let submesh = as_submesh(element);
            let key = Self::batch_key(submesh, states);
            let flush = state.advance(key);

            if flush.contains(FlushFlags::SHADER_BINDING) {
                current_binding = None;
            }

            let shader_binding = match current_binding {
                Some(binding) => binding,
                None => {
                    let sources = EngineBindingSources {
                        material: &submesh.material_instance,
                        world: &submesh.world_instance,
                        skeleton: submesh.skeleton_instance.as_deref(),
                        light_data: states.light_data,
                        viewer,
                        texture_overlay: None,
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
                    vertex_buffer: submesh.geometry.vertex_buffer,
                    index_buffer: submesh.geometry.index_buffer,
                    index_count: submesh.geometry.index_count,
                    first_index: 0,
                    pipeline: submesh.pipeline.handle,
                    shader_binding,
                    scissor_box: key.scissor_box,
                },
                flush,
            );
        }

        data.draw_calls.record_range(elements[0].id, start);
        log::trace!(
            "Prepared {} submeshes ({} shader bindings this frame)",
            elements.len(),
            data.shader_bindings.len()
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

        let data = downcast_data::<SubmeshRendererData>(data);
        replay_draw_calls(viewer, data.draw_calls.batch(elements[0].id), command_buffer);
    }

    fn reset(&mut self, data: &mut dyn ElementRendererData, frame: &mut RenderFrame<'_>) {
        let data = downcast_data_mut::<SubmeshRendererData>(data);
        data.shader_bindings.release_all(frame);
        data.draw_calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::foundation::math::{Mat4, Recti, Vec2};
    use crate::render::backends::{HeadlessDevice, RecordedCommand, RecordingCommandBuffer};
    use crate::render::element::SubmeshGeometry;
    use crate::render::frame::FrameScheduler;
    use crate::render::instances::{SkeletonInstance, WorldInstance};
    use crate::render::material::{EngineShaderBinding, Material, MaterialInstance};
    use crate::render::render_queue::RenderQueue;
    use crate::render::resources::{
        BindingSlot, BindingType, BufferHandle, BufferInfo, BufferType, IndexType, PipelineLayoutInfo,
        PipelineLayoutHandle, RenderBufferView, RenderDevice, RenderPipeline, RenderPipelineInfo, ShaderBindingContent,
    };

    fn layout_info() -> PipelineLayoutInfo {
        let uniform = |index| BindingSlot {
            index,
            binding_type: BindingType::UniformBuffer,
        };
        PipelineLayoutInfo {
            sets: vec![vec![
                uniform(0),
                uniform(1),
                uniform(2),
                uniform(3),
                BindingSlot {
                    index: 4,
                    binding_type: BindingType::Texture,
                },
            ]],
        }
    }

    struct Scene {
        device: HeadlessDevice,
        scheduler: FrameScheduler,
        renderer: SubmeshRenderer,
        layout: PipelineLayoutHandle,
        viewer: ViewerInstance,
        material: Arc<MaterialInstance>,
        world: Arc<WorldInstance>,
    }

    impl Scene {
        fn new() -> Self {
            let config = RendererConfig::default();
            let mut device = HeadlessDevice::new();
            let mut scheduler = FrameScheduler::new(&config);

            let defaults = {
                let mut frame = scheduler.begin_frame(&mut device).unwrap();
                let defaults = DefaultResources::create(&mut frame, &config).unwrap();
                frame.flush_transfers(&mut RecordingCommandBuffer::new());
                frame.submit();
                defaults
            };
            scheduler.complete_all(&mut device);

            let material = Material::new("basic")
                .with_engine_binding(EngineShaderBinding::InstanceDataUbo, 0)
                .with_engine_binding(EngineShaderBinding::SkeletalDataUbo, 1)
                .with_engine_binding(EngineShaderBinding::ViewerDataUbo, 2)
                .with_engine_binding(EngineShaderBinding::LightDataUbo, 3)
                .with_texture_slot("BaseColorMap", 4);

            let layout = device.create_pipeline_layout(&layout_info()).unwrap();

            let viewer = ViewerInstance::create(&mut device, Vec2::new(800.0, 600.0)).unwrap();
            let world = Arc::new(WorldInstance::create(&mut device, Mat4::identity()).unwrap());

            Self {
                device,
                scheduler,
                renderer: SubmeshRenderer::new(defaults, &config),
                layout,
                viewer,
                material: Arc::new(MaterialInstance::new(Arc::new(material))),
                world,
            }
        }

        fn pipeline(&mut self) -> RenderPipeline {
            self.device
                .create_render_pipeline(&RenderPipelineInfo {
                    layout: self.layout,
                    vertex_declarations: Vec::new(),
                })
                .unwrap()
        }

        fn vertex_buffer(&mut self) -> BufferHandle {
            self.device
                .create_buffer(&BufferInfo::new(BufferType::Vertex, 1024))
                .unwrap()
        }

        fn submesh(&self, pipeline: RenderPipeline, vertex_buffer: BufferHandle) -> RenderSubmesh {
            RenderSubmesh {
                render_layer: 0,
                material_instance: Arc::clone(&self.material),
                pipeline,
                world_instance: Arc::clone(&self.world),
                skeleton_instance: None,
                geometry: SubmeshGeometry::non_indexed(vertex_buffer, 3),
                scissor_box: None,
            }
        }

        /// Prepare, render and reset the queue as a single batch
        fn run(&mut self, queue: &RenderQueue) -> (RecordingCommandBuffer, usize, usize) {
            let mut data = self.renderer.instantiate_data();
            let mut commands = RecordingCommandBuffer::new();
            let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();
            let states: Vec<_> = queue.iter().map(|(_, states)| *states).collect();

            let mut frame = self.scheduler.begin_frame(&mut self.device).unwrap();
            self.renderer
                .prepare(&self.viewer, data.as_mut(), &mut frame, &elements, &states)
                .unwrap();
            let draw_calls = data.draw_call_count();
            let bindings = data.shader_binding_count();

            self.renderer.render(&self.viewer, data.as_ref(), &mut commands, &elements);
            self.renderer.reset(data.as_mut(), &mut frame);
            frame.submit();

            (commands, draw_calls, bindings)
        }
    }

    fn count(commands: &RecordingCommandBuffer, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        commands.count_matching(predicate)
    }

    fn viewer_entry(device: &HeadlessDevice, binding: ShaderBindingHandle) -> ShaderBindingContent {
        device
            .shader_binding_entries(binding)
            .unwrap()
            .iter()
            .find(|entry| entry.binding_index == 2)
            .unwrap()
            .content
    }

    #[test]
    fn test_one_draw_call_per_element_and_pipeline_runs() {
        let mut scene = Scene::new();
        let p1 = scene.pipeline();
        let p2 = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        for pipeline in [p1, p1, p2, p2, p1] {
            queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        }

        let (commands, draw_calls, _) = scene.run(&queue);
        assert_eq!(draw_calls, 5);
        assert_eq!(count(&commands, |c| matches!(c, RecordedCommand::BindPipeline(_))), 3);
        assert_eq!(count(&commands, |c| matches!(c, RecordedCommand::Draw { .. })), 5);
    }

    #[test]
    fn test_end_to_end_command_stream() {
        let mut scene = Scene::new();
        let p1 = scene.pipeline();
        let p2 = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        for pipeline in [p1, p1, p2] {
            queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        }

        let (commands, _, _) = scene.run(&queue);
        let stream: Vec<_> = commands
            .commands()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RecordedCommand::BindPipeline(_) | RecordedCommand::Draw { .. } | RecordedCommand::BindVertexBuffer { .. }
                )
            })
            .map(|c| match c {
                RecordedCommand::BindPipeline(handle) if *handle == p1.handle => "bind(P1)",
                RecordedCommand::BindPipeline(_) => "bind(P2)",
                RecordedCommand::BindVertexBuffer { .. } => "vertex(V1)",
                _ => "draw",
            })
            .collect();

        assert_eq!(stream, vec!["bind(P1)", "vertex(V1)", "draw", "draw", "bind(P2)", "draw"]);
    }

    #[test]
    fn test_identical_inputs_share_one_binding() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();
        let v2 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v2)), RenderStates::default());

        let (commands, draw_calls, bindings) = scene.run(&queue);
        assert_eq!(draw_calls, 2);
        assert_eq!(bindings, 1);
        assert_eq!(count(&commands, |c| matches!(c, RecordedCommand::BindShaderBinding { .. })), 1);
        assert_eq!(count(&commands, |c| matches!(c, RecordedCommand::BindVertexBuffer { .. })), 2);
    }

    #[test]
    fn test_binding_inputs_rebuild_and_cache_hits() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();
        let light = RenderBufferView::whole(scene.vertex_buffer(), 64);

        let mut queue = RenderQueue::new();
        let plain = RenderStates::default();
        let lit = RenderStates::default().with_light_data(light);
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), plain);
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), lit);
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), plain);

        let (commands, draw_calls, bindings) = scene.run(&queue);
        assert_eq!(draw_calls, 3);
        assert_eq!(bindings, 2);
        assert_eq!(count(&commands, |c| matches!(c, RecordedCommand::BindShaderBinding { .. })), 3);
    }

    #[test]
    fn test_bindings_are_shared_across_batches_of_one_frame() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let other_layout = scene.device.create_pipeline_layout(&layout_info()).unwrap();
        let other_pipeline = scene
            .device
            .create_render_pipeline(&RenderPipelineInfo {
                layout: other_layout,
                vertex_declarations: Vec::new(),
            })
            .unwrap();

        let mut queue = RenderQueue::new();
        for pipeline in [pipeline, pipeline, other_pipeline] {
            queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        }
        let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();
        let states = [RenderStates::default()];

        let mut data = scene.renderer.instantiate_data();
        let mut frame = scene.scheduler.begin_frame(&mut scene.device).unwrap();
        for element in &elements {
            scene
                .renderer
                .prepare(&scene.viewer, data.as_mut(), &mut frame, std::slice::from_ref(element), &states)
                .unwrap();
        }
        frame.submit();

        let draw_calls = downcast_data::<SubmeshRendererData>(data.as_ref()).draw_calls();
        assert_eq!(draw_calls.len(), 3);
        assert_eq!(draw_calls[0].shader_binding, draw_calls[1].shader_binding);
        assert_ne!(draw_calls[1].shader_binding, draw_calls[2].shader_binding);
        assert_eq!(data.shader_binding_count(), 2);
    }

    #[test]
    fn test_each_viewer_gets_its_own_binding() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();
        let minimap = ViewerInstance::create(&mut scene.device, Vec2::new(320.0, 200.0)).unwrap();

        let mut queue = RenderQueue::new();
        for _ in 0..2 {
            queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        }
        let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();
        let states = [RenderStates::default()];

        let mut data = scene.renderer.instantiate_data();
        let mut frame = scene.scheduler.begin_frame(&mut scene.device).unwrap();
        scene
            .renderer
            .prepare(&scene.viewer, data.as_mut(), &mut frame, &elements[..1], &states)
            .unwrap();
        scene
            .renderer
            .prepare(&minimap, data.as_mut(), &mut frame, &elements[1..], &states)
            .unwrap();
        frame.submit();

        let draw_calls = downcast_data::<SubmeshRendererData>(data.as_ref()).draw_calls();
        assert_ne!(draw_calls[0].shader_binding, draw_calls[1].shader_binding);
        assert_eq!(
            viewer_entry(&scene.device, draw_calls[0].shader_binding),
            ShaderBindingContent::UniformBuffer(scene.viewer.viewer_buffer())
        );
        assert_eq!(
            viewer_entry(&scene.device, draw_calls[1].shader_binding),
            ShaderBindingContent::UniformBuffer(minimap.viewer_buffer())
        );
    }

    #[test]
    fn test_optional_slots_are_omitted() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());

        let mut data = scene.renderer.instantiate_data();
        let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();
        let mut frame = scene.scheduler.begin_frame(&mut scene.device).unwrap();
        scene
            .renderer
            .prepare(&scene.viewer, data.as_mut(), &mut frame, &elements, &[RenderStates::default()])
            .unwrap();
        frame.submit();

        let data = downcast_data::<SubmeshRendererData>(data.as_ref());
        let binding = data.draw_calls()[0].shader_binding;
        let mut indices: Vec<_> = scene
            .device
            .shader_binding_entries(binding)
            .unwrap()
            .iter()
            .map(|entry| entry.binding_index)
            .collect();
        indices.sort_unstable();

        // no skeleton and no light data: slots 1 and 3 are skipped
        assert_eq!(indices, vec![0, 2, 4]);
    }

    #[test]
    fn test_skeleton_and_scissor() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();
        let skeleton = Arc::new(SkeletonInstance::create(&mut scene.device, 2).unwrap());

        let mut skinned = scene.submesh(pipeline, v1);
        skinned.skeleton_instance = Some(skeleton);
        let mut clipped = scene.submesh(pipeline, v1);
        clipped.scissor_box = Some(Recti::new(10, 10, 100, 100));

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        queue.insert(RenderElement::Submesh(skinned), RenderStates::default());
        queue.insert(RenderElement::Submesh(clipped), RenderStates::default());

        let (commands, _, bindings) = scene.run(&queue);
        assert_eq!(bindings, 2);

        let scissors: Vec<_> = commands
            .commands()
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::SetScissor(rect) => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(scissors, vec![Recti::new(0, 0, 800, 600), Recti::new(10, 10, 100, 100)]);
    }

    #[test]
    fn test_indexed_submesh_uses_draw_indexed() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();
        let indices = scene
            .device
            .create_buffer(&BufferInfo::new(BufferType::Index, 72))
            .unwrap();

        let mut submesh = scene.submesh(pipeline, v1);
        submesh.geometry = SubmeshGeometry::indexed(v1, indices, IndexType::U32, 18);

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(submesh), RenderStates::default());

        let (commands, _, _) = scene.run(&queue);
        assert!(commands.commands().contains(&RecordedCommand::BindIndexBuffer {
            buffer: indices,
            index_type: IndexType::U32,
            offset: 0,
        }));
        assert!(commands.commands().contains(&RecordedCommand::DrawIndexed {
            index_count: 18,
            instance_count: 1,
            first_index: 0,
            first_instance: 0,
        }));
    }

    #[test]
    fn test_reset_releases_bindings_after_frame_completes() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());

        let before = scene.device.live_shader_bindings();
        scene.run(&queue);
        assert_eq!(scene.device.live_shader_bindings(), before + 1);

        scene.scheduler.complete_all(&mut scene.device);
        assert_eq!(scene.device.live_shader_bindings(), before);
    }

    #[test]
    fn test_double_reset_leaves_empty_data() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();

        let mut data = scene.renderer.instantiate_data();
        let mut frame = scene.scheduler.begin_frame(&mut scene.device).unwrap();
        scene
            .renderer
            .prepare(&scene.viewer, data.as_mut(), &mut frame, &elements, &[RenderStates::default()])
            .unwrap();

        scene.renderer.reset(data.as_mut(), &mut frame);
        scene.renderer.reset(data.as_mut(), &mut frame);
        frame.submit();

        let fresh = scene.renderer.instantiate_data();
        assert_eq!(data.draw_call_count(), fresh.draw_call_count());
        assert_eq!(data.shader_binding_count(), fresh.shader_binding_count());
        assert_eq!(data.state_group_count(), 0);
        assert_eq!(scene.scheduler.pending_releases(), 1);
    }

    #[test]
    fn test_reset_without_prepare() {
        let mut scene = Scene::new();
        let mut data = scene.renderer.instantiate_data();
        let mut frame = scene.scheduler.begin_frame(&mut scene.device).unwrap();

        scene.renderer.reset(data.as_mut(), &mut frame);
        assert_eq!(data.draw_call_count(), 0);
    }

    #[test]
    #[should_panic(expected = "not prepared")]
    fn test_render_without_prepare_panics() {
        let mut scene = Scene::new();
        let pipeline = scene.pipeline();
        let v1 = scene.vertex_buffer();

        let mut queue = RenderQueue::new();
        queue.insert(RenderElement::Submesh(scene.submesh(pipeline, v1)), RenderStates::default());
        let elements: Vec<_> = queue.iter().map(|(element, _)| element).collect();

        let data = scene.renderer.instantiate_data();
        let mut commands = RecordingCommandBuffer::new();
        scene.renderer.render(&scene.viewer, data.as_ref(), &mut commands, &elements);
    }
}
