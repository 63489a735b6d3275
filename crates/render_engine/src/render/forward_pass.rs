//! # Forward Pass
//!
//! Drives one frame of the render queue through the element renderers:
//!
//! 1. clear the registry, then register the frame's layers (ascending) and
//!    every queued element
//! 2. stable-sort the queue by sorting key, when enabled
//! 3. split the queue into maximal same-kind batches and prepare each one
//! 4. render each batch, optionally inside a debug region
//! 5. reset every renderer's per-frame data
//!
//! The queue must not change between prepare and render, since render
//! recomputes the same batches from it.

use crate::config::RendererConfig;
use crate::foundation::math::Color;
use crate::render::command_buffer::CommandBufferBuilder;
use crate::render::element::ElementKind;
use crate::render::element_renderer::{ElementRendererData, ElementRendererRegistry};
use crate::render::frame::RenderFrame;
use crate::render::instances::ViewerInstance;
use crate::render::registry::RenderQueueRegistry;
use crate::render::render_queue::RenderQueue;
use crate::render::resources::RenderDevice;
use crate::render::{RenderError, RenderResult};

/// Counters gathered while preparing a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Elements in the queue
    pub elements: usize,
    /// Same-kind batches the queue split into
    pub batches: usize,
    /// Draw calls prepared
    pub draw_calls: usize,
    /// Shader bindings built
    pub shader_bindings: usize,
    /// Draw calls that reused an already built binding
    pub shader_bindings_reused: usize,
    /// Groups of draw calls sharing every bound value
    pub state_groups: usize,
}

impl FrameStats {
    /// Average number of elements per batch
    pub fn avg_elements_per_batch(&self) -> f32 {
        if self.batches == 0 {
            0.0
        } else {
            self.elements as f32 / self.batches as f32
        }
    }
}

fn debug_region_color(kind: ElementKind) -> Color {
    match kind {
        ElementKind::Submesh => Color::new(0.2, 0.6, 1.0, 1.0),
        ElementKind::SpriteChain => Color::new(1.0, 0.6, 0.2, 1.0),
    }
}

/// Forward rendering of a render queue
pub struct ForwardPass {
    registry: RenderQueueRegistry,
    renderers: ElementRendererRegistry,
    renderer_data: Vec<Option<Box<dyn ElementRendererData>>>,
    sort_render_queue: bool,
    debug_regions: bool,
    stats: FrameStats,
}

impl std::fmt::Debug for ForwardPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardPass")
            .field("renderers", &self.renderers)
            .field("sort_render_queue", &self.sort_render_queue)
            .field("debug_regions", &self.debug_regions)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ForwardPass {
    /// Create a pass drawing with `renderers`
    pub fn new(renderers: ElementRendererRegistry, config: &RendererConfig) -> Self {
        Self {
            registry: RenderQueueRegistry::new(),
            renderers,
            renderer_data: (0..ElementKind::COUNT).map(|_| None).collect(),
            sort_render_queue: config.sort_render_queue,
            debug_regions: config.debug_regions,
            stats: FrameStats::default(),
        }
    }

    /// Element renderers used by the pass
    pub fn renderers(&self) -> &ElementRendererRegistry {
        &self.renderers
    }

    /// Mutable access to the element renderers
    pub fn renderers_mut(&mut self) -> &mut ElementRendererRegistry {
        &mut self.renderers
    }

    /// Registry filled by the last prepare
    pub fn registry(&self) -> &RenderQueueRegistry {
        &self.registry
    }

    /// Counters of the last prepare
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Register, sort and prepare every batch of `queue`
    ///
    /// Fails if a batch has no renderer for its kind, or if a renderer fails
    /// to build its shader bindings. Batches prepared before the failure stay
    /// in the renderer data until [`reset`](Self::reset).
    ///
    /// [`stats`](Self::stats) then describes this call alone, even when
    /// earlier calls since the last reset left data behind.
    pub fn prepare(
        &mut self,
        viewer: &ViewerInstance,
        queue: &mut RenderQueue,
        frame: &mut RenderFrame<'_>,
    ) -> RenderResult<()> {
        self.registry.clear();

        let mut layers: Vec<i32> = queue.iter().map(|(element, _)| element.element.render_layer()).collect();
        layers.sort_unstable();
        layers.dedup();
        for layer in layers {
            self.registry.register_layer(layer);
        }
        for (element, _) in queue.iter() {
            element.element.register(&mut self.registry);
        }

        if self.sort_render_queue {
            let registry = &self.registry;
            queue.sort_by_key(|element| element.sorting_key(registry));
        }

        let batches = queue.batches();
        self.stats = FrameStats {
            elements: queue.len(),
            batches: batches.len(),
            ..FrameStats::default()
        };

        let before = self.data_totals();
        for batch in &batches {
            let renderer = self
                .renderers
                .get_mut(batch.kind)
                .ok_or(RenderError::MissingElementRenderer(batch.kind))?;
            let data = self.renderer_data[batch.kind.index()].get_or_insert_with(|| renderer.instantiate_data());

            log::trace!("Preparing {:?} batch of {} elements", batch.kind, batch.elements.len());
            renderer.prepare(viewer, &mut **data, frame, &batch.elements, &batch.render_states)?;
        }

        let after = self.data_totals();
        self.stats.draw_calls = after.draw_calls - before.draw_calls;
        self.stats.shader_bindings = after.shader_bindings - before.shader_bindings;
        self.stats.state_groups = after.state_groups - before.state_groups;
        self.stats.shader_bindings_reused = self.stats.draw_calls.saturating_sub(self.stats.shader_bindings);

        log::debug!(
            "Forward pass prepared {} elements in {} batches: {} draw calls, {} shader bindings ({} reused), {} state groups",
            self.stats.elements,
            self.stats.batches,
            self.stats.draw_calls,
            self.stats.shader_bindings,
            self.stats.shader_bindings_reused,
            self.stats.state_groups
        );

        Ok(())
    }

    /// Counts held by the per-kind data since the last reset
    fn data_totals(&self) -> FrameStats {
        self.renderer_data
            .iter()
            .flatten()
            .fold(FrameStats::default(), |mut totals, data| {
                totals.draw_calls += data.draw_call_count();
                totals.shader_bindings += data.shader_binding_count();
                totals.state_groups += data.state_group_count();
                totals
            })
    }

    /// Record the prepared batches of `queue` into `command_buffer`
    ///
    /// # Panics
    ///
    /// Panics if `queue` was not successfully prepared by this pass since the
    /// last reset, or was modified in between.
    pub fn render(&self, viewer: &ViewerInstance, queue: &RenderQueue, command_buffer: &mut dyn CommandBufferBuilder) {
        for (index, batch) in queue.batches().iter().enumerate() {
            let renderer = self.renderers.get(batch.kind);
            let data = self.renderer_data[batch.kind.index()].as_deref();
            let (Some(renderer), Some(data)) = (renderer, data) else {
                panic!("{:?} batch rendered without a successful prepare", batch.kind);
            };

            if self.debug_regions {
                command_buffer.begin_debug_region(&format!("{:?} batch {index}", batch.kind), debug_region_color(batch.kind));
            }

            renderer.render(viewer, data, command_buffer, &batch.elements);

            if self.debug_regions {
                command_buffer.end_debug_region();
            }
        }
    }

    /// Reset the per-frame data of every renderer
    ///
    /// Shader bindings and pooled buffers are handed to `frame` and released
    /// once it completes.
    pub fn reset(&mut self, frame: &mut RenderFrame<'_>) {
        for kind in ElementKind::ALL {
            let (Some(renderer), Some(data)) = (
                self.renderers.get_mut(kind),
                self.renderer_data[kind.index()].as_deref_mut(),
            ) else {
                continue;
            };
            renderer.reset(data, frame);
        }
    }

    /// Destroy what the renderers keep across frames
    ///
    /// Call after every frame has completed.
    pub fn release_resources(&mut self, device: &mut dyn RenderDevice) {
        for kind in ElementKind::ALL {
            if let Some(renderer) = self.renderers.get_mut(kind) {
                renderer.release_resources(device);
            }
        }
    }
}
