//! Command buffer that records instead of submitting

use crate::foundation::math::{Color, Recti};
use crate::render::command_buffer::{
    ClearValues, CommandBufferBuilder, MemoryAccessFlags, PipelineStageFlags, TextureLayout, TextureRegion,
};
use crate::render::frame::UploadAllocation;
use crate::render::resources::{
    BufferHandle, FramebufferHandle, IndexType, PipelineHandle, PipelineLayoutHandle, RenderBufferView,
    RenderPassHandle, SamplerFilter, ShaderBindingHandle, TextureHandle,
};

/// One recorded call on a [`CommandBufferBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `begin_debug_region`
    BeginDebugRegion {
        /// Region name
        name: String,
        /// Region color
        color: Color,
    },
    /// `end_debug_region`
    EndDebugRegion,
    /// `begin_render_pass`
    BeginRenderPass {
        /// Target framebuffer
        framebuffer: FramebufferHandle,
        /// Render pass
        render_pass: RenderPassHandle,
        /// Render area
        render_rect: Recti,
        /// Clear values per attachment
        clear_values: Vec<ClearValues>,
    },
    /// `end_render_pass`
    EndRenderPass,
    /// `next_subpass`
    NextSubpass,
    /// `bind_pipeline`
    BindPipeline(PipelineHandle),
    /// `bind_shader_binding`
    BindShaderBinding {
        /// Set index
        set: u32,
        /// Bound binding
        binding: ShaderBindingHandle,
    },
    /// `bind_shader_binding_with_layout`
    BindShaderBindingWithLayout {
        /// Explicit layout
        layout: PipelineLayoutHandle,
        /// Set index
        set: u32,
        /// Bound binding
        binding: ShaderBindingHandle,
    },
    /// `bind_index_buffer`
    BindIndexBuffer {
        /// Bound buffer
        buffer: BufferHandle,
        /// Index width
        index_type: IndexType,
        /// Byte offset
        offset: u64,
    },
    /// `bind_vertex_buffer`
    BindVertexBuffer {
        /// Binding point
        binding: u32,
        /// Bound buffer
        buffer: BufferHandle,
        /// Byte offset
        offset: u64,
    },
    /// `blit_texture`
    BlitTexture {
        /// Source texture
        from: TextureHandle,
        /// Source region
        from_region: TextureRegion,
        /// Destination texture
        to: TextureHandle,
        /// Destination region
        to_region: TextureRegion,
        /// Filter
        filter: SamplerFilter,
    },
    /// `copy_buffer`
    CopyBuffer {
        /// Source range
        source: RenderBufferView,
        /// Destination range
        target: RenderBufferView,
        /// Bytes copied
        size: u64,
        /// Offset inside the source range
        source_offset: u64,
        /// Offset inside the destination range
        target_offset: u64,
    },
    /// `copy_upload`
    CopyUpload {
        /// Source staging range
        allocation: UploadAllocation,
        /// Destination range
        target: RenderBufferView,
        /// Bytes copied
        size: u64,
        /// Offset inside the staging range
        source_offset: u64,
        /// Offset inside the destination range
        target_offset: u64,
    },
    /// `copy_texture`
    CopyTexture {
        /// Source texture
        from: TextureHandle,
        /// Source region
        from_region: TextureRegion,
        /// Destination texture
        to: TextureHandle,
        /// Destination origin
        to_position: [u32; 3],
    },
    /// `draw`
    Draw {
        /// Vertices drawn
        vertex_count: u32,
        /// Instances drawn
        instance_count: u32,
        /// First vertex
        first_vertex: u32,
        /// First instance
        first_instance: u32,
    },
    /// `draw_indexed`
    DrawIndexed {
        /// Indices drawn
        index_count: u32,
        /// Instances drawn
        instance_count: u32,
        /// First index
        first_index: u32,
        /// First instance
        first_instance: u32,
    },
    /// `pre_transfer_barrier`
    PreTransferBarrier,
    /// `post_transfer_barrier`
    PostTransferBarrier,
    /// `set_scissor`
    SetScissor(Recti),
    /// `set_viewport`
    SetViewport(Recti),
    /// `texture_barrier`
    TextureBarrier {
        /// Stages waited on
        src_stages: PipelineStageFlags,
        /// Stages that wait
        dst_stages: PipelineStageFlags,
        /// Accesses made available
        src_access: MemoryAccessFlags,
        /// Accesses made visible
        dst_access: MemoryAccessFlags,
        /// Layout before the barrier
        old_layout: TextureLayout,
        /// Layout after the barrier
        new_layout: TextureLayout,
        /// Affected texture
        texture: TextureHandle,
    },
}

/// [`CommandBufferBuilder`] keeping every call in order
#[derive(Debug, Default)]
pub struct RecordingCommandBuffer {
    commands: Vec<RecordedCommand>,
    debug_depth: usize,
}

impl RecordingCommandBuffer {
    /// Create an empty recording
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Number of recorded calls accepted by `predicate`
    pub fn count_matching(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }

    /// Drop the recording
    pub fn clear(&mut self) {
        self.commands.clear();
        self.debug_depth = 0;
    }

    fn record(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }
}

impl CommandBufferBuilder for RecordingCommandBuffer {
    fn begin_debug_region(&mut self, name: &str, color: Color) {
        self.debug_depth += 1;
        self.record(RecordedCommand::BeginDebugRegion {
            name: name.to_owned(),
            color,
        });
    }

    fn end_debug_region(&mut self) {
        match self.debug_depth.checked_sub(1) {
            Some(depth) => self.debug_depth = depth,
            None => log::warn!("end_debug_region without a matching begin_debug_region"),
        }
        self.record(RecordedCommand::EndDebugRegion);
    }

    fn begin_render_pass(
        &mut self,
        framebuffer: FramebufferHandle,
        render_pass: RenderPassHandle,
        render_rect: Recti,
        clear_values: &[ClearValues],
    ) {
        self.record(RecordedCommand::BeginRenderPass {
            framebuffer,
            render_pass,
            render_rect,
            clear_values: clear_values.to_vec(),
        });
    }

    fn end_render_pass(&mut self) {
        self.record(RecordedCommand::EndRenderPass);
    }

    fn next_subpass(&mut self) {
        self.record(RecordedCommand::NextSubpass);
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        self.record(RecordedCommand::BindPipeline(pipeline));
    }

    fn bind_shader_binding(&mut self, set: u32, binding: ShaderBindingHandle) {
        self.record(RecordedCommand::BindShaderBinding { set, binding });
    }

    fn bind_shader_binding_with_layout(&mut self, layout: PipelineLayoutHandle, set: u32, binding: ShaderBindingHandle) {
        self.record(RecordedCommand::BindShaderBindingWithLayout { layout, set, binding });
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, index_type: IndexType, offset: u64) {
        self.record(RecordedCommand::BindIndexBuffer {
            buffer,
            index_type,
            offset,
        });
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: BufferHandle, offset: u64) {
        self.record(RecordedCommand::BindVertexBuffer { binding, buffer, offset });
    }

    fn blit_texture(
        &mut self,
        from: TextureHandle,
        from_region: TextureRegion,
        _from_layout: TextureLayout,
        to: TextureHandle,
        to_region: TextureRegion,
        _to_layout: TextureLayout,
        filter: SamplerFilter,
    ) {
        self.record(RecordedCommand::BlitTexture {
            from,
            from_region,
            to,
            to_region,
            filter,
        });
    }

    fn copy_buffer(&mut self, source: RenderBufferView, target: RenderBufferView, size: u64, source_offset: u64, target_offset: u64) {
        self.record(RecordedCommand::CopyBuffer {
            source,
            target,
            size,
            source_offset,
            target_offset,
        });
    }

    fn copy_upload(&mut self, allocation: UploadAllocation, target: RenderBufferView, size: u64, source_offset: u64, target_offset: u64) {
        self.record(RecordedCommand::CopyUpload {
            allocation,
            target,
            size,
            source_offset,
            target_offset,
        });
    }

    fn copy_texture(
        &mut self,
        from: TextureHandle,
        from_region: TextureRegion,
        _from_layout: TextureLayout,
        to: TextureHandle,
        to_position: [u32; 3],
        _to_layout: TextureLayout,
    ) {
        self.record(RecordedCommand::CopyTexture {
            from,
            from_region,
            to,
            to_position,
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.record(RecordedCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, first_instance: u32) {
        self.record(RecordedCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            first_instance,
        });
    }

    fn pre_transfer_barrier(&mut self) {
        self.record(RecordedCommand::PreTransferBarrier);
    }

    fn post_transfer_barrier(&mut self) {
        self.record(RecordedCommand::PostTransferBarrier);
    }

    fn set_scissor(&mut self, rect: Recti) {
        self.record(RecordedCommand::SetScissor(rect));
    }

    fn set_viewport(&mut self, rect: Recti) {
        self.record(RecordedCommand::SetViewport(rect));
    }

    fn texture_barrier(
        &mut self,
        src_stages: PipelineStageFlags,
        dst_stages: PipelineStageFlags,
        src_access: MemoryAccessFlags,
        dst_access: MemoryAccessFlags,
        old_layout: TextureLayout,
        new_layout: TextureLayout,
        texture: TextureHandle,
    ) {
        self.record(RecordedCommand::TextureBarrier {
            src_stages,
            dst_stages,
            src_access,
            dst_access,
            old_layout,
            new_layout,
            texture,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_call_order() {
        let mut commands = RecordingCommandBuffer::new();
        commands.begin_debug_region("batch", Color::WHITE);
        commands.set_scissor(Recti::new(0, 0, 8, 8));
        commands.draw(3, 1, 0, 0);
        commands.end_debug_region();

        assert_eq!(commands.commands().len(), 4);
        assert_eq!(commands.commands()[1], RecordedCommand::SetScissor(Recti::new(0, 0, 8, 8)));
        assert_eq!(commands.commands()[3], RecordedCommand::EndDebugRegion);
        assert_eq!(commands.count_matching(|c| matches!(c, RecordedCommand::Draw { .. })), 1);
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut commands = RecordingCommandBuffer::new();
        commands.pre_transfer_barrier();
        commands.clear();

        assert!(commands.commands().is_empty());
    }
}
