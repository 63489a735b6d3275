//! Engine-wide fallback resources
//!
//! Created once at startup and shared by every element renderer: a 1x1
//! white texture used when a material texture or the overlay is missing, a
//! linear sampler, the shared quad index buffer sprite chains draw with and
//! the sprite vertex layout.

use crate::config::RendererConfig;
use crate::render::frame::RenderFrame;
use crate::render::resources::{
    BufferHandle, BufferInfo, BufferType, GpuResource, IndexType, RenderBufferView, SamplerHandle,
    SamplerInfo, TextureHandle, TextureInfo, VertexDeclaration, VertexDeclarationHandle,
};
use crate::render::RenderResult;

/// Indices of `quad_count` quads, two triangles each
///
/// Quad `i` uses vertices `4i..4i+4`: origin corner, +X corner, +Y corner
/// and the opposite corner.
pub fn quad_indices(quad_count: u32) -> Vec<u16> {
    (0..quad_count)
        .flat_map(|quad| {
            let base = u16::try_from(quad * 4).unwrap_or(u16::MAX - 3);
            [base, base + 2, base + 1, base + 1, base + 2, base + 3]
        })
        .collect()
}

/// Handles of the engine's fallback resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultResources {
    /// 1x1 opaque white texture
    pub white_texture: TextureHandle,
    /// Linear sampler
    pub default_sampler: SamplerHandle,
    /// 16-bit index buffer covering `quad_capacity` quads
    pub quad_index_buffer: BufferHandle,
    /// Quads addressable through `quad_index_buffer`
    pub quad_capacity: u32,
    /// Layout of sprite vertices
    pub sprite_vertex_declaration: VertexDeclarationHandle,
}

impl DefaultResources {
    /// Index width of the quad index buffer
    pub const QUAD_INDEX_TYPE: IndexType = IndexType::U16;

    /// Create the resources and stage the quad indices on `frame`
    pub fn create(frame: &mut RenderFrame<'_>, config: &RendererConfig) -> RenderResult<Self> {
        let quad_capacity = config.sprite_chain.max_sprites_per_buffer;
        let indices = quad_indices(quad_capacity);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

        let device = frame.device();
        let white_texture = device.create_texture(&TextureInfo::new_2d(1, 1))?;
        let default_sampler = device.create_sampler(&SamplerInfo::default())?;
        let quad_index_buffer = device.create_buffer(&BufferInfo::new(BufferType::Index, index_bytes.len() as u64))?;
        let sprite_vertex_declaration = device.create_vertex_declaration(&VertexDeclaration::xyz_color_uv())?;

        frame.upload(index_bytes, RenderBufferView::whole(quad_index_buffer, index_bytes.len() as u64));
        log::debug!("Created default resources ({} quad indices)", indices.len());

        Ok(Self {
            white_texture,
            default_sampler,
            quad_index_buffer,
            quad_capacity,
            sprite_vertex_declaration,
        })
    }

    /// Hand every resource to the frame's deferred release
    pub fn release(self, frame: &mut RenderFrame<'_>) {
        frame.push_for_release(GpuResource::Texture(self.white_texture));
        frame.push_for_release(GpuResource::Sampler(self.default_sampler));
        frame.push_for_release(GpuResource::Buffer(self.quad_index_buffer));
        frame.push_for_release(GpuResource::VertexDeclaration(self.sprite_vertex_declaration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::HeadlessDevice;
    use crate::render::frame::FrameScheduler;

    #[test]
    fn test_quad_indices_layout() {
        assert_eq!(quad_indices(2), vec![0, 2, 1, 1, 2, 3, 4, 6, 5, 5, 6, 7]);
        assert!(quad_indices(0).is_empty());
    }

    #[test]
    fn test_create_stages_index_upload() {
        let config = RendererConfig::default().with_max_sprites_per_buffer(16);
        let mut device = HeadlessDevice::new();
        let mut scheduler = FrameScheduler::new(&config);

        let mut frame = scheduler.begin_frame(&mut device).unwrap();
        let defaults = DefaultResources::create(&mut frame, &config).unwrap();
        assert_eq!(defaults.quad_capacity, 16);
        assert_eq!(frame.pending_transfers().len(), 1);
        assert_eq!(frame.upload_pool().used_bytes(), 16 * 6 * 2);

        defaults.release(&mut frame);
        let token = frame.submit();
        assert_eq!(scheduler.complete(token, &mut device), 4);
        assert!(!device.contains_buffer(defaults.quad_index_buffer));
    }
}
