//! Shader binding contents
//!
//! A shader binding is allocated from one set of a pipeline layout and then
//! filled with a list of entries, each pairing a binding index with the
//! resource bound there.

use super::{RenderBufferView, SamplerHandle, TextureHandle};

/// Resource bound to a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderBindingContent {
    /// A uniform buffer range
    UniformBuffer(RenderBufferView),
    /// A storage buffer range
    StorageBuffer(RenderBufferView),
    /// A texture sampled through a sampler
    Texture {
        /// Bound texture
        texture: TextureHandle,
        /// Sampler used to read it
        sampler: SamplerHandle,
    },
}

/// A slot assignment inside a shader binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderBindingEntry {
    /// Binding index inside the set
    pub binding_index: u32,
    /// Bound resource
    pub content: ShaderBindingContent,
}

impl ShaderBindingEntry {
    /// Bind a uniform buffer range
    pub const fn uniform_buffer(binding_index: u32, view: RenderBufferView) -> Self {
        Self {
            binding_index,
            content: ShaderBindingContent::UniformBuffer(view),
        }
    }

    /// Bind a sampled texture
    pub const fn texture(binding_index: u32, texture: TextureHandle, sampler: SamplerHandle) -> Self {
        Self {
            binding_index,
            content: ShaderBindingContent::Texture { texture, sampler },
        }
    }
}
