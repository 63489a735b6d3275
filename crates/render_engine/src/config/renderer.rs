//! # Renderer Configuration
//!
//! Tuning knobs for the render-queue core: how many frames may be in flight,
//! how upload memory is carved up, and how sprite chains are packed into
//! vertex buffers.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Largest sprite capacity a 16-bit quad index buffer can address
const MAX_SPRITES_U16_INDICES: u32 = (u16::MAX as u32 + 1) / 4;

/// Sprite chain batching configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteChainConfig {
    /// Number of sprites a pooled vertex buffer holds; also the size of the shared quad index buffer
    pub max_sprites_per_buffer: u32,
}

impl Default for SpriteChainConfig {
    fn default() -> Self {
        Self {
            max_sprites_per_buffer: 2048,
        }
    }
}

/// # Renderer Configuration
///
/// Configuration of the frame scheduler, the upload pools and the element
/// renderers. Every field has a default, so partial files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Maximum frames in flight
    pub frames_in_flight: usize,
    /// Size in bytes of one upload pool block
    pub upload_block_size: u64,
    /// Draw calls reserved up front in each element renderer's per-frame data
    pub initial_draw_call_capacity: usize,
    /// Whether the forward pass sorts the render queue before preparing it
    pub sort_render_queue: bool,
    /// Whether debug regions are emitted around each batch
    pub debug_regions: bool,
    /// Sprite chain renderer settings
    pub sprite_chain: SpriteChainConfig,
}

impl RendererConfig {
    /// Set maximum frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the upload block size in bytes
    pub fn with_upload_block_size(mut self, size: u64) -> Self {
        self.upload_block_size = size;
        self
    }

    /// Enable or disable render queue sorting
    pub fn with_sorting(mut self, enabled: bool) -> Self {
        self.sort_render_queue = enabled;
        self
    }

    /// Enable or disable debug regions
    pub fn with_debug_regions(mut self, enabled: bool) -> Self {
        self.debug_regions = enabled;
        self
    }

    /// Set the sprite capacity of pooled sprite vertex buffers
    pub fn with_max_sprites_per_buffer(mut self, sprites: u32) -> Self {
        self.sprite_chain.max_sprites_per_buffer = sprites;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("frames_in_flight must be at least 1".to_string()));
        }

        if self.frames_in_flight > 8 {
            return Err(ConfigError::Invalid(format!(
                "frames_in_flight should not exceed 8, got {}",
                self.frames_in_flight
            )));
        }

        if self.upload_block_size == 0 {
            return Err(ConfigError::Invalid("upload_block_size cannot be zero".to_string()));
        }

        let sprites = self.sprite_chain.max_sprites_per_buffer;
        if sprites == 0 || sprites > MAX_SPRITES_U16_INDICES {
            return Err(ConfigError::Invalid(format!(
                "sprite_chain.max_sprites_per_buffer must be in 1..={MAX_SPRITES_U16_INDICES}, got {sprites}"
            )));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            upload_block_size: 256 * 1024,
            initial_draw_call_capacity: 256,
            sort_render_queue: true,
            debug_regions: cfg!(debug_assertions),
            sprite_chain: SpriteChainConfig::default(),
        }
    }
}

impl Config for RendererConfig {}
