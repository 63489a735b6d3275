//! # Render Queue Core
//!
//! Turns a frame's worth of heterogeneous renderable elements into a minimal,
//! backend-agnostic stream of bind and draw commands.
//!
//! ## Architecture
//!
//! - **RenderQueueRegistry**: de-duplicates pipelines, buffers, vertex layouts and
//!   layers into dense indices used for sorting
//! - **RenderElement**: one drawable unit (submesh or sprite chain) for the frame
//! - **RenderQueue**: ordered (element, render state) pairs, split into same-kind batches
//! - **ElementRenderer**: per-kind Prepare / Render / Reset pipeline stage
//! - **CommandBufferBuilder**: capability trait implemented by each backend
//! - **FrameScheduler**: frame tokens, upload pools and deferred release
//!
//! ## Per-frame flow
//!
//! ```text
//! renderables ─► RenderQueue ─► registry + sort ─► Prepare (DrawCalls, ShaderBindings)
//!                                                      │
//!        deferred release ◄── Reset ◄── Render (redundant binds removed) ◄┘
//! ```

pub mod backends;
pub mod command_buffer;
pub mod defaults;
pub mod element;
pub mod element_renderer;
pub mod forward_pass;
pub mod frame;
pub mod instances;
pub mod material;
pub mod registry;
pub mod render_queue;
pub mod renderables;
pub mod resources;
pub mod sprite_chain_renderer;
pub mod submesh_renderer;
pub mod upload_pool;

pub use command_buffer::CommandBufferBuilder;
pub use defaults::DefaultResources;
pub use element::{ElementKind, RenderElement, RenderSpriteChain, RenderStates, RenderSubmesh, SpriteVertex, SubmeshGeometry};
pub use element_renderer::{DrawCall, ElementRenderer, ElementRendererData, ElementRendererRegistry};
pub use forward_pass::{ForwardPass, FrameStats};
pub use frame::{FrameScheduler, FrameToken, RenderFrame};
pub use instances::{SkeletonInstance, ViewerInstance, WorldInstance};
pub use material::{EngineShaderBinding, Material, MaterialInstance};
pub use registry::RenderQueueRegistry;
pub use render_queue::{ElementId, ElementRef, RenderQueue};
pub use sprite_chain_renderer::SpriteChainRenderer;
pub use submesh_renderer::SubmeshRenderer;

/// Errors that can occur in the rendering system
///
/// Only recoverable conditions are reported here. Contract violations, such
/// as fetching an index for an unregistered resource or rendering a batch
/// that was never prepared, panic instead.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Resource creation or management failed
    ///
    /// Occurs when GPU resources (buffers, textures, pipelines, shader bindings)
    /// cannot be created, typically due to invalid parameters or memory constraints.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// A handle did not refer to a live resource
    #[error("Invalid {kind} handle")]
    InvalidHandle {
        /// Resource kind of the handle
        kind: &'static str,
    },

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),

    /// The queue holds elements of a kind nobody renders
    #[error("No element renderer registered for {0:?} elements")]
    MissingElementRenderer(ElementKind),

    /// Every frame slot is still owned by a frame the GPU has not finished
    #[error("All {limit} frames in flight are still pending on the GPU")]
    FramesInFlightExhausted {
        /// Configured number of frames in flight
        limit: usize,
    },
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
