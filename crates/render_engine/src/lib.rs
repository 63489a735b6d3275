//! # Render Engine
//!
//! Backend-agnostic render queue core: collects a frame's drawable elements,
//! sorts and batches them, builds shader bindings only when their inputs
//! change and emits a bind/draw command stream with redundant binds removed.
//!
//! ## Features
//!
//! - **Render Queue**: sorted, same-kind batches of submeshes and sprite chains
//! - **Element Renderers**: per-kind Prepare / Render / Reset with sticky batching state
//! - **Frame Scheduling**: frames in flight, upload pools and deferred resource release
//! - **Headless Backend**: CPU-only device and recording command buffer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let mut device = HeadlessDevice::new();
//!     let mut scheduler = FrameScheduler::new(&config);
//!
//!     let mut frame = scheduler.begin_frame(&mut device)?;
//!     let defaults = DefaultResources::create(&mut frame, &config)?;
//!     let viewer = ViewerInstance::create(frame.device(), Vec2::new(800.0, 600.0))?;
//!
//!     let mut pass = ForwardPass::new(ElementRendererRegistry::with_default_renderers(defaults, &config), &config);
//!     let mut queue = RenderQueue::new();
//!     let mut commands = RecordingCommandBuffer::new();
//!
//!     pass.prepare(&viewer, &mut queue, &mut frame)?;
//!     frame.flush_transfers(&mut commands);
//!     pass.render(&viewer, &queue, &mut commands);
//!     pass.reset(&mut frame);
//!     frame.submit();
//!
//!     scheduler.complete_all(&mut device);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RendererConfig},
        foundation::math::{BoundingBox, Color, Mat4, Rectf, Recti, Vec2, Vec3},
        render::{
            backends::{HeadlessDevice, RecordingCommandBuffer},
            renderables::{ElementData, InstancedRenderable, Model, SlicedSprite, Sprite, TextSprite},
            resources::RenderDevice,
            CommandBufferBuilder, DefaultResources, ElementRendererRegistry, ForwardPass, FrameScheduler,
            FrameStats, Material, MaterialInstance, RenderElement, RenderError, RenderQueue, RenderResult,
            RenderStates, SkeletonInstance, ViewerInstance, WorldInstance,
        },
    };
}
