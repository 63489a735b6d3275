//! Backend implementations for the render module
//!
//! The render core only talks to backends through [`RenderDevice`] and
//! [`CommandBufferBuilder`]. The headless backend implements both on the CPU:
//! it validates handles and shader binding contents and records the command
//! stream, which is what tests and tools inspect.
//!
//! [`RenderDevice`]: crate::render::resources::RenderDevice
//! [`CommandBufferBuilder`]: crate::render::CommandBufferBuilder

mod headless;
mod recording;

pub use headless::HeadlessDevice;
pub use recording::{RecordedCommand, RecordingCommandBuffer};
