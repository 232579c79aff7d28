//! wgpu backend for the flyby graphics API.
//!
//! Calls made through [`flyby_render::GraphicsApi`] are recorded per frame
//! and replayed in a single render pass by [`WgpuApi::submit`].
//!
//! # Invariants
//! - Every recorded draw owns a snapshot of its program's uniform block.
//! - GPU objects are only touched from the thread that owns the device.
//! - Validation failures are logged; they never abort the frame loop.

mod gpu;
mod pipeline;

pub use gpu::WgpuApi;
pub use pipeline::DEPTH_FORMAT;
