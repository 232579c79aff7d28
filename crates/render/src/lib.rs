//! Rendering adapter: a renderer-agnostic graphics API and the code that
//! drives it.
//!
//! # Invariants
//! - The renderer reads scene state; it never edits model transforms.
//! - Camera matrices are recomputed only when their inputs change.
//! - Draw-time failures are logged and skipped, never propagated.
//!
//! Backends implement [`GraphicsApi`]. [`RecordingApi`] records every call
//! and serves as the headless backend for tests and the CLI; the wgpu backend
//! lives in `flyby-render-wgpu`.

pub mod api;
pub mod camera;
pub mod draw;
pub mod headless;
pub mod shaders;
pub mod textures;
pub mod uniforms;
pub mod upload;

pub use api::{
    BufferTarget, GraphicsApi, ImageData, ProgramSource, RenderError, RenderSettings, ShaderStage,
    Topology,
};
pub use camera::{Camera, FollowCamera, FreeCamera};
pub use draw::Renderer;
pub use headless::{Command, RecordingApi};
pub use textures::{TextureInfo, TextureRegistry};
pub use uniforms::{UniformDecl, UniformKind, UniformLayout, UniformLocation, UniformValue};
pub use upload::{InstanceBuffer, setup_mesh, setup_model};
