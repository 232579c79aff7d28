//! Shared types and utilities for the flyby sandbox.
//!
//! Handles are plain integers owned by whichever backend created them; this
//! crate only gives them distinct types.

pub mod random;
pub mod timer;
pub mod types;

pub use random::Random;
pub use timer::FrameTimer;
pub use types::{BufferId, ModelId, ProgramId, Rotation, TextureId, VertexArrayId};
