//! Developer tooling: model inspector, frame statistics and log capture.
//!
//! Everything here produces plain data; the desktop app draws it with egui
//! and the CLI prints it.
//!
//! # Invariants
//! - Inspection never changes a model.
//! - The log buffer keeps the oldest messages up to its capacity.

pub mod inspector;
pub mod logs;
pub mod stats;

pub use inspector::{InspectorState, MeshInfo, ModelInfo, ModelInspector, SceneSummary};
pub use logs::{LogBuffer, LogCaptureLayer, LogEntry};
pub use stats::{FpsCounter, FrameStats};
