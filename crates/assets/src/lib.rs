//! Asset pipeline: model import, mesh post-processing and texture loading.
//!
//! Parsing is delegated to a [`SceneImporter`], image decoding to an
//! [`ImageDecoder`]. The [`ModelLoader`] turns an imported scene into
//! registered [`flyby_scene::Model`]s.
//!
//! # Invariants
//! - A model is registered only after every node of its scene was walked.
//! - A failed import registers nothing.
//! - Texture failures are logged per texture and never fail the load.

pub mod image;
pub mod import;
pub mod loader;
pub mod obj;
pub mod postprocess;

pub use crate::image::{DecodeError, ImageDecoder, ImageFileDecoder};
pub use import::{
    ImportError, ImportFlags, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
    SceneImporter,
};
pub use loader::ModelLoader;
pub use obj::ObjImporter;

use std::path::PathBuf;

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("import error: {0}")]
    Import(#[from] ImportError),
    #[error("incomplete scene: {}", .0.display())]
    Incomplete(PathBuf),
    #[error("image error: {0}")]
    Decode(#[from] DecodeError),
}
