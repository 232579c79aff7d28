//! Scene registry: models, meshes and textures.
//!
//! # Invariants
//! - Models are registered append-only; a `ModelId` is the model's index.
//! - Mesh vertex and index data never change after construction.
//! - Orientation vectors only change through `Model::update_orientation`.

pub mod mesh;
pub mod model;
pub mod primitives;
pub mod scene;

pub use mesh::{
    Mesh, MeshBuilder, MeshHandles, Texture, TextureKind, VERTEX_LAYOUT, VERTEX_STRIDE, Vertex,
    VertexAttribute,
};
pub use model::Model;
pub use scene::Scene;
