use crate::mesh::Mesh;
use flyby_common::{ModelId, ProgramId, Rotation};
use glam::{Mat4, Quat, Vec3};
use std::path::{Path, PathBuf};

/// A scene entity: a transform, a shader and an ordered list of meshes.
///
/// The orientation basis (forward/up/right) is cached. It is refreshed only by
/// [`Model::update_orientation`], which callers run once per simulation step
/// before reading the vectors.
#[derive(Debug, Clone)]
pub struct Model {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Rotation,
    /// Program used when drawing this model.
    pub shader: Option<ProgramId>,
    id: ModelId,
    source: PathBuf,
    orientation: Orientation,
    meshes: Vec<Mesh>,
}

#[derive(Debug, Clone, Copy)]
struct Orientation {
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    last_rotation: Rotation,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            forward: Vec3::Z,
            up: Vec3::Y,
            right: Vec3::X,
            last_rotation: Rotation::ZERO,
        }
    }
}

impl Model {
    /// A procedural model built from explicit meshes.
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Rotation::ZERO,
            shader: None,
            id: ModelId(0),
            source: PathBuf::new(),
            orientation: Orientation::default(),
            meshes,
        }
    }

    /// A model whose meshes were imported from `path`.
    pub fn from_file(path: impl Into<PathBuf>, meshes: Vec<Mesh>) -> Self {
        Self {
            source: path.into(),
            ..Self::new(meshes)
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ModelId) {
        self.id = id;
    }

    /// File the model was imported from; empty for procedural models.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Mutable access for GPU setup. Geometry itself has no mutators.
    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Rebuild forward/up/right if `rotation` changed since the last call.
    ///
    /// The orientation is a single quaternion composed from the Euler angles
    /// with x applied first, then y, then z.
    pub fn update_orientation(&mut self) {
        if self.rotation == self.orientation.last_rotation {
            return;
        }

        let radians = self.rotation.to_radians();
        let quat = Quat::from_rotation_z(radians.z)
            * Quat::from_rotation_y(radians.y)
            * Quat::from_rotation_x(radians.x);

        self.orientation.forward = quat * Vec3::Z;
        self.orientation.up = quat * Vec3::Y;
        self.orientation.right = quat * Vec3::X;
        self.orientation.last_rotation = self.rotation;
    }

    /// Forward vector as of the last [`Model::update_orientation`].
    pub fn forward(&self) -> Vec3 {
        self.orientation.forward
    }

    /// Up vector as of the last [`Model::update_orientation`].
    pub fn up(&self) -> Vec3 {
        self.orientation.up
    }

    /// Right vector as of the last [`Model::update_orientation`].
    pub fn right(&self) -> Vec3 {
        self.orientation.right
    }

    /// World transform `T · Ry · Rz · Rx · S`.
    pub fn model_matrix(&self) -> Mat4 {
        let radians = self.rotation.to_radians();
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(radians.y)
            * Mat4::from_rotation_z(radians.z)
            * Mat4::from_rotation_x(radians.x)
            * Mat4::from_scale(self.scale)
    }
}
