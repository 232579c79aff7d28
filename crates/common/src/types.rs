use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Sequential identifier of a model in the scene registry.
///
/// Ids are assigned in registration order starting at zero and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub u32);

impl ModelId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a linked shader program owned by a graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Handle to a GPU texture owned by a graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a GPU buffer (vertex, index or storage) owned by a graphics backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle to a vertex array: a vertex buffer, an index buffer and an attribute layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

/// Euler rotation in degrees.
///
/// `angle_x` is pitch, `angle_y` is yaw and `angle_z` is roll. Equality is exact
/// float equality; caches compare rotations with `==` to decide whether to recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub angle_x: f32,
    pub angle_y: f32,
    pub angle_z: f32,
}

impl Rotation {
    pub const ZERO: Self = Self {
        angle_x: 0.0,
        angle_y: 0.0,
        angle_z: 0.0,
    };

    pub fn new(angle_x: f32, angle_y: f32, angle_z: f32) -> Self {
        Self {
            angle_x,
            angle_y,
            angle_z,
        }
    }

    /// The three angles converted to radians, as (x, y, z).
    pub fn to_radians(self) -> Vec3 {
        Vec3::new(
            self.angle_x.to_radians(),
            self.angle_y.to_radians(),
            self.angle_z.to_radians(),
        )
    }

    pub fn as_array(self) -> [f32; 3] {
        [self.angle_x, self.angle_y, self.angle_z]
    }

    pub fn from_array(angles: [f32; 3]) -> Self {
        Self::new(angles[0], angles[1], angles[2])
    }
}
