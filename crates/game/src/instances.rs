use flyby_common::Random;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned box the instances are scattered in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::cube(1500.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("bounds on {axis} are empty: max {max} must be greater than min {min}")]
pub struct BoundsError {
    pub axis: char,
    pub min: f32,
    pub max: f32,
}

impl Bounds {
    /// `[-half, half]` on every axis.
    pub fn cube(half: f32) -> Self {
        Self {
            min: Vec3::splat(-half),
            max: Vec3::splat(half),
        }
    }

    pub fn validate(&self) -> Result<(), BoundsError> {
        for (axis, min, max) in [
            ('x', self.min.x, self.max.x),
            ('y', self.min.y, self.max.y),
            ('z', self.min.z, self.max.z),
        ] {
            if !(max > min) {
                return Err(BoundsError { axis, min, max });
            }
        }
        Ok(())
    }
}

/// Scatter `amount` model matrices uniformly inside `bounds`.
///
/// Each matrix is `Rx · Ry · Rz · T`, so the translation is applied in the
/// rotated frame. Rotations are zero unless `randomize_rotation` is set.
pub fn create_instance_locations(
    amount: usize,
    bounds: &Bounds,
    rng: &mut Random,
    randomize_rotation: bool,
) -> Result<Vec<Mat4>, BoundsError> {
    bounds.validate()?;

    let locations = (0..amount)
        .map(|_| {
            let position = Vec3::new(
                rng.next(bounds.min.x, bounds.max.x),
                rng.next(bounds.min.y, bounds.max.y),
                rng.next(bounds.min.z, bounds.max.z),
            );
            let angles = if randomize_rotation {
                Vec3::new(
                    rng.next(0.0f32, 360.0),
                    rng.next(0.0f32, 360.0),
                    rng.next(0.0f32, 360.0),
                )
            } else {
                Vec3::ZERO
            };
            Mat4::from_rotation_x(angles.x.to_radians())
                * Mat4::from_rotation_y(angles.y.to_radians())
                * Mat4::from_rotation_z(angles.z.to_radians())
                * Mat4::from_translation(position)
        })
        .collect();
    Ok(locations)
}
