use crate::instances::{Bounds, BoundsError};
use flyby_assets::ImportFlags;
use flyby_render::Topology;
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading a [`GameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid instance bounds: {0}")]
    Bounds(#[from] BoundsError),
    #[error("follow distance must be positive, got {0}")]
    FollowDistance(f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Trail the ship; the keyboard flies the ship.
    #[default]
    Follow,
    /// Fly the camera itself.
    Free,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveTopology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

impl From<PrimitiveTopology> for Topology {
    fn from(topology: PrimitiveTopology) -> Self {
        match topology {
            PrimitiveTopology::Triangles => Topology::Triangles,
            PrimitiveTopology::TriangleStrip => Topology::TriangleStrip,
            PrimitiveTopology::Lines => Topology::Lines,
            PrimitiveTopology::LineStrip => Topology::LineStrip,
            PrimitiveTopology::Points => Topology::Points,
        }
    }
}

/// Everything the sandbox reads at startup. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub ship_model: PathBuf,
    pub cube_model: PathBuf,
    /// Import with smooth instead of per-face normals.
    pub smooth_normals: bool,
    pub instance_count: usize,
    pub instance_bounds: Bounds,
    pub randomize_rotation: bool,
    /// Fixed seed for the instance field; entropy when unset.
    pub seed: Option<u64>,
    pub camera: CameraMode,
    pub follow_distance: f32,
    /// Added to the ship position after loading.
    pub ship_offset: Vec3,
    /// Replace models that fail to load with a unit cube.
    pub fallback_to_primitives: bool,
    /// Colour of the stand-in ship.
    pub fallback_tint: Vec4,
    pub topology: PrimitiveTopology,
    pub clear_color: [f64; 4],
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ship_model: PathBuf::from("assets/models/spaceship3.obj"),
            cube_model: PathBuf::from("assets/models/ico_low.obj"),
            smooth_normals: false,
            instance_count: 150_000,
            instance_bounds: Bounds::cube(1500.0),
            randomize_rotation: false,
            seed: None,
            camera: CameraMode::Follow,
            follow_distance: 10.0,
            ship_offset: Vec3::new(1.0, 0.0, -5.0),
            fallback_to_primitives: true,
            fallback_tint: Vec4::new(0.9, 0.5, 0.2, 1.0),
            topology: PrimitiveTopology::Triangles,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl GameConfig {
    /// Read and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.instance_bounds.validate()?;
        if !(self.follow_distance > 0.0) {
            return Err(ConfigError::FollowDistance(self.follow_distance));
        }
        Ok(())
    }

    pub fn import_flags(&self) -> ImportFlags {
        if self.smooth_normals {
            ImportFlags::SMOOTH
        } else {
            ImportFlags::DEFAULT
        }
    }

    /// Resolve relative model paths against `base`, usually the config file's
    /// directory.
    pub fn rebase(&mut self, base: &Path) {
        for path in [&mut self.ship_model, &mut self.cube_model] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stock_scene() {
        let config = GameConfig::default();
        assert_eq!(config.instance_count, 150_000);
        assert_eq!(config.instance_bounds.min, Vec3::splat(-1500.0));
        assert_eq!(config.camera, CameraMode::Follow);
        assert_eq!(config.import_flags(), ImportFlags::DEFAULT);
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = GameConfig::from_yaml(
            "instance_count: 12\ncamera: free\nsmooth_normals: true\ntopology: lines\n",
        )
        .unwrap();
        assert_eq!(config.instance_count, 12);
        assert_eq!(config.camera, CameraMode::Free);
        assert_eq!(config.import_flags(), ImportFlags::SMOOTH);
        assert_eq!(Topology::from(config.topology), Topology::Lines);
        assert_eq!(config.follow_distance, 10.0);
    }

    #[test]
    fn bounds_are_validated() {
        let err = GameConfig::from_yaml(
            "instance_bounds:\n  min: [0.0, 0.0, 0.0]\n  max: [1.0, -1.0, 1.0]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Bounds(BoundsError { axis: 'y', .. })));
    }

    #[test]
    fn follow_distance_must_be_positive() {
        let err = GameConfig::from_yaml("follow_distance: 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::FollowDistance(_)));
    }

    #[test]
    fn bad_yaml_is_reported() {
        let err = GameConfig::from_yaml("instance_count: many\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn load_from_file_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flyby.yaml");
        let mut original = GameConfig::default();
        original.seed = Some(99);
        std::fs::write(&path, original.to_yaml().unwrap()).unwrap();

        assert_eq!(GameConfig::load(&path).unwrap(), original);
        assert!(matches!(
            GameConfig::load(&dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn rebase_only_touches_relative_paths() {
        let mut config = GameConfig {
            cube_model: PathBuf::from("/abs/cube.obj"),
            ..GameConfig::default()
        };
        config.rebase(Path::new("/game"));
        assert_eq!(
            config.ship_model,
            PathBuf::from("/game/assets/models/spaceship3.obj")
        );
        assert_eq!(config.cube_model, PathBuf::from("/abs/cube.obj"));
    }
}
