use flyby_common::ModelId;
use flyby_scene::{Model, Scene};
use glam::Vec3;
use std::collections::HashSet;
use std::fmt;

/// Model inspector for developer tooling.
///
/// Read-only queries against the scene for the debug UI and the CLI.
pub struct ModelInspector;

impl ModelInspector {
    /// Totals over every registered model.
    pub fn summary(scene: &Scene) -> SceneSummary {
        let mut summary = SceneSummary {
            models: scene.len(),
            ..SceneSummary::default()
        };
        for mesh in scene.iter().flat_map(Model::meshes) {
            summary.meshes += 1;
            summary.vertices += mesh.vertex_count();
            summary.triangles += mesh.index_count() / 3;
        }
        summary
    }

    pub fn inspect(model: &Model) -> ModelInfo {
        ModelInfo {
            id: model.id(),
            source: model.source().display().to_string(),
            position: model.position.to_array(),
            rotation: model.rotation.as_array(),
            scale: model.scale.to_array(),
            up: model.up().to_array(),
            forward: model.forward().to_array(),
            right: model.right().to_array(),
            meshes: model
                .meshes()
                .iter()
                .map(|mesh| MeshInfo {
                    name: mesh.name().to_string(),
                    vertices: mesh.vertex_count(),
                    indices: mesh.index_count(),
                    textures: mesh.textures().len(),
                    uploaded: mesh.gpu().is_some(),
                })
                .collect(),
        }
    }

    pub fn inspect_id(scene: &Scene, id: ModelId) -> Option<ModelInfo> {
        scene.get(id).map(Self::inspect)
    }

    /// Orientation rows for the inspector table: up, forward, right.
    pub fn basis(model: &Model) -> [(&'static str, Vec3); 3] {
        [
            ("up", model.up()),
            ("forward", model.forward()),
            ("right", model.right()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub models: usize,
    pub meshes: usize,
    pub vertices: usize,
    pub triangles: usize,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scene: models={} meshes={} vertices={} triangles={}",
            self.models, self.meshes, self.vertices, self.triangles
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: ModelId,
    pub source: String,
    pub position: [f32; 3],
    /// Degrees.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub up: [f32; 3],
    pub forward: [f32; 3],
    pub right: [f32; 3],
    pub meshes: Vec<MeshInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshInfo {
    pub name: String,
    pub vertices: usize,
    pub indices: usize,
    pub textures: usize,
    pub uploaded: bool,
}

fn vec_row(f: &mut fmt::Formatter<'_>, name: &str, v: [f32; 3]) -> fmt::Result {
    writeln!(f, "  {name:<8} {:>8.1} {:>8.1} {:>8.1}", v[0], v[1], v[2])
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = if self.source.is_empty() {
            "<procedural>"
        } else {
            &self.source
        };
        writeln!(f, "Model {} {}", self.id.0, source)?;
        writeln!(f, "  {:<8} {:>8} {:>8} {:>8}", "", "x", "y", "z")?;
        vec_row(f, "position", self.position)?;
        vec_row(f, "rotation", self.rotation)?;
        vec_row(f, "scale", self.scale)?;
        vec_row(f, "up", self.up)?;
        vec_row(f, "forward", self.forward)?;
        vec_row(f, "right", self.right)?;
        writeln!(f, "  meshes: {} total", self.meshes.len())?;
        for mesh in &self.meshes {
            writeln!(
                f,
                "    {:<24} verts={:<8} indices={:<8} textures={}",
                mesh.name, mesh.vertices, mesh.indices, mesh.textures
            )?;
        }
        Ok(())
    }
}

/// Which inspector windows are open. Every model starts visible.
#[derive(Debug, Clone, Default)]
pub struct InspectorState {
    hidden: HashSet<ModelId>,
}

impl InspectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, id: ModelId) -> bool {
        !self.hidden.contains(&id)
    }

    pub fn set_visible(&mut self, id: ModelId, visible: bool) {
        if visible {
            self.hidden.remove(&id);
        } else {
            self.hidden.insert(id);
        }
    }

    pub fn toggle(&mut self, id: ModelId) {
        let visible = self.is_visible(id);
        self.set_visible(id, !visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flyby_scene::primitives;

    fn scene() -> (Scene, ModelId) {
        let mut scene = Scene::new();
        let id = scene.create_model(vec![primitives::cube(1.0), primitives::cube(2.0)]);
        (scene, id)
    }

    #[test]
    fn summary_empty_scene() {
        let summary = ModelInspector::summary(&Scene::new());
        assert_eq!(summary, SceneSummary::default());
    }

    #[test]
    fn summary_counts_meshes() {
        let (scene, _) = scene();
        let summary = ModelInspector::summary(&scene);
        assert_eq!(summary.models, 1);
        assert_eq!(summary.meshes, 2);
        assert_eq!(summary.vertices, 48);
        assert_eq!(summary.triangles, 24);
        assert!(summary.to_string().contains("triangles=24"));
    }

    #[test]
    fn inspect_reports_transform_and_meshes() {
        let (mut scene, id) = scene();
        let model = scene.get_mut(id).unwrap();
        model.position = Vec3::new(1.0, 2.0, 3.0);
        model.rotation.angle_y = 90.0;
        model.update_orientation();

        let info = ModelInspector::inspect_id(&scene, id).unwrap();
        assert_eq!(info.position, [1.0, 2.0, 3.0]);
        assert_eq!(info.rotation, [0.0, 90.0, 0.0]);
        assert!((info.forward[0] - 1.0).abs() < 1e-6);
        assert_eq!(info.meshes.len(), 2);
        assert!(!info.meshes[0].uploaded);
        assert_eq!(info.meshes[1].indices, 36);
    }

    #[test]
    fn inspect_unknown_model() {
        let (scene, _) = scene();
        assert!(ModelInspector::inspect_id(&scene, ModelId(9)).is_none());
    }

    #[test]
    fn display_lists_meshes() {
        let (scene, id) = scene();
        let text = ModelInspector::inspect_id(&scene, id).unwrap().to_string();
        assert!(text.starts_with("Model 0 <procedural>"));
        assert!(text.contains("meshes: 2 total"));
        assert!(text.contains("forward"));
    }

    #[test]
    fn basis_rows_follow_orientation() {
        let (scene, id) = scene();
        let rows = ModelInspector::basis(scene.get(id).unwrap());
        assert_eq!(rows[0], ("up", Vec3::Y));
        assert_eq!(rows[1], ("forward", Vec3::Z));
    }

    #[test]
    fn visibility_defaults_on() {
        let mut state = InspectorState::new();
        assert!(state.is_visible(ModelId(3)));
        state.toggle(ModelId(3));
        assert!(!state.is_visible(ModelId(3)));
        state.set_visible(ModelId(3), true);
        assert!(state.is_visible(ModelId(3)));
    }
}
