use crate::mesh::Mesh;
use crate::model::Model;
use flyby_common::{ModelId, ProgramId};
use tracing::warn;

/// Append-only model registry.
///
/// A model's id is its insertion index, so ids are dense and stable. Models
/// are never removed.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    models: Vec<Model>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model`, assigning it the next sequential id.
    pub fn insert(&mut self, mut model: Model) -> ModelId {
        let id = ModelId(self.models.len() as u32);
        model.set_id(id);
        self.models.push(model);
        id
    }

    /// Build a procedural model from meshes and register it.
    pub fn create_model(&mut self, meshes: Vec<Mesh>) -> ModelId {
        self.insert(Model::new(meshes))
    }

    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.index())
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.models.get_mut(id.index())
    }

    /// Assign the program used to draw `id`. Unknown ids are logged.
    pub fn set_shader(&mut self, id: ModelId, program: ProgramId) {
        match self.get_mut(id) {
            Some(model) => model.shader = Some(program),
            None => warn!(model = id.0, "set_shader on unknown model"),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        self.models.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn ids_are_sequential() {
        let mut scene = Scene::new();
        let a = scene.create_model(Vec::new());
        let b = scene.insert(Model::from_file("ship.obj", Vec::new()));
        assert_eq!(a, ModelId(0));
        assert_eq!(b, ModelId(1));
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.get(b).map(Model::id), Some(b));
    }

    #[test]
    fn unknown_id_lookups() {
        let mut scene = Scene::new();
        assert!(scene.is_empty());
        assert!(scene.get(ModelId(3)).is_none());
        // Logged, not a panic.
        scene.set_shader(ModelId(3), ProgramId(1));
    }

    #[test]
    fn set_shader_on_registered_model() {
        let mut scene = Scene::new();
        let id = scene.create_model(vec![primitives::cube(1.0)]);
        scene.set_shader(id, ProgramId(7));
        assert_eq!(scene.get(id).and_then(|m| m.shader), Some(ProgramId(7)));
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut scene = Scene::new();
        scene.insert(Model::from_file("a.obj", Vec::new()));
        scene.insert(Model::from_file("b.obj", Vec::new()));
        let sources: Vec<_> = scene
            .iter()
            .map(|m| m.source().display().to_string())
            .collect();
        assert_eq!(sources, vec!["a.obj", "b.obj"]);
    }
}
