use crate::api::{GraphicsApi, RenderSettings};
use crate::camera::Camera;
use crate::textures::bind_mesh_textures;
use crate::uniforms::{UniformValue, set_uniform};
use crate::upload::InstanceBuffer;
use flyby_common::ProgramId;
use flyby_scene::{Mesh, Model, Scene};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Single,
    Instanced(u32),
}

/// Issues the draw calls for scene models.
///
/// The renderer reads models and the camera; it never changes a model.
#[derive(Debug, Clone)]
pub struct Renderer {
    settings: RenderSettings,
    aspect: f32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            aspect: 1.0,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RenderSettings) {
        self.settings = settings;
    }

    /// Width over height of the current target.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Draw every mesh of `model` with its own model matrix.
    pub fn draw(
        &self,
        api: &mut dyn GraphicsApi,
        camera: &mut Camera,
        scene: &Scene,
        model: &Model,
    ) {
        let Some(program) = self.begin(api, camera, scene, model) else {
            return;
        };
        set_uniform(api, program, "model", UniformValue::Mat4(model.model_matrix()));

        for mesh in model.meshes() {
            self.draw_mesh(api, program, mesh, DrawKind::Single);
        }
    }

    /// Draw `count` copies of every mesh of `model`, one call per mesh, with
    /// per-instance matrices read from `instances`.
    pub fn draw_instanced(
        &self,
        api: &mut dyn GraphicsApi,
        camera: &mut Camera,
        scene: &Scene,
        model: &Model,
        instances: &InstanceBuffer,
        count: u32,
    ) {
        let Some(program) = self.begin(api, camera, scene, model) else {
            return;
        };
        if !api.is_buffer(instances.buffer) {
            error!(buffer = instances.buffer.0, "unknown buffer");
            return;
        }
        api.bind_buffer_base(instances.binding, instances.buffer);

        for mesh in model.meshes() {
            self.draw_mesh(api, program, mesh, DrawKind::Instanced(count));
        }
    }

    /// Select the model's program and set the camera matrices.
    fn begin(
        &self,
        api: &mut dyn GraphicsApi,
        camera: &mut Camera,
        scene: &Scene,
        model: &Model,
    ) -> Option<ProgramId> {
        let Some(program) = model.shader else {
            warn!(model = model.id().0, "model has no shader");
            return None;
        };
        if !api.is_program(program) {
            error!(program = program.0, "unknown shader id");
            return None;
        }
        api.use_program(program);
        set_uniform(
            api,
            program,
            "projection",
            UniformValue::Mat4(camera.projection(self.aspect)),
        );
        set_uniform(api, program, "view", UniformValue::Mat4(camera.view(scene)));
        Some(program)
    }

    fn draw_mesh(
        &self,
        api: &mut dyn GraphicsApi,
        program: ProgramId,
        mesh: &Mesh,
        kind: DrawKind,
    ) {
        let Some(handles) = mesh.gpu() else {
            warn!(mesh = mesh.name(), "mesh drawn before setup");
            return;
        };
        api.bind_vertex_array(Some(handles.vao));
        bind_mesh_textures(api, program, mesh.textures());
        let topology = self.settings.topology;
        let index_count = mesh.index_count() as u32;
        match kind {
            DrawKind::Single => api.draw_elements(topology, index_count),
            DrawKind::Instanced(instances) => {
                api.draw_elements_instanced(topology, index_count, instances)
            }
        }
        api.bind_vertex_array(None);
        api.active_texture(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ImageData, Topology};
    use crate::camera::{FollowCamera, FreeCamera};
    use crate::headless::{Command, RecordingApi};
    use crate::shaders;
    use crate::upload::setup_model;
    use flyby_common::{ModelId, TextureId};
    use flyby_scene::{Texture, TextureKind, primitives};
    use glam::{Mat4, Vec3};

    fn scene_with(api: &mut RecordingApi, meshes: Vec<Mesh>, program: ProgramId) -> (Scene, ModelId) {
        let mut scene = Scene::new();
        let mut model = Model::new(meshes);
        setup_model(api, &mut model);
        model.shader = Some(program);
        let id = scene.insert(model);
        (scene, id)
    }

    #[test]
    fn draw_sets_matrices_and_draws_each_mesh() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let (mut scene, id) = scene_with(
            &mut api,
            vec![primitives::cube(1.0), primitives::cube(2.0)],
            program,
        );
        if let Some(model) = scene.get_mut(id) {
            model.position = Vec3::new(1.0, 0.0, 0.0);
        }
        let mut camera = Camera::Free(FreeCamera::new());
        let renderer = Renderer::new(RenderSettings::default());
        api.take_commands();

        renderer.draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());

        assert_eq!(api.draw_calls(), 2);
        assert_eq!(
            api.uniform(program, "model"),
            Some(UniformValue::Mat4(Mat4::from_translation(Vec3::X)))
        );
        assert!(api.uniform(program, "projection").is_some());
        assert!(api.uniform(program, "view").is_some());
        assert!(api.commands().contains(&Command::DrawElements {
            topology: Topology::Triangles,
            count: 36
        }));
    }

    #[test]
    fn instanced_draw_issues_one_call_per_mesh() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic_instanced()).unwrap();
        let (scene, id) = scene_with(
            &mut api,
            vec![primitives::cube(1.0), primitives::cube(1.0), primitives::cube(1.0)],
            program,
        );
        let instances = InstanceBuffer::upload(&mut api, &vec![Mat4::IDENTITY; 500], 0);
        let mut camera = Camera::Follow(FollowCamera::new(id));
        let renderer = Renderer::default();
        api.take_commands();

        renderer.draw_instanced(
            &mut api,
            &mut camera,
            &scene,
            scene.get(id).unwrap(),
            &instances,
            500,
        );

        assert_eq!(api.instanced_draws(), vec![(36, 500); 3]);
        assert_eq!(api.draw_calls(), 0);
        assert!(api.commands().contains(&Command::BindBufferBase {
            binding: 0,
            buffer: instances.buffer
        }));
    }

    #[test]
    fn configured_topology_is_used() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let (scene, id) = scene_with(&mut api, vec![primitives::cube(1.0)], program);
        let mut camera = Camera::Free(FreeCamera::new());
        let renderer = Renderer::new(RenderSettings {
            topology: Topology::Lines,
        });
        renderer.draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());
        assert!(api.commands().contains(&Command::DrawElements {
            topology: Topology::Lines,
            count: 36
        }));
    }

    #[test]
    fn invalid_texture_does_not_stop_drawing() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::textured()).unwrap();
        let good = api.create_texture("good", &ImageData::solid(1, 1, [255; 4]));
        let broken = Mesh::builder("broken")
            .vertices(primitives::cube(1.0).vertices().iter().copied())
            .indices(primitives::cube(1.0).indices().iter().copied())
            .texture(Texture::new(TextureId(404), TextureKind::Diffuse))
            .build();
        let fine = Mesh::builder("fine")
            .vertices(primitives::cube(1.0).vertices().iter().copied())
            .indices(primitives::cube(1.0).indices().iter().copied())
            .texture(Texture::new(good, TextureKind::Diffuse))
            .build();
        let (scene, id) = scene_with(&mut api, vec![broken, fine], program);
        let mut camera = Camera::Free(FreeCamera::new());
        let renderer = Renderer::default();

        renderer.draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());
        renderer.draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());

        assert_eq!(api.draw_calls(), 4);
        assert_eq!(api.texture_on_unit(0), Some(good));
    }

    #[test]
    fn mesh_without_setup_is_skipped() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let mut scene = Scene::new();
        let mut model = Model::new(vec![primitives::cube(1.0)]);
        model.shader = Some(program);
        let id = scene.insert(model);
        let mut camera = Camera::Free(FreeCamera::new());

        Renderer::default().draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());
        assert_eq!(api.draw_calls(), 0);
    }

    #[test]
    fn model_without_shader_is_skipped() {
        let mut api = RecordingApi::new();
        let mut scene = Scene::new();
        let mut model = Model::new(vec![primitives::cube(1.0)]);
        setup_model(&mut api, &mut model);
        let id = scene.insert(model);
        let mut camera = Camera::Free(FreeCamera::new());
        api.take_commands();

        Renderer::default().draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());
        assert!(api.commands().is_empty());
    }

    #[test]
    fn camera_cache_survives_repeated_draws() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let (scene, id) = scene_with(&mut api, vec![primitives::cube(1.0)], program);
        let mut camera = Camera::Free(FreeCamera::new());
        let mut renderer = Renderer::default();
        renderer.set_aspect(16.0 / 9.0);
        for _ in 0..5 {
            renderer.draw(&mut api, &mut camera, &scene, scene.get(id).unwrap());
        }
        assert_eq!(camera.projection_updates(), 1);
        assert_eq!(camera.view_updates(), 1);
    }
}
