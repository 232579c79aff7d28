use crate::image::{ImageDecoder, ImageFileDecoder};
use crate::import::{ImportFlags, ImportedMaterial, ImportedMesh, ImportedScene, SceneImporter};
use crate::obj::ObjImporter;
use crate::AssetError;
use flyby_common::ModelId;
use flyby_render::{GraphicsApi, TextureInfo, TextureRegistry};
use flyby_scene::{Mesh, Model, Scene, Texture, TextureKind, Vertex};
use std::path::Path;
use tracing::{error, info, warn};

/// Imports model files and registers them in a [`Scene`].
#[derive(Debug, Clone, Default)]
pub struct ModelLoader<I = ObjImporter, D = ImageFileDecoder> {
    importer: I,
    decoder: D,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<I: SceneImporter, D: ImageDecoder> ModelLoader<I, D> {
    pub fn with(importer: I, decoder: D) -> Self {
        Self { importer, decoder }
    }

    /// Import `path`, build its meshes and register the model.
    ///
    /// Meshes are emitted in depth-first node order and named after the node
    /// that owns them. Nothing is registered when the import fails.
    pub fn load_model(
        &self,
        scene: &mut Scene,
        textures: &mut TextureRegistry,
        api: &mut dyn GraphicsApi,
        path: &Path,
        flags: ImportFlags,
    ) -> Result<ModelId, AssetError> {
        let imported = match self.importer.import(path, flags) {
            Ok(imported) => imported,
            Err(err) => {
                error!(path = %path.display(), error = %err, "model import failed");
                return Err(err.into());
            }
        };
        if imported.incomplete {
            error!(path = %path.display(), "model import produced an incomplete scene");
            return Err(AssetError::Incomplete(path.to_path_buf()));
        }

        let directory = path.parent().unwrap_or(Path::new(""));
        let mut meshes = Vec::with_capacity(imported.meshes.len());
        imported.root.walk(&mut |node| {
            for &index in &node.meshes {
                let Some(source) = imported.meshes.get(index) else {
                    warn!(node = %node.name, index, "node references a missing mesh");
                    continue;
                };
                let material = material_of(&imported, source);
                let mesh_textures =
                    self.load_diffuse_textures(textures, api, directory, &node.name, material);
                meshes.push(build_mesh(&node.name, source, mesh_textures));
            }
        });

        let mesh_count = meshes.len();
        let id = scene.insert(Model::from_file(path, meshes));
        info!(path = %path.display(), model = id.0, meshes = mesh_count, "model loaded");
        Ok(id)
    }

    /// Decode `path` and upload it under `name`.
    pub fn load_texture(
        &self,
        textures: &mut TextureRegistry,
        api: &mut dyn GraphicsApi,
        name: &str,
        path: &Path,
    ) -> Result<TextureInfo, AssetError> {
        let image = self.decoder.decode(path)?;
        Ok(textures.register(api, name, &image))
    }

    fn load_diffuse_textures(
        &self,
        textures: &mut TextureRegistry,
        api: &mut dyn GraphicsApi,
        directory: &Path,
        mesh_name: &str,
        material: Option<&ImportedMaterial>,
    ) -> Vec<Texture> {
        let Some(material) = material else {
            return Vec::new();
        };
        let mut loaded = Vec::new();
        for (i, relative) in material.diffuse_textures.iter().enumerate() {
            let name = match i {
                0 => format!("{mesh_name}_diffuse"),
                _ => format!("{mesh_name}_diffuse_{i}"),
            };
            let path = directory.join(relative);
            if !path.exists() {
                error!(path = %path.display(), "file not found");
                continue;
            }
            match self.load_texture(textures, api, &name, &path) {
                Ok(TextureInfo { id: Some(id), .. }) => {
                    loaded.push(Texture::new(id, TextureKind::Diffuse));
                }
                Ok(_) => error!(name, "failed to load image {name}"),
                Err(err) => error!(name, error = %err, "failed to load image {name}"),
            }
        }
        loaded
    }
}

fn material_of<'a>(scene: &'a ImportedScene, mesh: &ImportedMesh) -> Option<&'a ImportedMaterial> {
    mesh.material.and_then(|index| scene.materials.get(index))
}

fn build_mesh(name: &str, source: &ImportedMesh, textures: Vec<Texture>) -> Mesh {
    let channel3 = |channel: &Option<Vec<[f32; 3]>>, i: usize| {
        channel.as_ref().and_then(|values| values.get(i)).copied()
    };
    let vertices = source.positions.iter().enumerate().map(|(i, &position)| {
        let mut vertex = Vertex {
            position,
            ..Vertex::default()
        };
        if let Some(normal) = channel3(&source.normals, i) {
            vertex.normal = normal;
        }
        if let (Some(tangent), Some(bitangent)) =
            (channel3(&source.tangents, i), channel3(&source.bitangents, i))
        {
            vertex.tangent = tangent;
            vertex.bitangent = bitangent;
        }
        if let Some(color) = channel3(&source.colors, i) {
            vertex.color = color;
        }
        if let Some(uv) = source.uvs.as_ref().and_then(|uvs| uvs.get(i)) {
            vertex.tex_coords = *uv;
        }
        vertex
    });

    textures
        .into_iter()
        .fold(
            Mesh::builder(name)
                .vertices(vertices)
                .indices(source.triangles.iter().flatten().copied()),
            |builder, texture| builder.texture(texture),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DecodeError;
    use crate::import::{ImportError, ImportedNode};
    use flyby_render::{ImageData, RecordingApi};
    use std::cell::Cell;
    use std::fs;
    use std::path::PathBuf;

    const SHIP_OBJ: &str = "\
mtllib ship.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
o hull
usemtl hull
f 1/1 2/2 3/3 4/4
o wing
usemtl wing
f 1/1 2/2 3/3
";

    const SHIP_MTL: &str = "\
newmtl hull
map_Kd hull.png
newmtl wing
map_Kd missing.png
";

    fn write_ship(dir: &Path) -> PathBuf {
        fs::write(dir.join("ship.mtl"), SHIP_MTL).unwrap();
        ::image::RgbaImage::new(2, 2).save(dir.join("hull.png")).unwrap();
        let path = dir.join("ship.obj");
        fs::write(&path, SHIP_OBJ).unwrap();
        path
    }

    #[test]
    fn meshes_follow_node_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ship(dir.path());
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();
        let mut api = RecordingApi::new();

        let id = ModelLoader::new()
            .load_model(&mut scene, &mut textures, &mut api, &path, ImportFlags::DEFAULT)
            .unwrap();

        let model = scene.get(id).unwrap();
        assert_eq!(model.source(), path.as_path());
        let summary: Vec<(&str, usize, usize)> = model
            .meshes()
            .iter()
            .map(|m| (m.name(), m.vertex_count(), m.index_count()))
            .collect();
        assert_eq!(summary, vec![("hull", 4, 6), ("wing", 3, 3)]);
        assert_eq!(model.meshes()[0].vertices()[2].tex_coords, [1.0, 1.0]);
        assert_eq!(model.meshes()[0].vertices()[0].color, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn only_decodable_textures_are_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ship(dir.path());
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();
        let mut api = RecordingApi::new();

        let id = ModelLoader::new()
            .load_model(&mut scene, &mut textures, &mut api, &path, ImportFlags::DEFAULT)
            .unwrap();

        let model = scene.get(id).unwrap();
        assert_eq!(model.meshes()[0].textures().len(), 1);
        assert!(model.meshes()[1].textures().is_empty());
        assert_eq!(textures.len(), 1);
        let info = textures.info("hull_diffuse");
        assert_eq!((info.width, info.height), (2, 2));
        assert_eq!(info.id, Some(model.meshes()[0].textures()[0].id));
    }

    #[test]
    fn missing_file_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();
        let mut api = RecordingApi::new();

        let result = ModelLoader::new().load_model(
            &mut scene,
            &mut textures,
            &mut api,
            &dir.path().join("missing.obj"),
            ImportFlags::DEFAULT,
        );

        assert!(matches!(
            result,
            Err(AssetError::Import(ImportError::NotFound { .. }))
        ));
        assert!(scene.is_empty());
        assert_eq!(api.texture_count(), 0);
    }

    #[test]
    fn incomplete_scene_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.obj");
        fs::write(&path, "v 0 0 0\n").unwrap();
        let mut scene = Scene::new();

        let result = ModelLoader::new().load_model(
            &mut scene,
            &mut TextureRegistry::new(),
            &mut RecordingApi::new(),
            &path,
            ImportFlags::DEFAULT,
        );
        assert!(matches!(result, Err(AssetError::Incomplete(_))));
        assert!(scene.is_empty());
    }

    /// Hands back a fixed scene and counts calls.
    struct FixedImporter {
        scene: ImportedScene,
        calls: Cell<u32>,
    }

    impl SceneImporter for FixedImporter {
        fn import(&self, _: &Path, _: ImportFlags) -> Result<ImportedScene, ImportError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.scene.clone())
        }
    }

    fn triangle() -> ImportedMesh {
        ImportedMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: Some(vec![[0.0, 0.0, 1.0]; 3]),
            tangents: Some(vec![[1.0, 0.0, 0.0]; 3]),
            bitangents: Some(vec![[0.0, 1.0, 0.0]; 3]),
            triangles: vec![[0, 1, 2]],
            ..ImportedMesh::default()
        }
    }

    #[test]
    fn nested_nodes_are_walked_depth_first() {
        let mut root = ImportedNode::new("root");
        let mut body = ImportedNode::new("body");
        body.meshes = vec![0];
        let mut turret = ImportedNode::new("turret");
        turret.meshes = vec![1, 2];
        body.children.push(turret);
        let mut tail = ImportedNode::new("tail");
        tail.meshes = vec![0, 7];
        root.children = vec![body, tail];

        let importer = FixedImporter {
            scene: ImportedScene {
                root,
                meshes: vec![triangle(), triangle(), triangle()],
                ..ImportedScene::default()
            },
            calls: Cell::new(0),
        };
        let loader = ModelLoader::with(importer, ImageFileDecoder);
        let mut scene = Scene::new();
        let id = loader
            .load_model(
                &mut scene,
                &mut TextureRegistry::new(),
                &mut RecordingApi::new(),
                Path::new("virtual/model.obj"),
                ImportFlags::empty(),
            )
            .unwrap();

        let names: Vec<&str> = scene.get(id).unwrap().meshes().iter().map(Mesh::name).collect();
        assert_eq!(names, ["body", "turret", "turret", "tail"]);
        let vertex = scene.get(id).unwrap().meshes()[0].vertices()[1];
        assert_eq!(vertex.tangent, [1.0, 0.0, 0.0]);
        assert_eq!(vertex.bitangent, [0.0, 1.0, 0.0]);
        assert_eq!(loader.importer.calls.get(), 1);
    }

    /// Decodes every path to a 1x1 image and records what it was asked for.
    #[derive(Default)]
    struct CountingDecoder {
        paths: std::cell::RefCell<Vec<PathBuf>>,
    }

    impl ImageDecoder for CountingDecoder {
        fn decode(&self, path: &Path) -> Result<ImageData, DecodeError> {
            self.paths.borrow_mut().push(path.to_path_buf());
            Ok(ImageData::solid(1, 1, [255; 4]))
        }
    }

    #[test]
    fn missing_texture_is_not_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ship(dir.path());
        let loader = ModelLoader::with(ObjImporter, CountingDecoder::default());
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();

        let id = loader
            .load_model(
                &mut scene,
                &mut textures,
                &mut RecordingApi::new(),
                &path,
                ImportFlags::DEFAULT,
            )
            .unwrap();

        assert_eq!(*loader.decoder.paths.borrow(), vec![dir.path().join("hull.png")]);
        assert!(scene.get(id).unwrap().meshes()[1].textures().is_empty());
        assert!(textures.get("wing_diffuse").is_none());
    }

    #[test]
    fn second_load_gets_next_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ship(dir.path());
        let mut scene = Scene::new();
        let mut textures = TextureRegistry::new();
        let mut api = RecordingApi::new();
        let loader = ModelLoader::new();

        let first = loader
            .load_model(&mut scene, &mut textures, &mut api, &path, ImportFlags::SMOOTH)
            .unwrap();
        let second = loader
            .load_model(&mut scene, &mut textures, &mut api, &path, ImportFlags::SMOOTH)
            .unwrap();
        assert_eq!(first, ModelId(0));
        assert_eq!(second, ModelId(1));
        assert_eq!(scene.len(), 2);
    }
}
