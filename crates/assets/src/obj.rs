use crate::import::{
    ImportError, ImportFlags, ImportedMaterial, ImportedMesh, ImportedNode, ImportedScene,
    SceneImporter,
};
use crate::postprocess;
use std::path::Path;
use tracing::{debug, warn};

/// Wavefront OBJ importer.
///
/// Every object or group in the file becomes one child node of the root
/// holding one mesh. Faces are triangulated, points and lines dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjImporter;

impl ObjImporter {
    pub fn new() -> Self {
        Self
    }
}

fn chunks3(values: &[f32]) -> Vec<[f32; 3]> {
    values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn channel3(values: &[f32], count: usize) -> Option<Vec<[f32; 3]>> {
    (values.len() == count * 3 && count > 0).then(|| chunks3(values))
}

fn convert_mesh(mesh: &tobj::Mesh) -> ImportedMesh {
    let positions = chunks3(&mesh.positions);
    let count = positions.len();
    let uvs = (mesh.texcoords.len() == count * 2 && count > 0).then(|| {
        mesh.texcoords
            .chunks_exact(2)
            .map(|c| [c[0], c[1]])
            .collect()
    });
    ImportedMesh {
        normals: channel3(&mesh.normals, count),
        colors: channel3(&mesh.vertex_color, count),
        tangents: None,
        bitangents: None,
        uvs,
        triangles: mesh
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
        material: mesh.material_id,
        positions,
    }
}

fn convert_material(material: &tobj::Material) -> ImportedMaterial {
    ImportedMaterial {
        name: material.name.clone(),
        diffuse_textures: material.diffuse_texture.iter().cloned().collect(),
    }
}

impl SceneImporter for ObjImporter {
    fn import(&self, path: &Path, flags: ImportFlags) -> Result<ImportedScene, ImportError> {
        if !path.is_file() {
            return Err(ImportError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, materials) =
            tobj::load_obj(path, &options).map_err(|err| ImportError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let materials = match materials {
            Ok(materials) => materials,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "material library not loaded");
                Vec::new()
            }
        };

        let root_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut scene = ImportedScene {
            root: ImportedNode::new(root_name),
            materials: materials.iter().map(convert_material).collect(),
            ..ImportedScene::default()
        };

        for model in &models {
            let mesh = convert_mesh(&model.mesh);
            if mesh.triangles.is_empty() {
                debug!(object = %model.name, "skipping object without faces");
                continue;
            }
            if let Some(index) = mesh.first_bad_index() {
                return Err(ImportError::Parse {
                    path: path.to_path_buf(),
                    message: format!("object `{}` references missing vertex {index}", model.name),
                });
            }
            let mut node = ImportedNode::new(model.name.clone());
            node.meshes.push(scene.meshes.len());
            scene.meshes.push(mesh);
            scene.root.children.push(node);
        }

        scene.incomplete = scene.meshes.is_empty();
        postprocess::apply(&mut scene, flags);
        debug!(
            path = %path.display(),
            meshes = scene.meshes.len(),
            materials = scene.materials.len(),
            "obj imported"
        );
        Ok(scene)
    }
}
