use bitflags::bitflags;
use std::path::{Path, PathBuf};

bitflags! {
    /// Post-processing steps applied after parsing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImportFlags: u32 {
        /// One normal per face, for meshes that have none.
        const GEN_NORMALS = 1 << 0;
        /// Normals averaged over shared positions, for meshes that have none.
        const GEN_SMOOTH_NORMALS = 1 << 1;
        const JOIN_IDENTICAL_VERTICES = 1 << 2;
        /// Merge meshes of one node that share a material.
        const OPTIMIZE_MESHES = 1 << 3;

        const DEFAULT = Self::GEN_NORMALS.bits()
            | Self::JOIN_IDENTICAL_VERTICES.bits()
            | Self::OPTIMIZE_MESHES.bits();
        const SMOOTH = Self::GEN_SMOOTH_NORMALS.bits()
            | Self::JOIN_IDENTICAL_VERTICES.bits()
            | Self::OPTIMIZE_MESHES.bits();
    }
}

impl Default for ImportFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Errors raised while parsing a model file.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{}: file not found", .path.display())]
    NotFound { path: PathBuf },
    #[error("{}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// A parsed model file: a node tree referencing meshes by index.
#[derive(Debug, Clone, Default)]
pub struct ImportedScene {
    pub root: ImportedNode,
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    /// Set when the importer could not produce usable geometry.
    pub incomplete: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportedNode {
    pub name: String,
    /// Indices into [`ImportedScene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<ImportedNode>,
}

impl ImportedNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Visit this node and its descendants depth first, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ImportedNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Per-vertex channels are parallel to `positions`; optional channels are
/// `None` when the file does not carry them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub bitangents: Option<Vec<[f32; 3]>>,
    pub colors: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub triangles: Vec<[u32; 3]>,
    pub material: Option<usize>,
}

fn pick<T: Copy>(channel: &Option<Vec<T>>, picks: &[u32]) -> Option<Vec<T>> {
    channel
        .as_ref()
        .map(|values| picks.iter().map(|&i| values[i as usize]).collect())
}

fn push_bits(key: &mut Vec<u32>, values: &[f32]) {
    key.extend(values.iter().map(|v| v.to_bits()));
}

impl ImportedMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Which optional channels are present, in field order.
    pub fn layout(&self) -> [bool; 5] {
        [
            self.normals.is_some(),
            self.tangents.is_some(),
            self.bitangents.is_some(),
            self.colors.is_some(),
            self.uvs.is_some(),
        ]
    }

    /// Index of the first triangle corner that points past the vertex data.
    pub fn first_bad_index(&self) -> Option<u32> {
        let len = self.positions.len() as u32;
        self.triangles.iter().flatten().copied().find(|&i| i >= len)
    }

    /// The listed vertices in order, without triangles.
    pub(crate) fn select(&self, picks: &[u32]) -> ImportedMesh {
        ImportedMesh {
            positions: picks.iter().map(|&i| self.positions[i as usize]).collect(),
            normals: pick(&self.normals, picks),
            tangents: pick(&self.tangents, picks),
            bitangents: pick(&self.bitangents, picks),
            colors: pick(&self.colors, picks),
            uvs: pick(&self.uvs, picks),
            triangles: Vec::new(),
            material: self.material,
        }
    }

    /// Bit pattern of every channel of vertex `i`.
    pub(crate) fn vertex_key(&self, i: usize) -> Vec<u32> {
        let mut key = Vec::with_capacity(17);
        push_bits(&mut key, &self.positions[i]);
        for channel in [&self.normals, &self.tangents, &self.bitangents, &self.colors]
            .into_iter()
            .flatten()
        {
            push_bits(&mut key, &channel[i]);
        }
        if let Some(uvs) = &self.uvs {
            push_bits(&mut key, &uvs[i]);
        }
        key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedMaterial {
    pub name: String,
    /// Diffuse texture paths relative to the model file.
    pub diffuse_textures: Vec<String>,
}

/// Parses a model file into an [`ImportedScene`] and applies `flags`.
pub trait SceneImporter {
    fn import(&self, path: &Path, flags: ImportFlags) -> Result<ImportedScene, ImportError>;
}
