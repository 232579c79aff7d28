use bytemuck::{Pod, Zeroable};
use flyby_common::{BufferId, TextureId, VertexArrayId};
use std::mem::{offset_of, size_of};

/// One vertex as laid out in GPU memory.
///
/// Six attributes, tightly packed in declaration order.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0; 3],
            color: [1.0, 1.0, 1.0],
            tangent: [0.0; 3],
            bitangent: [0.0; 3],
            tex_coords: [0.0; 2],
        }
    }
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
            ..Self::default()
        }
    }
}

/// A float vertex attribute: component count and byte offset inside [`Vertex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub components: u32,
    pub offset: u32,
}

/// Byte distance between consecutive vertices.
pub const VERTEX_STRIDE: u32 = size_of::<Vertex>() as u32;

/// Attribute slots 0..=5: position, normal, color, tangent, bitangent, uv.
pub const VERTEX_LAYOUT: [VertexAttribute; 6] = [
    VertexAttribute {
        components: 3,
        offset: offset_of!(Vertex, position) as u32,
    },
    VertexAttribute {
        components: 3,
        offset: offset_of!(Vertex, normal) as u32,
    },
    VertexAttribute {
        components: 3,
        offset: offset_of!(Vertex, color) as u32,
    },
    VertexAttribute {
        components: 3,
        offset: offset_of!(Vertex, tangent) as u32,
    },
    VertexAttribute {
        components: 3,
        offset: offset_of!(Vertex, bitangent) as u32,
    },
    VertexAttribute {
        components: 2,
        offset: offset_of!(Vertex, tex_coords) as u32,
    },
];

/// Semantic role of a texture. Only diffuse maps are loaded today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
}

impl TextureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diffuse => "diffuse",
        }
    }
}

/// A GPU texture referenced by a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texture {
    pub id: TextureId,
    pub kind: TextureKind,
}

impl Texture {
    pub fn new(id: TextureId, kind: TextureKind) -> Self {
        Self { id, kind }
    }

    /// Sampler uniform name for this texture at `index`, e.g. `texture_diffuse_0`.
    pub fn uniform_name(&self, index: usize) -> String {
        format!("texture_{}_{}", self.kind.as_str(), index)
    }
}

/// GPU handles produced by mesh setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHandles {
    pub vao: VertexArrayId,
    pub vbo: BufferId,
    pub ebo: BufferId,
}

/// Immutable geometry plus the handles of its GPU copy.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Texture>,
    gpu: Option<MeshHandles>,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        textures: Vec<Texture>,
    ) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            textures,
            gpu: None,
        }
    }

    pub fn builder(name: impl Into<String>) -> MeshBuilder {
        MeshBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn has_textures(&self) -> bool {
        !self.textures.is_empty()
    }

    /// Handles of the uploaded copy, `None` until setup ran.
    pub fn gpu(&self) -> Option<MeshHandles> {
        self.gpu
    }

    /// Record the handles of a fresh upload. Returns the handles this replaced,
    /// which the caller is expected to report since they now leak.
    pub fn attach_gpu(&mut self, handles: MeshHandles) -> Option<MeshHandles> {
        self.gpu.replace(handles)
    }
}

/// Incremental construction of a [`Mesh`].
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Texture>,
}

impl MeshBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn vertex(mut self, vertex: Vertex) -> Self {
        self.vertices.push(vertex);
        self
    }

    pub fn vertices(mut self, vertices: impl IntoIterator<Item = Vertex>) -> Self {
        self.vertices.extend(vertices);
        self
    }

    /// Append one face; its indices are flattened in order.
    pub fn face(mut self, indices: &[u32]) -> Self {
        self.indices.extend_from_slice(indices);
        self
    }

    pub fn indices(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.indices.extend(indices);
        self
    }

    pub fn texture(mut self, texture: Texture) -> Self {
        self.textures.push(texture);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn build(self) -> Mesh {
        Mesh::new(self.name, self.vertices, self.indices, self.textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(VERTEX_STRIDE, 68);
        let offsets: Vec<u32> = VERTEX_LAYOUT.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36, 48, 60]);
        let components: Vec<u32> = VERTEX_LAYOUT.iter().map(|a| a.components).collect();
        assert_eq!(components, vec![3, 3, 3, 3, 3, 2]);
    }

    #[test]
    fn default_vertex_is_white() {
        assert_eq!(Vertex::default().color, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn texture_uniform_name() {
        let tex = Texture::new(TextureId(4), TextureKind::Diffuse);
        assert_eq!(tex.uniform_name(0), "texture_diffuse_0");
        assert_eq!(tex.uniform_name(3), "texture_diffuse_3");
    }

    #[test]
    fn builder_flattens_faces() {
        let mesh = Mesh::builder("quad")
            .vertices([Vertex::default(); 4])
            .face(&[0, 1, 2])
            .face(&[2, 3, 0])
            .build();
        assert_eq!(mesh.name(), "quad");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices(), &[0, 1, 2, 2, 3, 0]);
        assert!(!mesh.has_textures());
        assert!(mesh.gpu().is_none());
    }

    #[test]
    fn attach_gpu_reports_replaced_handles() {
        let mut mesh = Mesh::default();
        let first = MeshHandles {
            vao: VertexArrayId(1),
            vbo: BufferId(1),
            ebo: BufferId(2),
        };
        let second = MeshHandles {
            vao: VertexArrayId(2),
            vbo: BufferId(3),
            ebo: BufferId(4),
        };
        assert_eq!(mesh.attach_gpu(first), None);
        assert_eq!(mesh.attach_gpu(second), Some(first));
        assert_eq!(mesh.gpu(), Some(second));
    }
}
