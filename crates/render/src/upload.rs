use crate::api::{BufferTarget, GraphicsApi};
use flyby_common::BufferId;
use flyby_scene::{Mesh, MeshHandles, Model, VERTEX_LAYOUT, VERTEX_STRIDE};
use glam::Mat4;
use tracing::{debug, error, warn};

/// Upload a mesh and declare its vertex layout.
///
/// Creates a vertex array, a vertex buffer and an index buffer every time it
/// runs. Calling it twice on the same mesh replaces the handles and the old
/// GPU objects leak.
pub fn setup_mesh(api: &mut dyn GraphicsApi, mesh: &mut Mesh) -> MeshHandles {
    let vao = api.create_vertex_array();
    api.bind_vertex_array(Some(vao));

    let vbo = api.create_buffer(BufferTarget::Vertex, bytemuck::cast_slice(mesh.vertices()));
    api.bind_buffer(BufferTarget::Vertex, vbo);
    let ebo = api.create_buffer(BufferTarget::Index, bytemuck::cast_slice(mesh.indices()));
    api.bind_buffer(BufferTarget::Index, ebo);

    for (slot, attribute) in VERTEX_LAYOUT.iter().enumerate() {
        api.vertex_attribute(slot as u32, *attribute, VERTEX_STRIDE);
    }
    api.bind_vertex_array(None);

    let handles = MeshHandles { vao, vbo, ebo };
    if let Some(previous) = mesh.attach_gpu(handles) {
        warn!(
            mesh = mesh.name(),
            vao = previous.vao.0,
            "mesh set up twice, previous GPU buffers leak"
        );
    }
    debug!(
        mesh = mesh.name(),
        vertices = mesh.vertex_count(),
        indices = mesh.index_count(),
        "mesh uploaded"
    );
    handles
}

/// Set up every mesh of `model` in order.
pub fn setup_model(api: &mut dyn GraphicsApi, model: &mut Model) {
    for mesh in model.meshes_mut() {
        setup_mesh(api, mesh);
    }
}

/// Per-instance model matrices in a storage buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceBuffer {
    pub buffer: BufferId,
    pub binding: u32,
    len: usize,
}

const MATRIX_BYTES: u64 = 64;

fn matrix_bytes(matrices: &[Mat4]) -> Vec<u8> {
    let floats: Vec<[f32; 16]> = matrices.iter().map(Mat4::to_cols_array).collect();
    bytemuck::cast_slice(&floats).to_vec()
}

impl InstanceBuffer {
    /// Upload `matrices` once and bind the buffer to `binding`.
    pub fn upload(api: &mut dyn GraphicsApi, matrices: &[Mat4], binding: u32) -> Self {
        let buffer = api.create_buffer(BufferTarget::Storage, &matrix_bytes(matrices));
        api.bind_buffer_base(binding, buffer);
        debug!(instances = matrices.len(), binding, "instance buffer uploaded");
        Self {
            buffer,
            binding,
            len: matrices.len(),
        }
    }

    /// Number of matrices in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite the matrix at `index`.
    pub fn update(&self, api: &mut dyn GraphicsApi, index: usize, matrix: Mat4) -> bool {
        if !api.is_buffer(self.buffer) {
            error!(buffer = self.buffer.0, "unknown buffer");
            return false;
        }
        if index >= self.len {
            warn!(index, len = self.len, "instance index out of range");
            return false;
        }
        api.update_buffer(
            self.buffer,
            index as u64 * MATRIX_BYTES,
            &matrix_bytes(&[matrix]),
        );
        true
    }
}
