//! Headless backend that records every call.
//!
//! `RecordingApi` tracks handle validity like a real driver and keeps the
//! last value of every uniform, so tests and the CLI can inspect exactly what
//! the renderer asked for without a GPU.

use crate::api::{BufferTarget, GraphicsApi, ImageData, ProgramSource, RenderError, Topology};
use crate::uniforms::{UniformKind, UniformLocation, UniformValue};
use flyby_common::{BufferId, ProgramId, TextureId, VertexArrayId};
use flyby_scene::VertexAttribute;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
    },
    CreateVertexArray(VertexArrayId),
    BindVertexArray(Option<VertexArrayId>),
    CreateBuffer {
        target: BufferTarget,
        buffer: BufferId,
        len: usize,
    },
    BindBuffer {
        target: BufferTarget,
        buffer: BufferId,
    },
    VertexAttribute {
        slot: u32,
        attribute: VertexAttribute,
        stride: u32,
    },
    UpdateBuffer {
        buffer: BufferId,
        offset: u64,
        len: usize,
    },
    BindBufferBase {
        binding: u32,
        buffer: BufferId,
    },
    CreateTexture(TextureId),
    ActiveTexture(u32),
    BindTexture(TextureId),
    DrawElements {
        topology: Topology,
        count: u32,
    },
    DrawElementsInstanced {
        topology: Topology,
        count: u32,
        instances: u32,
    },
}

/// State of a recorded vertex array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexArrayState {
    pub vertex_buffer: Option<BufferId>,
    pub index_buffer: Option<BufferId>,
    pub attributes: Vec<(u32, VertexAttribute, u32)>,
}

#[derive(Debug, Clone)]
struct BufferState {
    target: BufferTarget,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct TextureState {
    label: String,
    width: u32,
    height: u32,
}

/// Handles start at 1 so a zeroed handle is never valid.
fn handle_index(raw: u32) -> Option<usize> {
    raw.checked_sub(1).map(|i| i as usize)
}

fn next_handle(len: usize) -> u32 {
    len as u32 + 1
}

#[derive(Debug, Default)]
pub struct RecordingApi {
    commands: Vec<Command>,
    programs: Vec<ProgramSource>,
    vertex_arrays: Vec<VertexArrayState>,
    buffers: Vec<BufferState>,
    textures: Vec<TextureState>,
    uniforms: BTreeMap<UniformLocation, UniformValue>,
    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    active_unit: u32,
    units: BTreeMap<u32, TextureId>,
    storage_bindings: BTreeMap<u32, BufferId>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log, keeping all object state.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawElements { .. }))
            .count()
    }

    /// `(index count, instance count)` of every instanced draw, in order.
    pub fn instanced_draws(&self) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawElementsInstanced {
                    count, instances, ..
                } => Some((*count, *instances)),
                _ => None,
            })
            .collect()
    }

    /// Last value set for `name` on `program`.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let location = self.uniform_location(program, name)?;
        self.uniforms.get(&location).copied()
    }

    pub fn vertex_array(&self, id: VertexArrayId) -> Option<&VertexArrayState> {
        self.vertex_arrays.get(handle_index(id.0)?)
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        let buffer = self.buffers.get(handle_index(id.0)?)?;
        Some(&buffer.data)
    }

    pub fn buffer_target(&self, id: BufferId) -> Option<BufferTarget> {
        Some(self.buffers.get(handle_index(id.0)?)?.target)
    }

    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        let texture = self.textures.get(handle_index(id.0)?)?;
        Some((texture.width, texture.height))
    }

    pub fn texture_label(&self, id: TextureId) -> Option<&str> {
        Some(&self.textures.get(handle_index(id.0)?)?.label)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Texture bound to `unit`, if any.
    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureId> {
        self.units.get(&unit).copied()
    }

    /// Storage buffer bound to `binding`, if any.
    pub fn storage_binding(&self, binding: u32) -> Option<BufferId> {
        self.storage_bindings.get(&binding).copied()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current_program
    }

    fn program(&self, id: ProgramId) -> Option<&ProgramSource> {
        self.programs.get(handle_index(id.0)?)
    }

    fn bound_vertex_array_mut(&mut self) -> Option<&mut VertexArrayState> {
        let index = handle_index(self.bound_vertex_array?.0)?;
        self.vertex_arrays.get_mut(index)
    }

    fn check_draw(&self) -> bool {
        if self.current_program.is_none() {
            warn!("draw without a program in use");
            return false;
        }
        let ready = self
            .bound_vertex_array
            .and_then(|id| self.vertex_array(id))
            .is_some_and(|vao| vao.vertex_buffer.is_some() && vao.index_buffer.is_some());
        if !ready {
            warn!("draw without a complete vertex array bound");
        }
        ready
    }
}

impl GraphicsApi for RecordingApi {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, RenderError> {
        source.validate()?;
        let id = ProgramId(next_handle(self.programs.len()));
        self.programs.push(source.clone());
        self.commands.push(Command::CreateProgram(id));
        debug!(program = id.0, label = %source.label, "program created");
        Ok(id)
    }

    fn is_program(&self, program: ProgramId) -> bool {
        self.program(program).is_some()
    }

    fn use_program(&mut self, program: ProgramId) {
        if !self.is_program(program) {
            error!(program = program.0, "use of unknown program");
            return;
        }
        self.current_program = Some(program);
        self.commands.push(Command::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let index = self.program(program)?.location_index(name)?;
        Some(UniformLocation { program, index })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(source) = self.program(location.program) else {
            error!(program = location.program.0, "uniform on unknown program");
            return;
        };
        let index = location.index as usize;
        let expected = match source.uniforms.get(index) {
            Some(decl) => decl.kind,
            // Samplers take their texture unit.
            None if index < source.uniforms.len() + source.samplers.len() => UniformKind::Int,
            None => {
                error!(index, "uniform location out of range");
                return;
            }
        };
        if expected != value.kind() {
            warn!(?expected, got = ?value.kind(), "uniform type mismatch");
            return;
        }
        self.uniforms.insert(location, value);
        self.commands.push(Command::SetUniform { location, value });
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = VertexArrayId(next_handle(self.vertex_arrays.len()));
        self.vertex_arrays.push(VertexArrayState::default());
        self.commands.push(Command::CreateVertexArray(id));
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        if let Some(id) = vertex_array
            && self.vertex_array(id).is_none()
        {
            error!(vertex_array = id.0, "bind of unknown vertex array");
            return;
        }
        self.bound_vertex_array = vertex_array;
        self.commands.push(Command::BindVertexArray(vertex_array));
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let id = BufferId(next_handle(self.buffers.len()));
        self.buffers.push(BufferState {
            target,
            data: data.to_vec(),
        });
        self.commands.push(Command::CreateBuffer {
            target,
            buffer: id,
            len: data.len(),
        });
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId) {
        if !self.is_buffer(buffer) {
            error!(buffer = buffer.0, "bind of unknown buffer");
            return;
        }
        let Some(vao) = self.bound_vertex_array_mut() else {
            warn!(buffer = buffer.0, "buffer bound without a vertex array");
            return;
        };
        match target {
            BufferTarget::Vertex => vao.vertex_buffer = Some(buffer),
            BufferTarget::Index => vao.index_buffer = Some(buffer),
            BufferTarget::Storage => {
                warn!("storage buffers bind through bind_buffer_base");
                return;
            }
        }
        self.commands.push(Command::BindBuffer { target, buffer });
    }

    fn vertex_attribute(&mut self, slot: u32, attribute: VertexAttribute, stride: u32) {
        let Some(vao) = self.bound_vertex_array_mut() else {
            warn!(slot, "vertex attribute without a vertex array");
            return;
        };
        vao.attributes.push((slot, attribute, stride));
        self.commands.push(Command::VertexAttribute {
            slot,
            attribute,
            stride,
        });
    }

    fn is_buffer(&self, buffer: BufferId) -> bool {
        self.buffer_data(buffer).is_some()
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(state) = handle_index(buffer.0).and_then(|i| self.buffers.get_mut(i)) else {
            error!(buffer = buffer.0, "update of unknown buffer");
            return;
        };
        let start = offset as usize;
        let Some(dst) = state.data.get_mut(start..start + data.len()) else {
            error!(buffer = buffer.0, offset, len = data.len(), "buffer update out of range");
            return;
        };
        dst.copy_from_slice(data);
        self.commands.push(Command::UpdateBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn bind_buffer_base(&mut self, binding: u32, buffer: BufferId) {
        if !self.is_buffer(buffer) {
            error!(buffer = buffer.0, binding, "bind of unknown storage buffer");
            return;
        }
        self.storage_bindings.insert(binding, buffer);
        self.commands.push(Command::BindBufferBase { binding, buffer });
    }

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureId {
        let id = TextureId(next_handle(self.textures.len()));
        self.textures.push(TextureState {
            label: label.to_string(),
            width: image.width,
            height: image.height,
        });
        self.commands.push(Command::CreateTexture(id));
        id
    }

    fn is_texture(&self, texture: TextureId) -> bool {
        self.texture_size(texture).is_some()
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
        self.commands.push(Command::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        if !self.is_texture(texture) {
            error!(texture = texture.0, "bind of unknown texture");
            return;
        }
        self.units.insert(self.active_unit, texture);
        self.commands.push(Command::BindTexture(texture));
    }

    fn draw_elements(&mut self, topology: Topology, count: u32) {
        if self.check_draw() {
            self.commands.push(Command::DrawElements { topology, count });
        }
    }

    fn draw_elements_instanced(&mut self, topology: Topology, count: u32, instances: u32) {
        if self.check_draw() {
            self.commands.push(Command::DrawElementsInstanced {
                topology,
                count,
                instances,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders;
    use flyby_scene::VERTEX_LAYOUT;
    use glam::Mat4;

    #[test]
    fn handles_start_at_one() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        assert_eq!(program, ProgramId(1));
        assert!(!api.is_program(ProgramId(0)));
        assert!(!api.is_buffer(BufferId(0)));
        assert!(!api.is_texture(TextureId(0)));
    }

    #[test]
    fn uniform_values_are_kept() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let loc = api.uniform_location(program, "model").unwrap();
        api.set_uniform(loc, UniformValue::Mat4(Mat4::IDENTITY));
        assert_eq!(
            api.uniform(program, "model"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
    }

    #[test]
    fn mismatched_uniform_is_ignored() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::basic()).unwrap();
        let loc = api.uniform_location(program, "model").unwrap();
        api.set_uniform(loc, UniformValue::Float(1.0));
        assert_eq!(api.uniform(program, "model"), None);
        assert!(api.commands().iter().all(|c| !matches!(c, Command::SetUniform { .. })));
    }

    #[test]
    fn sampler_uniform_takes_an_int() {
        let mut api = RecordingApi::new();
        let program = api.create_program(&shaders::textured()).unwrap();
        let loc = api.uniform_location(program, "texture_diffuse_0").unwrap();
        api.set_uniform(loc, UniformValue::Int(0));
        assert_eq!(
            api.uniform(program, "texture_diffuse_0"),
            Some(UniformValue::Int(0))
        );
    }

    #[test]
    fn buffers_attach_to_bound_vertex_array() {
        let mut api = RecordingApi::new();
        let vao = api.create_vertex_array();
        api.bind_vertex_array(Some(vao));
        let vbo = api.create_buffer(BufferTarget::Vertex, &[0; 68]);
        api.bind_buffer(BufferTarget::Vertex, vbo);
        let ebo = api.create_buffer(BufferTarget::Index, &[0; 12]);
        api.bind_buffer(BufferTarget::Index, ebo);
        api.vertex_attribute(0, VERTEX_LAYOUT[0], 68);
        api.bind_vertex_array(None);

        let state = api.vertex_array(vao).unwrap();
        assert_eq!(state.vertex_buffer, Some(vbo));
        assert_eq!(state.index_buffer, Some(ebo));
        assert_eq!(state.attributes.len(), 1);
    }

    #[test]
    fn draw_requires_program_and_vertex_array() {
        let mut api = RecordingApi::new();
        api.draw_elements(Topology::Triangles, 3);
        assert_eq!(api.draw_calls(), 0);

        let program = api.create_program(&shaders::basic()).unwrap();
        api.use_program(program);
        let vao = api.create_vertex_array();
        api.bind_vertex_array(Some(vao));
        // Still no buffers attached.
        api.draw_elements(Topology::Triangles, 3);
        assert_eq!(api.draw_calls(), 0);
    }

    #[test]
    fn update_buffer_bounds() {
        let mut api = RecordingApi::new();
        let buffer = api.create_buffer(BufferTarget::Storage, &[0; 8]);
        api.update_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(api.buffer_data(buffer), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
        api.update_buffer(buffer, 6, &[9, 9, 9, 9]);
        assert_eq!(api.buffer_data(buffer), Some(&[0, 0, 0, 0, 1, 2, 3, 4][..]));
    }

    #[test]
    fn bad_program_is_rejected() {
        let mut api = RecordingApi::new();
        let mut source = shaders::basic();
        source.vertex.clear();
        assert!(api.create_program(&source).is_err());
        assert_eq!(api.program_count(), 0);
    }
}
