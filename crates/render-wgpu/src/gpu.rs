use crate::pipeline::{self, Layouts, UNIFORM_SLOT};
use flyby_common::{BufferId, ProgramId, TextureId, VertexArrayId};
use flyby_render::{
    BufferTarget, GraphicsApi, ImageData, ProgramSource, RenderError, Topology, UniformKind,
    UniformLayout, UniformLocation, UniformValue,
};
use flyby_render::shaders::INSTANCE_BINDING;
use flyby_scene::VertexAttribute;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, warn};
use wgpu::util::DeviceExt;

struct Program {
    label: String,
    module: wgpu::ShaderModule,
    source: ProgramSource,
    layout: UniformLayout,
    /// Current values of the uniform block.
    block: Vec<u8>,
    /// Texture unit each sampler reads from.
    sampler_units: Vec<u32>,
}

#[derive(Default)]
struct VertexArray {
    vertex: Option<BufferId>,
    index: Option<BufferId>,
    attributes: Vec<(u32, VertexAttribute, u32)>,
}

struct Buffer {
    buffer: wgpu::Buffer,
    size: u64,
    /// Present for storage buffers.
    bind_group: Option<wgpu::BindGroup>,
}

struct Texture {
    bind_group: wgpu::BindGroup,
}

/// A draw captured at call time and replayed by [`WgpuApi::submit`].
struct DrawCall {
    program: ProgramId,
    topology: Topology,
    vertex: BufferId,
    index: BufferId,
    count: u32,
    instances: u32,
    uniform_offset: u32,
    storage: Option<BufferId>,
    texture: Option<TextureId>,
}

/// [`GraphicsApi`] on wgpu.
///
/// State calls update host-side mirrors immediately; draws are queued with a
/// copy of the program's uniform block and encoded into one render pass when
/// the frame is submitted.
pub struct WgpuApi {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth: wgpu::TextureView,
    layouts: Layouts,
    sampler: wgpu::Sampler,
    white_texture: wgpu::BindGroup,
    empty_instances: wgpu::BindGroup,
    ring: wgpu::Buffer,
    ring_capacity: u64,
    ring_bind_group: wgpu::BindGroup,

    programs: Vec<Program>,
    pipelines: HashMap<(ProgramId, Topology), wgpu::RenderPipeline>,
    vertex_arrays: Vec<VertexArray>,
    buffers: Vec<Buffer>,
    textures: Vec<Texture>,

    current_program: Option<ProgramId>,
    bound_vertex_array: Option<VertexArrayId>,
    active_unit: u32,
    units: BTreeMap<u32, TextureId>,
    storage_bindings: BTreeMap<u32, BufferId>,

    draws: Vec<DrawCall>,
    uniform_bytes: Vec<u8>,
    last_frame_draws: usize,
}

fn handle_index(raw: u32) -> Option<usize> {
    raw.checked_sub(1).map(|i| i as usize)
}

fn next_handle(len: usize) -> u32 {
    len as u32 + 1
}

const INITIAL_RING_SLOTS: u64 = 64;

impl WgpuApi {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            error!("wgpu error: {err}");
        }));

        let layouts = Layouts::new(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = upload_texture(&device, &queue, "white", &ImageData::solid(1, 1, [255; 4]));
        let white_texture = layouts.texture_bind_group(&device, &white, &sampler);

        let empty = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("empty_instances"),
            size: 64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let empty_instances = layouts.instance_bind_group(&device, &empty);

        let ring_capacity = INITIAL_RING_SLOTS * UNIFORM_SLOT;
        let ring = create_ring(&device, ring_capacity);
        let ring_bind_group = layouts.uniform_bind_group(&device, &ring);
        let depth = pipeline::create_depth_texture(&device, width, height);

        Self {
            device,
            queue,
            color_format,
            depth,
            layouts,
            sampler,
            white_texture,
            empty_instances,
            ring,
            ring_capacity,
            ring_bind_group,
            programs: Vec::new(),
            pipelines: HashMap::new(),
            vertex_arrays: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            current_program: None,
            bound_vertex_array: None,
            active_unit: 0,
            units: BTreeMap::new(),
            storage_bindings: BTreeMap::new(),
            draws: Vec::new(),
            uniform_bytes: Vec::new(),
            last_frame_draws: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Draw calls encoded by the last [`WgpuApi::submit`].
    pub fn last_frame_draws(&self) -> usize {
        self.last_frame_draws
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.depth = pipeline::create_depth_texture(&self.device, width, height);
    }

    /// Encode every recorded draw into one pass over `target`, cleared to
    /// `clear`, and submit it.
    pub fn submit(&mut self, target: &wgpu::TextureView, clear: [f64; 4]) {
        self.ensure_ring_capacity(self.uniform_bytes.len() as u64);
        if !self.uniform_bytes.is_empty() {
            self.queue.write_buffer(&self.ring, 0, &self.uniform_bytes);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0],
                            g: clear[1],
                            b: clear[2],
                            a: clear[3],
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &self.draws {
                let Some(pipeline) = self.pipelines.get(&(draw.program, draw.topology)) else {
                    continue;
                };
                let (Some(vertex), Some(index)) = (self.buffer(draw.vertex), self.buffer(draw.index))
                else {
                    continue;
                };
                let instances = draw
                    .storage
                    .and_then(|id| self.buffer(id))
                    .and_then(|b| b.bind_group.as_ref())
                    .unwrap_or(&self.empty_instances);
                let texture = draw
                    .texture
                    .and_then(|id| self.texture(id))
                    .map(|t| &t.bind_group)
                    .unwrap_or(&self.white_texture);

                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.ring_bind_group, &[draw.uniform_offset]);
                pass.set_bind_group(1, instances, &[]);
                pass.set_bind_group(2, texture, &[]);
                pass.set_vertex_buffer(0, vertex.buffer.slice(..));
                pass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.count, 0, 0..draw.instances);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.last_frame_draws = self.draws.len();
        self.draws.clear();
        self.uniform_bytes.clear();
    }

    fn ensure_ring_capacity(&mut self, needed: u64) {
        // The last slot is bound with a full UNIFORM_SLOT window.
        let needed = needed.max(UNIFORM_SLOT);
        if needed <= self.ring_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        debug!(capacity, "growing uniform ring");
        self.ring = create_ring(&self.device, capacity);
        self.ring_bind_group = self.layouts.uniform_bind_group(&self.device, &self.ring);
        self.ring_capacity = capacity;
    }

    fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(handle_index(id.0)?)
    }

    fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(handle_index(id.0)?)
    }

    fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(handle_index(id.0)?)
    }

    fn vertex_array(&self, id: VertexArrayId) -> Option<&VertexArray> {
        self.vertex_arrays.get(handle_index(id.0)?)
    }

    fn bound_vertex_array_mut(&mut self) -> Option<&mut VertexArray> {
        let index = handle_index(self.bound_vertex_array?.0)?;
        self.vertex_arrays.get_mut(index)
    }

    /// Build the pipeline for (`program`, `topology`) under a validation
    /// error scope. Returns the error message on failure.
    fn build_pipeline(&mut self, program: ProgramId, topology: Topology) -> Result<(), String> {
        if self.pipelines.contains_key(&(program, topology)) {
            return Ok(());
        }
        let Some(prog) = self.program(program) else {
            return Err(format!("unknown program {}", program.0));
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = pipeline::create_pipeline(
            &self.device,
            &self.layouts,
            &prog.module,
            &prog.label,
            topology,
            self.color_format,
        );
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(err.to_string());
        }
        self.pipelines.insert((program, topology), pipeline);
        Ok(())
    }

    fn record_draw(&mut self, topology: Topology, count: u32, instances: u32) {
        let Some(program_id) = self.current_program else {
            warn!("draw without a program in use");
            return;
        };
        let Some(vao) = self.bound_vertex_array.and_then(|id| self.vertex_array(id)) else {
            warn!("draw without a vertex array bound");
            return;
        };
        let (Some(vertex), Some(index)) = (vao.vertex, vao.index) else {
            warn!("draw with an incomplete vertex array");
            return;
        };
        if vao.attributes.is_empty() {
            warn!("draw with no vertex attributes declared");
            return;
        }
        if count == 0 || instances == 0 {
            return;
        }
        if let Err(message) = self.build_pipeline(program_id, topology) {
            error!(program = program_id.0, ?topology, "pipeline creation failed: {message}");
            return;
        }
        let Some(program) = handle_index(program_id.0).and_then(|i| self.programs.get(i)) else {
            return;
        };

        let texture = program
            .sampler_units
            .first()
            .and_then(|unit| self.units.get(unit))
            .copied();
        let uniform_offset = self.uniform_bytes.len();
        self.uniform_bytes.extend_from_slice(&program.block);
        self.uniform_bytes
            .resize(uniform_offset + UNIFORM_SLOT as usize, 0);

        self.draws.push(DrawCall {
            program: program_id,
            topology,
            vertex,
            index,
            count,
            instances,
            uniform_offset: uniform_offset as u32,
            storage: self.storage_bindings.get(&INSTANCE_BINDING).copied(),
            texture,
        });
    }
}

fn create_ring(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform_ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &ImageData,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture.create_view(&Default::default())
}

impl GraphicsApi for WgpuApi {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, RenderError> {
        let layout = source.validate()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = pipeline::create_module(&self.device, source);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::ProgramLink {
                label: source.label.clone(),
                message: err.to_string(),
            });
        }

        let id = ProgramId(next_handle(self.programs.len()));
        self.programs.push(Program {
            label: source.label.clone(),
            module,
            source: source.clone(),
            block: vec![0; layout.size()],
            layout,
            sampler_units: vec![0; source.samplers.len()],
        });

        // Triangles is the common case; building it here surfaces interface
        // mismatches at load time instead of on the first draw.
        if let Err(message) = self.build_pipeline(id, Topology::Triangles) {
            self.programs.pop();
            return Err(RenderError::ProgramLink {
                label: source.label.clone(),
                message,
            });
        }
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
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let index = self.program(program)?.source.location_index(name)?;
        Some(UniformLocation { program, index })
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) =
            handle_index(location.program.0).and_then(|i| self.programs.get_mut(i))
        else {
            error!(program = location.program.0, "uniform on unknown program");
            return;
        };
        let index = location.index as usize;
        let block_len = program.source.uniforms.len();
        if index < block_len {
            if !program.layout.write(&mut program.block, location.index, &value) {
                warn!(
                    program = %program.label,
                    expected = ?program.layout.kind(location.index),
                    got = ?value.kind(),
                    "uniform type mismatch"
                );
            }
            return;
        }
        match (program.sampler_units.get_mut(index - block_len), value) {
            (Some(unit), UniformValue::Int(v)) if v >= 0 => *unit = v as u32,
            (Some(_), other) => warn!(
                program = %program.label,
                expected = ?UniformKind::Int,
                got = ?other.kind(),
                "sampler expects a texture unit"
            ),
            (None, _) => error!(index, "uniform location out of range"),
        }
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        self.vertex_arrays.push(VertexArray::default());
        VertexArrayId(self.vertex_arrays.len() as u32)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        if let Some(id) = vertex_array
            && self.vertex_array(id).is_none()
        {
            error!(vertex_array = id.0, "bind of unknown vertex array");
            return;
        }
        self.bound_vertex_array = vertex_array;
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let (usage, label) = match target {
            BufferTarget::Vertex => (wgpu::BufferUsages::VERTEX, "vertex_buffer"),
            BufferTarget::Index => (wgpu::BufferUsages::INDEX, "index_buffer"),
            BufferTarget::Storage => (wgpu::BufferUsages::STORAGE, "storage_buffer"),
        };
        // Storage bindings must not be empty; copies need 4-byte sizes.
        let mut contents = data.to_vec();
        let min = if target == BufferTarget::Storage { 64 } else { 4 };
        let padded = contents.len().max(min).next_multiple_of(4);
        contents.resize(padded, 0);

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: &contents,
                usage: usage | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = (target == BufferTarget::Storage)
            .then(|| self.layouts.instance_bind_group(&self.device, &buffer));
        self.buffers.push(Buffer {
            buffer,
            size: contents.len() as u64,
            bind_group,
        });
        BufferId(self.buffers.len() as u32)
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
            BufferTarget::Vertex => vao.vertex = Some(buffer),
            BufferTarget::Index => vao.index = Some(buffer),
            BufferTarget::Storage => warn!("storage buffers bind through bind_buffer_base"),
        }
    }

    fn vertex_attribute(&mut self, slot: u32, attribute: VertexAttribute, stride: u32) {
        match self.bound_vertex_array_mut() {
            Some(vao) => vao.attributes.push((slot, attribute, stride)),
            None => warn!(slot, "vertex attribute without a vertex array"),
        }
    }

    fn is_buffer(&self, buffer: BufferId) -> bool {
        self.buffer(buffer).is_some()
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(target) = self.buffer(buffer) else {
            error!(buffer = buffer.0, "update of unknown buffer");
            return;
        };
        let len = data.len() as u64;
        if offset + len > target.size || offset % 4 != 0 || len % 4 != 0 {
            error!(buffer = buffer.0, offset, len, "invalid buffer update range");
            return;
        }
        self.queue.write_buffer(&target.buffer, offset, data);
    }

    fn bind_buffer_base(&mut self, binding: u32, buffer: BufferId) {
        match self.buffer(buffer) {
            Some(b) if b.bind_group.is_some() => {
                self.storage_bindings.insert(binding, buffer);
            }
            Some(_) => error!(buffer = buffer.0, binding, "not a storage buffer"),
            None => error!(buffer = buffer.0, binding, "bind of unknown storage buffer"),
        }
    }

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureId {
        let expected = image.width as usize * image.height as usize * 4;
        let view = if image.width == 0 || image.height == 0 || image.pixels.len() != expected {
            error!(
                label,
                width = image.width,
                height = image.height,
                bytes = image.pixels.len(),
                "malformed image, substituting a white texel"
            );
            upload_texture(&self.device, &self.queue, label, &ImageData::solid(1, 1, [255; 4]))
        } else {
            upload_texture(&self.device, &self.queue, label, image)
        };
        let bind_group = self
            .layouts
            .texture_bind_group(&self.device, &view, &self.sampler);
        self.textures.push(Texture { bind_group });
        TextureId(self.textures.len() as u32)
    }

    fn is_texture(&self, texture: TextureId) -> bool {
        self.texture(texture).is_some()
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, texture: TextureId) {
        if !self.is_texture(texture) {
            error!(texture = texture.0, "bind of unknown texture");
            return;
        }
        self.units.insert(self.active_unit, texture);
    }

    fn draw_elements(&mut self, topology: Topology, count: u32) {
        self.record_draw(topology, count, 1);
    }

    fn draw_elements_instanced(&mut self, topology: Topology, count: u32, instances: u32) {
        self.record_draw(topology, count, instances);
    }
}
