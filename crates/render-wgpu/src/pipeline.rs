use flyby_render::{ProgramSource, Topology};
use flyby_scene::{VERTEX_LAYOUT, VERTEX_STRIDE};
use std::num::NonZeroU64;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Bytes reserved per draw in the uniform ring. Matches the usual
/// `min_uniform_buffer_offset_alignment`.
pub const UNIFORM_SLOT: u64 = 256;

/// Bind group layouts shared by every program.
pub struct Layouts {
    pub uniforms: wgpu::BindGroupLayout,
    pub instances: wgpu::BindGroupLayout,
    pub texture: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_ring_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let instances = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("instance_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program_layout"),
            bind_group_layouts: &[&uniforms, &instances, &texture],
            push_constant_ranges: &[],
        });

        Self {
            uniforms,
            instances,
            texture,
            pipeline,
        }
    }

    pub fn uniform_bind_group(&self, device: &wgpu::Device, ring: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_ring_bind_group"),
            layout: &self.uniforms,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: ring,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_SLOT),
                }),
            }],
        })
    }

    pub fn instance_bind_group(
        &self,
        device: &wgpu::Device,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("instance_bind_group"),
            layout: &self.instances,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_bind_group"),
            layout: &self.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        4 => wgpu::VertexFormat::Float32x4,
        _ => wgpu::VertexFormat::Float32x3,
    }
}

/// wgpu attributes for the mesh vertex layout.
pub fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
    VERTEX_LAYOUT
        .iter()
        .enumerate()
        .map(|(slot, attribute)| wgpu::VertexAttribute {
            format: vertex_format(attribute.components),
            offset: attribute.offset as u64,
            shader_location: slot as u32,
        })
        .collect()
}

fn primitive_state(topology: Topology) -> wgpu::PrimitiveState {
    let (topology, strip_index_format, cull_mode) = match topology {
        Topology::Triangles => (
            wgpu::PrimitiveTopology::TriangleList,
            None,
            Some(wgpu::Face::Back),
        ),
        Topology::TriangleStrip => (
            wgpu::PrimitiveTopology::TriangleStrip,
            Some(wgpu::IndexFormat::Uint32),
            Some(wgpu::Face::Back),
        ),
        Topology::Lines => (wgpu::PrimitiveTopology::LineList, None, None),
        Topology::LineStrip => (
            wgpu::PrimitiveTopology::LineStrip,
            Some(wgpu::IndexFormat::Uint32),
            None,
        ),
        Topology::Points => (wgpu::PrimitiveTopology::PointList, None, None),
    };
    wgpu::PrimitiveState {
        topology,
        strip_index_format,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        ..Default::default()
    }
}

/// Shader module for a program. Both stages live in one module so the
/// fragment stage sees the vertex output struct.
pub fn create_module(device: &wgpu::Device, source: &ProgramSource) -> wgpu::ShaderModule {
    let code = format!("{}\n{}", source.vertex, source.fragment);
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&source.label),
        source: wgpu::ShaderSource::Wgsl(code.into()),
    })
}

pub fn create_pipeline(
    device: &wgpu::Device,
    layouts: &Layouts,
    module: &wgpu::ShaderModule,
    label: &str,
    topology: Topology,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let attributes = vertex_attributes();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layouts.pipeline),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(ProgramSource::VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(ProgramSource::FRAGMENT_ENTRY),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: primitive_state(topology),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_follow_mesh_layout() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs[5].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[5].offset, 60);
        assert_eq!(attrs[2].shader_location, 2);
    }

    #[test]
    fn strips_need_an_index_format() {
        assert!(primitive_state(Topology::TriangleStrip).strip_index_format.is_some());
        assert!(primitive_state(Topology::Triangles).strip_index_format.is_none());
        assert!(primitive_state(Topology::Lines).cull_mode.is_none());
    }
}
