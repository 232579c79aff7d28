//! Built-in shader programs.
//!
//! All programs share one binding scheme:
//! - group 0, binding 0: the program's uniform block
//! - group 1, binding 0: per-instance model matrices (storage, read-only)
//! - group 2, bindings 0/1: diffuse texture and its sampler
//!
//! Vertex inputs follow the mesh layout: position, normal, color, tangent,
//! bitangent, uv at locations 0 to 5.

use crate::api::{GraphicsApi, ProgramSource, RenderError};
use crate::uniforms::{UniformDecl, UniformKind};
use flyby_common::ProgramId;
use tracing::{error, info};

/// Binding point of the instance matrix buffer.
pub const INSTANCE_BINDING: u32 = 0;

const LIGHTING: &str = r#"
fn shade(normal: vec3<f32>, color: vec3<f32>) -> vec3<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let ambient = 0.3;
    let diffuse = max(dot(normalize(normal), light_dir), 0.0);
    return color * (ambient + diffuse * 0.7);
}
"#;

const VERTEX_INPUT: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
    @location(5) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec3<f32>,
    @location(2) uv: vec2<f32>,
};
"#;

const BASIC_VS: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    model: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.projection * u.view * u.model * vec4<f32>(vertex.position, 1.0);
    out.normal = (u.model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.color = vertex.color;
    out.uv = vertex.uv;
    return out;
}
"#;

const BASIC_FS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(shade(in.normal, in.color), 1.0);
}
"#;

const INSTANCED_VS: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;

@group(1) @binding(0)
var<storage, read> instances: array<mat4x4<f32>>;

@vertex
fn vs_main(vertex: VertexInput, @builtin(instance_index) instance: u32) -> VertexOutput {
    let model = instances[instance];
    var out: VertexOutput;
    out.clip_position = u.projection * u.view * model * vec4<f32>(vertex.position, 1.0);
    out.normal = (model * vec4<f32>(vertex.normal, 0.0)).xyz;
    out.color = vertex.color;
    out.uv = vertex.uv;
    return out;
}
"#;

const TEXTURED_FS: &str = r#"
@group(2) @binding(0)
var texture_diffuse_0: texture_2d<f32>;
@group(2) @binding(1)
var diffuse_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(texture_diffuse_0, diffuse_sampler, in.uv);
    return vec4<f32>(shade(in.normal, texel.rgb * in.color), texel.a);
}
"#;

const UNLIT_VS: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    model: mat4x4<f32>,
    tint: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.projection * u.view * u.model * vec4<f32>(vertex.position, 1.0);
    out.normal = vertex.normal;
    out.color = vertex.color * u.tint.rgb;
    out.uv = vertex.uv;
    return out;
}
"#;

const UNLIT_FS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

fn program(
    label: &str,
    vs: &str,
    fs: &str,
    uniforms: &[(&str, UniformKind)],
    samplers: &[&str],
) -> ProgramSource {
    // Stages are compiled as one module in the wgpu backend, so each carries
    // the shared declarations it needs.
    ProgramSource {
        label: label.to_string(),
        vertex: format!("{VERTEX_INPUT}{vs}"),
        fragment: format!("{LIGHTING}{fs}"),
        uniforms: uniforms
            .iter()
            .map(|(name, kind)| UniformDecl::new(*name, *kind))
            .collect(),
        samplers: samplers.iter().map(|s| s.to_string()).collect(),
    }
}

/// Lit, vertex-coloured geometry with one model matrix.
pub fn basic() -> ProgramSource {
    program(
        "basic",
        BASIC_VS,
        BASIC_FS,
        &[
            ("projection", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
            ("model", UniformKind::Mat4),
        ],
        &[],
    )
}

/// Like [`basic`] with model matrices read per instance from the buffer at
/// [`INSTANCE_BINDING`].
pub fn basic_instanced() -> ProgramSource {
    program(
        "basic_instanced",
        INSTANCED_VS,
        BASIC_FS,
        &[
            ("projection", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
        ],
        &[],
    )
}

/// [`basic`] modulated by the first diffuse texture.
pub fn textured() -> ProgramSource {
    program(
        "textured",
        BASIC_VS,
        TEXTURED_FS,
        &[
            ("projection", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
            ("model", UniformKind::Mat4),
        ],
        &["texture_diffuse_0"],
    )
}

/// Flat colour times `tint`, no lighting.
pub fn unlit() -> ProgramSource {
    program(
        "unlit",
        UNLIT_VS,
        UNLIT_FS,
        &[
            ("projection", UniformKind::Mat4),
            ("view", UniformKind::Mat4),
            ("model", UniformKind::Mat4),
            ("tint", UniformKind::Vec4),
        ],
        &[],
    )
}

/// Built-in program by name.
pub fn by_name(name: &str) -> Option<ProgramSource> {
    match name {
        "basic" => Some(basic()),
        "basic_instanced" => Some(basic_instanced()),
        "textured" => Some(textured()),
        "unlit" => Some(unlit()),
        _ => None,
    }
}

/// Create `source` on `api`, logging the outcome.
pub fn load_shader(
    api: &mut dyn GraphicsApi,
    source: &ProgramSource,
) -> Result<ProgramId, RenderError> {
    match api.create_program(source) {
        Ok(id) => {
            info!(program = id.0, label = %source.label, "shader loaded");
            Ok(id)
        }
        Err(err) => {
            error!(label = %source.label, "{err}");
            Err(err)
        }
    }
}
