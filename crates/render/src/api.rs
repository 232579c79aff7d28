use crate::uniforms::{MAX_UNIFORM_BLOCK_SIZE, UniformDecl, UniformLayout, UniformLocation, UniformValue};
use flyby_common::{BufferId, ProgramId, TextureId, VertexArrayId};
use flyby_scene::VertexAttribute;
use std::fmt;
use thiserror::Error;

/// Errors a caller has to handle. Everything else a backend reports is
/// logged and skipped.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("program `{label}` has an empty {stage} stage")]
    EmptySource { label: String, stage: ShaderStage },
    #[error("failed to compile {stage} shader of `{label}`: {message}")]
    ShaderCompile {
        label: String,
        stage: ShaderStage,
        message: String,
    },
    #[error("failed to link program `{label}`: {message}")]
    ProgramLink { label: String, message: String },
    #[error("uniform block of `{label}` is {size} bytes, the limit is {limit}")]
    UniformBlockTooLarge {
        label: String,
        size: usize,
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Source and interface of a shader program.
///
/// Both stages are WGSL with entry points `vs_main` and `fs_main`. Uniforms
/// are packed into one block at group 0 in declaration order; samplers are
/// addressed by name and receive their texture unit as an `Int` uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
    pub uniforms: Vec<UniformDecl>,
    pub samplers: Vec<String>,
}

impl ProgramSource {
    pub const VERTEX_ENTRY: &'static str = "vs_main";
    pub const FRAGMENT_ENTRY: &'static str = "fs_main";

    /// Checks every backend runs before handing the source to a compiler.
    pub fn validate(&self) -> Result<UniformLayout, RenderError> {
        for (stage, source, entry) in [
            (ShaderStage::Vertex, &self.vertex, Self::VERTEX_ENTRY),
            (ShaderStage::Fragment, &self.fragment, Self::FRAGMENT_ENTRY),
        ] {
            if source.trim().is_empty() {
                return Err(RenderError::EmptySource {
                    label: self.label.clone(),
                    stage,
                });
            }
            if !source.contains(entry) {
                return Err(RenderError::ShaderCompile {
                    label: self.label.clone(),
                    stage,
                    message: format!("missing entry point `{entry}`"),
                });
            }
        }

        let mut names: Vec<&str> = self
            .uniforms
            .iter()
            .map(|u| u.name.as_str())
            .chain(self.samplers.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(RenderError::ProgramLink {
                label: self.label.clone(),
                message: format!("`{}` is declared twice", pair[0]),
            });
        }

        let layout = UniformLayout::new(&self.uniforms);
        if layout.size() > MAX_UNIFORM_BLOCK_SIZE {
            return Err(RenderError::UniformBlockTooLarge {
                label: self.label.clone(),
                size: layout.size(),
                limit: MAX_UNIFORM_BLOCK_SIZE,
            });
        }
        Ok(layout)
    }

    /// Location index of `name`: block uniforms first, then samplers.
    pub fn location_index(&self, name: &str) -> Option<u32> {
        if let Some(i) = self.uniforms.iter().position(|u| u.name == name) {
            return Some(i as u32);
        }
        self.samplers
            .iter()
            .position(|s| s == name)
            .map(|i| (self.uniforms.len() + i) as u32)
    }
}

/// Primitive assembly for indexed draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// Renderer-wide settings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderSettings {
    pub topology: Topology,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
    Storage,
}

/// Decoded RGBA8 pixels, rows bottom-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// A `width` x `height` image filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// The graphics capability surface the renderer drives.
///
/// The call shape is immediate-mode: bind state, then draw. Backends are free
/// to record and replay. Only program creation reports errors; every other
/// failure is logged by the backend and the call is ignored.
pub trait GraphicsApi {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, RenderError>;
    fn is_program(&self, program: ProgramId) -> bool;
    fn use_program(&mut self, program: ProgramId);
    /// `None` when the program is unknown or does not declare `name`.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn create_vertex_array(&mut self) -> VertexArrayId;
    /// `None` unbinds.
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);
    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId;
    /// Attach `buffer` to the bound vertex array (vertex and index targets).
    fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferId);
    /// Declare attribute `slot` of the bound vertex array.
    fn vertex_attribute(&mut self, slot: u32, attribute: VertexAttribute, stride: u32);
    fn is_buffer(&self, buffer: BufferId) -> bool;
    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    /// Bind a storage buffer to an indexed binding point.
    fn bind_buffer_base(&mut self, binding: u32, buffer: BufferId);

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureId;
    fn is_texture(&self, texture: TextureId) -> bool;
    fn active_texture(&mut self, unit: u32);
    /// Bind `texture` to the active unit.
    fn bind_texture(&mut self, texture: TextureId);

    fn draw_elements(&mut self, topology: Topology, count: u32);
    fn draw_elements_instanced(&mut self, topology: Topology, count: u32, instances: u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::UniformKind;

    fn source() -> ProgramSource {
        ProgramSource {
            label: "test".into(),
            vertex: "@vertex fn vs_main() {}".into(),
            fragment: "@fragment fn fs_main() {}".into(),
            uniforms: vec![
                UniformDecl::new("projection", UniformKind::Mat4),
                UniformDecl::new("tint", UniformKind::Vec4),
            ],
            samplers: vec!["texture_diffuse_0".into()],
        }
    }

    #[test]
    fn valid_source_yields_layout() {
        let layout = source().validate().unwrap();
        assert_eq!(layout.size(), 80);
    }

    #[test]
    fn empty_stage_is_rejected() {
        let mut src = source();
        src.fragment = "  ".into();
        assert!(matches!(
            src.validate(),
            Err(RenderError::EmptySource {
                stage: ShaderStage::Fragment,
                ..
            })
        ));
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let mut src = source();
        src.vertex = "@vertex fn main() {}".into();
        let err = src.validate().unwrap_err();
        assert!(err.to_string().contains("vs_main"));
    }

    #[test]
    fn duplicate_names_fail_to_link() {
        let mut src = source();
        src.samplers.push("tint".into());
        assert!(matches!(src.validate(), Err(RenderError::ProgramLink { .. })));
    }

    #[test]
    fn oversized_block_is_rejected() {
        let mut src = source();
        src.uniforms = (0..5)
            .map(|i| UniformDecl::new(format!("m{i}"), UniformKind::Mat4))
            .collect();
        assert!(matches!(
            src.validate(),
            Err(RenderError::UniformBlockTooLarge { size: 320, .. })
        ));
    }

    #[test]
    fn samplers_come_after_block_uniforms() {
        let src = source();
        assert_eq!(src.location_index("projection"), Some(0));
        assert_eq!(src.location_index("tint"), Some(1));
        assert_eq!(src.location_index("texture_diffuse_0"), Some(2));
        assert_eq!(src.location_index("missing"), None);
    }

    #[test]
    fn solid_image_size() {
        let img = ImageData::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(img.pixels.len(), 24);
        assert_eq!(&img.pixels[20..], &[1, 2, 3, 4]);
    }
}
