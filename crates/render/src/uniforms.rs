//! Uniform values, their block layout and the logged `set_uniform` helper.

use crate::api::GraphicsApi;
use flyby_common::ProgramId;
use glam::{Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};
use tracing::error;

/// Largest uniform block a program may declare, in bytes. One block fills one
/// slot of a dynamic-offset uniform buffer.
pub const MAX_UNIFORM_BLOCK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// (size, alignment) in bytes under WGSL host-shareable rules.
    pub fn size_align(self) -> (usize, usize) {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::Bool => (4, 4),
            Self::Vec2 => (8, 8),
            Self::Vec3 => (12, 16),
            Self::Vec4 => (16, 16),
            Self::Mat2 => (16, 8),
            Self::Mat3 => (48, 16),
            Self::Mat4 => (64, 16),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat2(Mat2),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            Self::Float(_) => UniformKind::Float,
            Self::Int(_) => UniformKind::Int,
            Self::UInt(_) => UniformKind::UInt,
            Self::Bool(_) => UniformKind::Bool,
            Self::Vec2(_) => UniformKind::Vec2,
            Self::Vec3(_) => UniformKind::Vec3,
            Self::Vec4(_) => UniformKind::Vec4,
            Self::Mat2(_) => UniformKind::Mat2,
            Self::Mat3(_) => UniformKind::Mat3,
            Self::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Append the value's bytes as laid out in a uniform block.
    ///
    /// Booleans become a `u32`. `Mat3` columns are padded to 16 bytes.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match *self {
            Self::Float(v) => push_floats(out, &[v]),
            Self::Vec2(v) => push_floats(out, &v.to_array()),
            Self::Vec3(v) => push_floats(out, &v.to_array()),
            Self::Vec4(v) => push_floats(out, &v.to_array()),
            Self::Mat2(m) => push_floats(out, &m.to_cols_array()),
            Self::Mat3(m) => {
                for col in [m.x_axis, m.y_axis, m.z_axis] {
                    push_floats(out, &col.extend(0.0).to_array());
                }
            }
            Self::Mat4(m) => push_floats(out, &m.to_cols_array()),
            Self::Int(v) => out.extend_from_slice(&v.to_ne_bytes()),
            Self::UInt(v) => out.extend_from_slice(&v.to_ne_bytes()),
            Self::Bool(v) => out.extend_from_slice(&u32::from(v).to_ne_bytes()),
        }
    }
}

fn push_floats(out: &mut Vec<u8>, values: &[f32]) {
    out.extend_from_slice(bytemuck::cast_slice(values));
}

/// A named uniform in a program's block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub fn new(name: impl Into<String>, kind: UniformKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A resolved uniform: the program it belongs to and its index there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub index: u32,
}

/// Byte offsets of a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<(usize, UniformKind)>,
    size: usize,
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

impl UniformLayout {
    pub fn new(decls: &[UniformDecl]) -> Self {
        let mut cursor = 0;
        let mut max_align = 0;
        let mut fields = Vec::with_capacity(decls.len());
        for decl in decls {
            let (size, align) = decl.kind.size_align();
            let offset = align_up(cursor, align);
            fields.push((offset, decl.kind));
            cursor = offset + size;
            max_align = max_align.max(align);
        }
        let size = if max_align == 0 {
            0
        } else {
            align_up(cursor, max_align)
        };
        Self { fields, size }
    }

    /// Size of the whole block including trailing padding.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self, index: u32) -> Option<usize> {
        self.fields.get(index as usize).map(|(offset, _)| *offset)
    }

    pub fn kind(&self, index: u32) -> Option<UniformKind> {
        self.fields.get(index as usize).map(|(_, kind)| *kind)
    }

    /// Write `value` into `block` at the field `index`. Returns false on an
    /// out-of-range index or a kind mismatch.
    pub fn write(&self, block: &mut [u8], index: u32, value: &UniformValue) -> bool {
        let Some(&(offset, kind)) = self.fields.get(index as usize) else {
            return false;
        };
        if kind != value.kind() {
            return false;
        }
        let mut bytes = Vec::with_capacity(64);
        value.write_to(&mut bytes);
        match block.get_mut(offset..offset + bytes.len()) {
            Some(dst) => {
                dst.copy_from_slice(&bytes);
                true
            }
            None => false,
        }
    }
}

/// Resolve `name` on `program` and set it, logging when either is unknown.
pub fn set_uniform(
    api: &mut dyn GraphicsApi,
    program: ProgramId,
    name: &str,
    value: UniformValue,
) -> bool {
    if !api.is_program(program) {
        error!(program = program.0, uniform = name, "unknown shader id");
        return false;
    }
    let Some(location) = api.uniform_location(program, name) else {
        error!(
            program = program.0,
            "unknown uniform `{name}`, it might have been optimized away"
        );
        return false;
    };
    api.set_uniform(location, value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_follows_wgsl_alignment() {
        let layout = UniformLayout::new(&[
            UniformDecl::new("a", UniformKind::Float),
            UniformDecl::new("b", UniformKind::Vec3),
            UniformDecl::new("c", UniformKind::Vec2),
            UniformDecl::new("d", UniformKind::Mat4),
        ]);
        assert_eq!(layout.offset(0), Some(0));
        assert_eq!(layout.offset(1), Some(16));
        assert_eq!(layout.offset(2), Some(32));
        assert_eq!(layout.offset(3), Some(48));
        assert_eq!(layout.size(), 112);
    }

    #[test]
    fn scalar_block_size_rounds_to_largest_alignment() {
        let layout = UniformLayout::new(&[
            UniformDecl::new("a", UniformKind::Int),
            UniformDecl::new("b", UniformKind::Bool),
            UniformDecl::new("c", UniformKind::Float),
        ]);
        assert_eq!(layout.size(), 12);
        assert_eq!(UniformLayout::new(&[]).size(), 0);
    }

    #[test]
    fn mat3_columns_are_padded() {
        let mut bytes = Vec::new();
        UniformValue::Mat3(Mat3::IDENTITY).write_to(&mut bytes);
        assert_eq!(bytes.len(), 48);
        let floats: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(&floats[..4], &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&floats[4..8], &[0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn write_checks_kind_and_index() {
        let layout = UniformLayout::new(&[
            UniformDecl::new("tint", UniformKind::Vec4),
            UniformDecl::new("flag", UniformKind::Bool),
        ]);
        let mut block = vec![0u8; layout.size()];
        assert!(layout.write(&mut block, 1, &UniformValue::Bool(true)));
        assert_eq!(&block[16..20], &1u32.to_ne_bytes());
        assert!(!layout.write(&mut block, 0, &UniformValue::Float(1.0)));
        assert!(!layout.write(&mut block, 2, &UniformValue::Bool(true)));
    }

    #[test]
    fn every_kind_writes_its_declared_size() {
        let values = [
            UniformValue::Float(1.0),
            UniformValue::Int(-1),
            UniformValue::UInt(1),
            UniformValue::Bool(false),
            UniformValue::Vec2(Vec2::ONE),
            UniformValue::Vec3(Vec3::ONE),
            UniformValue::Vec4(Vec4::ONE),
            UniformValue::Mat2(Mat2::IDENTITY),
            UniformValue::Mat3(Mat3::IDENTITY),
            UniformValue::Mat4(Mat4::IDENTITY),
        ];
        for value in values {
            let mut bytes = Vec::new();
            value.write_to(&mut bytes);
            assert_eq!(bytes.len(), value.kind().size_align().0, "{value:?}");
        }
    }
}
