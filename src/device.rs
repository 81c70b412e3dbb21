//! The handful of graphics primitives the particle code talks to.
//!
//! The wgpu backend in [`crate::gpu`] implements [`GraphicsDevice`]; the
//! tests use a recording fake. Handles are plain indices into the backend's
//! own tables, the same way GL object names work.

use glam::{Mat4, Vec2, Vec3, Vec4};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// A resolved uniform slot within one program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub slot: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 3] =
        [ShaderStage::Vertex, ShaderStage::Fragment, ShaderStage::Geometry];

    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
            ShaderStage::Geometry => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// `src * alpha + dst * (1 - alpha)`
    #[default]
    Alpha,
    /// `src * alpha + dst`, used for glowing particles
    Additive,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    /// Raw little-endian bytes as laid out in a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Int(v) => v.to_le_bytes().to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            UniformValue::Mat4(m) => bytemuck::cast_slice(&m.to_cols_array()).to_vec(),
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

/// Outcome of a compile or link step, with whatever log the backend produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    pub success: bool,
    pub log: String,
}

impl BuildReport {
    pub fn ok() -> Self {
        Self { success: true, log: String::new() }
    }

    pub fn failed(log: impl Into<String>) -> Self {
        Self { success: false, log: log.into() }
    }
}

pub trait GraphicsDevice {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle;
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Always hands back a shader object, even when compilation failed.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> (ShaderHandle, BuildReport);
    /// Always hands back a program object, even when linking failed.
    fn link_program(&mut self, shaders: &[ShaderHandle]) -> (ProgramHandle, BuildReport);
    fn use_program(&mut self, program: ProgramHandle);

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    /// Writing to `None` is a no-op, like GL's location -1.
    fn set_uniform(&mut self, location: Option<UniformLocation>, value: UniformValue);

    fn set_blend_mode(&mut self, mode: BlendMode);
    fn draw_triangles(&mut self, buffer: BufferHandle, first: u32, count: u32);
}
