//! The GPU backend the scene issues its commands to.
//!
//! [`GpuBackend`] is a small, handle based command surface: compile and link
//! shader programs, set uniforms, upload textures and vertex arrays, then clear,
//! bind, draw and present once per frame. Two implementations exist:
//!
//! - [`gpu::WgpuBackend`] renders through WGPU into the window surface
//! - [`headless::HeadlessBackend`] needs no GPU; it runs the same shader
//!   compiler and linker, keeps uniforms and textures in memory and records
//!   every frame command, which is what the tests and `--check` use
//!
//! Both share the WGSL front end in [`reflect`], so a shader that links
//! headlessly links on the GPU and reports the same diagnostics.

pub mod gpu;
pub mod headless;
pub mod reflect;

use crate::data_structures::texture::TextureImage;

pub use reflect::{AttributeInfo, ProgramLayout, UniformInfo, UniformKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub(crate) u32);

/// Where a uniform lives in a linked program: its bind group and binding slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation {
    pub group: u32,
    pub binding: u32,
}

impl std::fmt::Display for UniformLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group {} binding {}", self.group, self.binding)
    }
}

/// A value pushed to a uniform.
///
/// `Sampler` assigns the texture unit a texture uniform samples from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Mat4([[f32; 4]; 4]),
    Vec4([f32; 4]),
    Vec3([f32; 3]),
    Float(f32),
    Int(i32),
    Sampler(u32),
}

impl UniformValue {
    /// The bytes written to the uniform buffer, padded to 16 bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = match self {
            UniformValue::Mat4(m) => bytemuck::cast_slice(m).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Float(f) => f.to_ne_bytes().to_vec(),
            UniformValue::Int(i) => i.to_ne_bytes().to_vec(),
            UniformValue::Sampler(unit) => unit.to_ne_bytes().to_vec(),
        };
        bytes.resize(bytes.len().next_multiple_of(16), 0);
        bytes
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SamplerWrap {
    Clamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: SamplerFilter,
    pub wrap: SamplerWrap,
}

impl SamplerDesc {
    /// Linear min/mag filtering, clamp-to-edge wrapping, no mipmaps.
    pub const BILINEAR_CLAMP: SamplerDesc = SamplerDesc {
        filter: SamplerFilter::Linear,
        wrap: SamplerWrap::Clamp,
    };
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::BILINEAR_CLAMP
    }
}

/// One float attribute inside an interleaved vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of `f32` components (1 to 4).
    pub components: u32,
    /// Offset from the start of the vertex, in bytes.
    pub offset: u64,
}

/// Layout of an interleaved `f32` vertex buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    /// Bytes between consecutive vertices.
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Commands the scene issues to a graphics API.
///
/// Setup calls (`compile_shader`, `link_program`, `create_vertex_array`)
/// report failures as the backend's diagnostic text; the shader builder
/// turns those into [`crate::Error`]s. Per-frame calls have no error path.
pub trait GpuBackend {
    /// Compile one stage. `Err` carries the compiler log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str, label: &str)
    -> Result<ShaderHandle, String>;

    fn delete_shader(&mut self, shader: ShaderHandle);

    /// Link compiled stages into a program. `Err` carries the linker log.
    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String>;

    fn delete_program(&mut self, program: ProgramHandle);

    /// `None` when the linked program does not declare `name`.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    /// `None` when the program's vertex stage has no input called `name`.
    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    );

    /// Upload `image` into a new texture and bind it to `unit`.
    fn create_texture(
        &mut self,
        unit: u32,
        image: &TextureImage,
        sampler: SamplerDesc,
        is_normal_map: bool,
    ) -> TextureHandle;

    fn delete_texture(&mut self, texture: TextureHandle);

    /// Upload vertex and index data for drawing with `program`.
    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: &[f32],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, String>;

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Start a frame by clearing color to `color` and depth to 1.0.
    fn clear(&mut self, color: [f32; 4]);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// Draw `index_count` indices of `vertex_array` as a triangle list.
    fn draw_indexed(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        index_count: u32,
    );

    fn present(&mut self);

    fn resize(&mut self, width: u32, height: u32);
}
