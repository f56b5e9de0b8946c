//! A [`GpuBackend`] that needs no GPU.
//!
//! Shaders go through the same WGSL compiler and linker as on the GPU, so
//! diagnostics are identical. Uniform values and texture uploads are kept in
//! memory and every per-frame call is appended to a command list that can be
//! inspected afterwards.

use std::collections::{BTreeMap, HashMap};

use super::{
    GpuBackend, ProgramHandle, SamplerDesc, ShaderHandle, ShaderStage, TextureHandle,
    UniformLocation, UniformValue, VertexArrayHandle, VertexLayout,
    reflect::{self, CompiledShader, ProgramLayout},
};
use crate::data_structures::texture::TextureImage;

/// One recorded frame command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Clear([f32; 4]),
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    Draw {
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        index_count: u32,
    },
    Present,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureInfo {
    pub unit: u32,
    pub width: u32,
    pub height: u32,
    pub sampler: SamplerDesc,
    pub is_normal_map: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexArrayInfo {
    pub program: ProgramHandle,
    pub vertex_count: usize,
    pub index_count: usize,
    pub layout: VertexLayout,
}

#[derive(Debug)]
struct Program {
    layout: ProgramLayout,
    values: HashMap<UniformLocation, UniformValue>,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    shaders: HashMap<u32, CompiledShader>,
    programs: HashMap<u32, Program>,
    textures: HashMap<u32, TextureInfo>,
    units: BTreeMap<u32, TextureHandle>,
    vertex_arrays: HashMap<u32, VertexArrayInfo>,
    commands: Vec<Command>,
    viewport: (u32, u32),
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// `(program, vertex array, index count)` of every recorded draw.
    pub fn draw_calls(&self) -> Vec<(ProgramHandle, VertexArrayHandle, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match *c {
                Command::Draw {
                    program,
                    vertex_array,
                    index_count,
                } => Some((program, vertex_array, index_count)),
                _ => None,
            })
            .collect()
    }

    pub fn frames_presented(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Present))
            .count()
    }

    /// The last value stored for the uniform called `name`.
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
        let program = self.programs.get(&program.0)?;
        let info = program.layout.uniform(name)?;
        program.values.get(&info.location).copied()
    }

    pub fn layout(&self, program: ProgramHandle) -> Option<&ProgramLayout> {
        self.programs.get(&program.0).map(|p| &p.layout)
    }

    pub fn texture_info(&self, texture: TextureHandle) -> Option<&TextureInfo> {
        self.textures.get(&texture.0)
    }

    pub fn texture_on_unit(&self, unit: u32) -> Option<TextureHandle> {
        self.units.get(&unit).copied()
    }

    pub fn vertex_array_info(&self, vertex_array: VertexArrayHandle) -> Option<&VertexArrayInfo> {
        self.vertex_arrays.get(&vertex_array.0)
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

impl GpuBackend for HeadlessBackend {
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
        label: &str,
    ) -> Result<ShaderHandle, String> {
        let compiled = reflect::compile(stage, source, label)?;
        let id = self.next_id();
        self.shaders.insert(id, compiled);
        Ok(ShaderHandle(id))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String> {
        let mut stages = Vec::with_capacity(shaders.len());
        for handle in shaders {
            let shader = self
                .shaders
                .get(&handle.0)
                .ok_or_else(|| format!("error: shader {} does not exist", handle.0))?;
            stages.push(shader);
        }
        let layout = reflect::link(&stages)?;
        let id = self.next_id();
        self.programs.insert(
            id,
            Program {
                layout,
                values: HashMap::new(),
            },
        );
        Ok(ProgramHandle(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.layout(program)?.uniform(name).map(|info| info.location)
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.layout(program)?
            .attributes
            .get(name)
            .map(|attribute| attribute.location)
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(program) = self.programs.get_mut(&program.0) else {
            log::warn!("set_uniform on deleted program {}", program.0);
            return;
        };
        match program.layout.uniform_at(location) {
            Some((_, info)) if info.kind.accepts(&value) => {
                program.values.insert(location, value);
            }
            Some((name, info)) => {
                log::warn!("ignoring {value:?} for uniform '{name}' of type {:?}", info.kind)
            }
            None => log::warn!(
                "no uniform at group {} binding {}",
                location.group,
                location.binding
            ),
        }
    }

    fn create_texture(
        &mut self,
        unit: u32,
        image: &TextureImage,
        sampler: SamplerDesc,
        is_normal_map: bool,
    ) -> TextureHandle {
        let id = self.next_id();
        self.textures.insert(
            id,
            TextureInfo {
                unit,
                width: image.width,
                height: image.height,
                sampler,
                is_normal_map,
            },
        );
        let handle = TextureHandle(id);
        self.units.insert(unit, handle);
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.units.retain(|_, bound| *bound != texture);
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: &[f32],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, String> {
        let program_layout = self
            .layout(program)
            .ok_or_else(|| format!("error: program {} does not exist", program.0))?;
        for (name, attribute) in &program_layout.attributes {
            if !layout
                .attributes
                .iter()
                .any(|a| a.location == attribute.location)
            {
                return Err(format!(
                    "error: vertex input '{name}' (location {}) is not fed by the vertex buffer",
                    attribute.location
                ));
            }
        }
        let floats_per_vertex = (layout.stride / 4).max(1) as usize;
        let info = VertexArrayInfo {
            program,
            vertex_count: vertices.len() / floats_per_vertex,
            index_count: indices.len(),
            layout: layout.clone(),
        };
        let id = self.next_id();
        self.vertex_arrays.insert(id, info);
        Ok(VertexArrayHandle(id))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.commands.push(Command::Clear(color));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.units.insert(unit, texture);
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn draw_indexed(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        index_count: u32,
    ) {
        match self.vertex_arrays.get(&vertex_array.0) {
            Some(info) if index_count as usize > info.index_count => log::warn!(
                "draw of {index_count} indices exceeds the {} uploaded",
                info.index_count
            ),
            Some(_) => {}
            None => log::warn!("draw with deleted vertex array {}", vertex_array.0),
        }
        self.commands.push(Command::Draw {
            program,
            vertex_array,
            index_count,
        });
    }

    fn present(&mut self) {
        self.commands.push(Command::Present);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }
}
