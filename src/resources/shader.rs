//! Shader sources and linked shader programs.
//!
//! A [`ShaderProgram`] is built from any number of [`ShaderSource`]s (in
//! practice one vertex and one fragment stage). Per-stage shader objects only
//! live for the duration of [`ShaderProgram::build`]; uniform locations are
//! resolved once after linking and cached on the program.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use crate::{
    backend::{
        GpuBackend, ProgramHandle, ShaderHandle, ShaderStage, TextureHandle, UniformLocation,
        UniformValue,
    },
    error::{Error, Result},
};

use super::load_string;

/// WGSL source code for one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    /// File path or label used in diagnostics.
    pub origin: String,
    pub code: String,
}

impl ShaderSource {
    pub fn new(stage: ShaderStage, origin: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            stage,
            origin: origin.into(),
            code: code.into(),
        }
    }

    pub fn from_path(stage: ShaderStage, path: &Path) -> Result<Self> {
        let code = load_string(path)?;
        Ok(Self::new(stage, path.display().to_string(), code))
    }
}

/// A shader file on disk and the stage it is compiled for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderFile {
    pub stage: ShaderStage,
    pub path: PathBuf,
}

impl ShaderFile {
    pub fn new(stage: ShaderStage, path: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            path: path.into(),
        }
    }

    pub fn load(&self) -> Result<ShaderSource> {
        ShaderSource::from_path(self.stage, &self.path)
    }
}

/// The vertex and fragment file of a shader group: `<base>.vert.wgsl` and `<base>.frag.wgsl`.
pub fn group(base: &str) -> Vec<ShaderFile> {
    vec![
        ShaderFile::new(ShaderStage::Vertex, format!("{base}.vert.wgsl")),
        ShaderFile::new(ShaderStage::Fragment, format!("{base}.frag.wgsl")),
    ]
}

#[derive(Debug)]
pub struct ShaderProgram {
    pub id: ProgramHandle,
    pub uniform_locations: HashMap<String, UniformLocation>,
    pub bound_textures: BTreeMap<u32, TextureHandle>,
}

impl ShaderProgram {
    /// Compile every source, then link them into one program.
    ///
    /// The shader objects are deleted again whether or not this succeeds.
    pub fn build<B: GpuBackend + ?Sized>(
        backend: &mut B,
        sources: &[ShaderSource],
    ) -> Result<Self> {
        let mut shaders = Vec::with_capacity(sources.len());
        for source in sources {
            match backend.compile_shader(source.stage, &source.code, &source.origin) {
                Ok(shader) => shaders.push(shader),
                Err(log) => {
                    delete_shaders(backend, &shaders);
                    return Err(Error::ShaderCompile {
                        origin: source.origin.clone(),
                        log,
                    });
                }
            }
        }

        let linked = backend.link_program(&shaders);
        delete_shaders(backend, &shaders);
        let id = linked.map_err(|log| Error::ShaderLink { log })?;

        let origins: Vec<&str> = sources.iter().map(|s| s.origin.as_str()).collect();
        log::info!("linked program {} from {}", id.0, origins.join(", "));
        Ok(Self {
            id,
            uniform_locations: HashMap::new(),
            bound_textures: BTreeMap::new(),
        })
    }

    /// Look up and cache the locations of `names`. Names the program does not
    /// declare are skipped.
    pub fn resolve_uniforms<B: GpuBackend + ?Sized>(&mut self, backend: &B, names: &[&str]) {
        for &name in names {
            match backend.uniform_location(self.id, name) {
                Some(location) => {
                    self.uniform_locations.insert(name.to_string(), location);
                }
                None => log::debug!("uniform '{name}' is not used by program {}", self.id.0),
            }
        }
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniform_locations.get(name).copied()
    }

    /// Set a cached uniform. Returns `false` when the program does not use it.
    pub fn set<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        name: &str,
        value: UniformValue,
    ) -> bool {
        match self.uniform(name) {
            Some(location) => {
                backend.set_uniform(self.id, location, value);
                true
            }
            None => false,
        }
    }

    /// Attach `texture` to `unit`, returning the texture it replaces.
    pub fn attach_texture(&mut self, unit: u32, texture: TextureHandle) -> Option<TextureHandle> {
        self.bound_textures.insert(unit, texture)
    }

    /// Bind every attached texture to its unit.
    pub fn bind_textures<B: GpuBackend + ?Sized>(&self, backend: &mut B) {
        for (&unit, &texture) in &self.bound_textures {
            backend.bind_texture(unit, texture);
        }
    }

    /// Delete the attached textures and the program itself.
    pub fn release<B: GpuBackend + ?Sized>(self, backend: &mut B) {
        for texture in self.bound_textures.into_values() {
            backend.delete_texture(texture);
        }
        backend.delete_program(self.id);
    }
}

fn delete_shaders<B: GpuBackend + ?Sized>(backend: &mut B, shaders: &[ShaderHandle]) {
    for &shader in shaders {
        backend.delete_shader(shader);
    }
}
