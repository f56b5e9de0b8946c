//! WGSL compilation, linking and reflection shared by every backend.
//!
//! Compiling parses and validates one stage with naga, the shader compiler WGPU
//! itself uses, and renders its diagnostics (with source excerpts) as the
//! compiler log. Linking pairs a vertex and a fragment stage, checks that their
//! interface and resource declarations agree, and produces the
//! [`ProgramLayout`] uniform and attribute lookups are answered from.

use std::collections::BTreeMap;

use naga::{AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner};

use super::{ShaderStage, UniformLocation, UniformValue};

/// A stage that parsed and validated.
#[derive(Debug)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub label: String,
    pub source: String,
    pub entry_point: String,
    pub(crate) module: naga::Module,
}

/// What a uniform binding holds, as far as the viewer can set it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Mat4,
    Vec4,
    Vec3,
    Float,
    Int,
    /// A `texture_2d<f32>`, fed from a texture unit.
    Texture,
    /// A filtering `sampler`, filled in by the backend.
    Sampler,
}

impl UniformKind {
    pub fn accepts(&self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (UniformKind::Mat4, UniformValue::Mat4(_))
                | (UniformKind::Vec4, UniformValue::Vec4(_))
                | (UniformKind::Vec3, UniformValue::Vec3(_))
                | (UniformKind::Float, UniformValue::Float(_))
                | (UniformKind::Int, UniformValue::Int(_))
                | (UniformKind::Texture, UniformValue::Sampler(_))
        )
    }

    /// Size of the backing uniform buffer, `None` for resources.
    pub fn buffer_size(&self) -> Option<u64> {
        match self {
            UniformKind::Mat4 => Some(64),
            UniformKind::Vec4 | UniformKind::Vec3 | UniformKind::Float | UniformKind::Int => {
                Some(16)
            }
            UniformKind::Texture | UniformKind::Sampler => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UniformInfo {
    pub location: UniformLocation,
    pub kind: UniformKind,
    pub in_vertex: bool,
    pub in_fragment: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeInfo {
    pub location: u32,
    pub components: u32,
}

/// Everything a backend needs to know about a linked program.
#[derive(Clone, Debug)]
pub struct ProgramLayout {
    pub vertex_label: String,
    pub vertex_source: String,
    pub vertex_entry: String,
    pub fragment_label: String,
    pub fragment_source: String,
    pub fragment_entry: String,
    pub uniforms: BTreeMap<String, UniformInfo>,
    pub attributes: BTreeMap<String, AttributeInfo>,
}

impl ProgramLayout {
    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.get(name)
    }

    pub fn uniform_at(&self, location: UniformLocation) -> Option<(&str, &UniformInfo)> {
        self.uniforms
            .iter()
            .find(|(_, info)| info.location == location)
            .map(|(name, info)| (name.as_str(), info))
    }

    /// Number of bind groups the pipeline layout needs, gaps included.
    pub fn group_count(&self) -> u32 {
        self.uniforms
            .values()
            .map(|info| info.location.group + 1)
            .max()
            .unwrap_or(0)
    }
}

pub fn compile(stage: ShaderStage, source: &str, label: &str) -> Result<CompiledShader, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .map(|ep| ep.name.clone())
        .ok_or_else(|| format!("error: {label} declares no @{stage} entry point"))?;

    Ok(CompiledShader {
        stage,
        label: label.to_string(),
        source: source.to_string(),
        entry_point,
        module,
    })
}

/// Link one vertex and one fragment stage. The `Err` is the full link log.
pub fn link(shaders: &[&CompiledShader]) -> Result<ProgramLayout, String> {
    let mut log = Vec::new();
    let vertex = single_stage(shaders, ShaderStage::Vertex, &mut log);
    let fragment = single_stage(shaders, ShaderStage::Fragment, &mut log);
    let (Some(vertex), Some(fragment)) = (vertex, fragment) else {
        return Err(log.join("\n"));
    };

    let uniforms = merge_uniforms(&[vertex, fragment], &mut log);
    let attributes = vertex_attributes(vertex, &mut log);
    check_interface(vertex, fragment, &mut log);

    if !log.is_empty() {
        return Err(log.join("\n"));
    }
    Ok(ProgramLayout {
        vertex_label: vertex.label.clone(),
        vertex_source: vertex.source.clone(),
        vertex_entry: vertex.entry_point.clone(),
        fragment_label: fragment.label.clone(),
        fragment_source: fragment.source.clone(),
        fragment_entry: fragment.entry_point.clone(),
        uniforms,
        attributes,
    })
}

fn single_stage<'a>(
    shaders: &[&'a CompiledShader],
    stage: ShaderStage,
    log: &mut Vec<String>,
) -> Option<&'a CompiledShader> {
    let matching: Vec<&CompiledShader> = shaders
        .iter()
        .copied()
        .filter(|s| s.stage == stage)
        .collect();
    match matching.as_slice() {
        [] => {
            log.push(format!("error: no {stage} stage attached"));
            None
        }
        [single] => Some(*single),
        many => {
            let labels: Vec<&str> = many.iter().map(|s| s.label.as_str()).collect();
            log.push(format!(
                "error: {} {stage} stages attached ({}), a program takes exactly one",
                many.len(),
                labels.join(", ")
            ));
            None
        }
    }
}

fn merge_uniforms(
    shaders: &[&CompiledShader],
    log: &mut Vec<String>,
) -> BTreeMap<String, UniformInfo> {
    let mut uniforms: BTreeMap<String, UniformInfo> = BTreeMap::new();
    let mut owners: BTreeMap<UniformLocation, String> = BTreeMap::new();

    for shader in shaders {
        let module = &shader.module;
        for (_, var) in module.global_variables.iter() {
            match var.space {
                AddressSpace::Uniform | AddressSpace::Handle => {}
                AddressSpace::Storage { .. } => {
                    log.push(format!(
                        "error: {}: storage binding '{}' is not supported",
                        shader.label,
                        var.name.as_deref().unwrap_or("?")
                    ));
                    continue;
                }
                _ => continue,
            }
            let Some(binding) = &var.binding else {
                continue;
            };
            let location = UniformLocation {
                group: binding.group,
                binding: binding.binding,
            };
            let name = var
                .name
                .clone()
                .unwrap_or_else(|| format!("<{location}>"));
            let kind = match classify_uniform(&module.types[var.ty].inner) {
                Ok(kind) => kind,
                Err(reason) => {
                    log.push(format!("error: {}: uniform '{name}' {reason}", shader.label));
                    continue;
                }
            };

            if let Some(owner) = owners.get(&location) {
                if *owner != name {
                    log.push(format!(
                        "error: '{name}' and '{owner}' both use group {} binding {}",
                        location.group, location.binding
                    ));
                    continue;
                }
            }

            match uniforms.get_mut(&name) {
                Some(existing) => {
                    if existing.location != location || existing.kind != kind {
                        log.push(format!(
                            "error: uniform '{name}' is declared as {:?} at {} \
                             and as {:?} at {location} in {}",
                            existing.kind, existing.location, kind, shader.label
                        ));
                        continue;
                    }
                    mark_stage(existing, shader.stage);
                }
                None => {
                    let mut info = UniformInfo {
                        location,
                        kind,
                        in_vertex: false,
                        in_fragment: false,
                    };
                    mark_stage(&mut info, shader.stage);
                    owners.insert(location, name.clone());
                    uniforms.insert(name, info);
                }
            }
        }
    }
    uniforms
}

fn mark_stage(info: &mut UniformInfo, stage: ShaderStage) {
    match stage {
        ShaderStage::Vertex => info.in_vertex = true,
        ShaderStage::Fragment => info.in_fragment = true,
    }
}

const SUPPORTED_UNIFORM_TYPES: &str =
    "mat4x4<f32>, vec4<f32>, vec3<f32>, f32, i32, u32, texture_2d<f32> or sampler";

fn classify_uniform(inner: &TypeInner) -> Result<UniformKind, String> {
    match *inner {
        TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Ok(UniformKind::Mat4),
        TypeInner::Vector {
            size: naga::VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => Ok(UniformKind::Vec4),
        TypeInner::Vector {
            size: naga::VectorSize::Tri,
            scalar,
        } if scalar == naga::Scalar::F32 => Ok(UniformKind::Vec3),
        TypeInner::Scalar(scalar) if scalar == naga::Scalar::F32 => Ok(UniformKind::Float),
        TypeInner::Scalar(scalar) if scalar == naga::Scalar::I32 || scalar == naga::Scalar::U32 => {
            Ok(UniformKind::Int)
        }
        TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            class:
                ImageClass::Sampled {
                    kind: ScalarKind::Float,
                    multi: false,
                },
        } => Ok(UniformKind::Texture),
        TypeInner::Sampler { comparison: false } => Ok(UniformKind::Sampler),
        _ => Err(format!(
            "has a type the viewer cannot provide (expected {SUPPORTED_UNIFORM_TYPES})"
        )),
    }
}

/// `(location, name, type)` of every user-defined input or output.
type Varyings = Vec<(u32, String, TypeInner)>;

fn collect_locations(
    module: &naga::Module,
    name: Option<&String>,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Varyings,
) {
    let inner = &module.types[ty].inner;
    match binding {
        Some(Binding::Location { location, .. }) => {
            let name = name.cloned().unwrap_or_else(|| format!("location {location}"));
            out.push((*location, name, inner.clone()));
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = inner {
                for member in members {
                    collect_locations(
                        module,
                        member.name.as_ref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn entry_point<'a>(shader: &'a CompiledShader) -> Option<&'a naga::EntryPoint> {
    shader
        .module
        .entry_points
        .iter()
        .find(|ep| ep.name == shader.entry_point)
}

fn inputs(shader: &CompiledShader) -> Varyings {
    let mut out = Vec::new();
    if let Some(ep) = entry_point(shader) {
        for arg in &ep.function.arguments {
            collect_locations(
                &shader.module,
                arg.name.as_ref(),
                arg.ty,
                arg.binding.as_ref(),
                &mut out,
            );
        }
    }
    out
}

fn outputs(shader: &CompiledShader) -> Varyings {
    let mut out = Vec::new();
    if let Some(result) = entry_point(shader).and_then(|ep| ep.function.result.as_ref()) {
        collect_locations(&shader.module, None, result.ty, result.binding.as_ref(), &mut out);
    }
    out
}

fn vertex_attributes(
    vertex: &CompiledShader,
    log: &mut Vec<String>,
) -> BTreeMap<String, AttributeInfo> {
    let mut attributes = BTreeMap::new();
    for (location, name, inner) in inputs(vertex) {
        let components = match inner {
            TypeInner::Scalar(scalar) if scalar == naga::Scalar::F32 => 1,
            TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => size as u32,
            _ => {
                log.push(format!(
                    "error: {}: vertex input '{name}' must be an f32 scalar or vector",
                    vertex.label
                ));
                continue;
            }
        };
        attributes.insert(name, AttributeInfo { location, components });
    }
    attributes
}

fn check_interface(vertex: &CompiledShader, fragment: &CompiledShader, log: &mut Vec<String>) {
    let written = outputs(vertex);
    for (location, name, inner) in inputs(fragment) {
        match written.iter().find(|(l, _, _)| *l == location) {
            None => log.push(format!(
                "error: fragment input '{name}' (location {location}) is not written \
                 by the vertex stage"
            )),
            Some((_, out_name, out_inner)) if *out_inner != inner => log.push(format!(
                "error: fragment input '{name}' (location {location}) does not match \
                 the type of vertex output '{out_name}'"
            )),
            Some(_) => {}
        }
    }
}
