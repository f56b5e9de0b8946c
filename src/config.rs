//! Command line configuration.
//!
//! [`Cli`] is what clap parses; [`Cli::resolve`] applies the texture and
//! shader group conventions and produces the [`ViewerConfig`] the rest of the
//! program runs from.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    backend::ShaderStage,
    data_structures::render_state::Rotation,
    input::{KeyBindings, LightDrag},
    resources::{
        shader::{self, ShaderFile},
        texture,
    },
    scene::SceneConfig,
};

/// The graphics API WGPU is asked to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum GraphicsApi {
    /// Vulkan, Metal or DX12, whichever the platform has.
    #[default]
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

impl GraphicsApi {
    pub fn backends(&self) -> wgpu::Backends {
        match self {
            GraphicsApi::Auto => wgpu::Backends::PRIMARY,
            GraphicsApi::Vulkan => wgpu::Backends::VULKAN,
            GraphicsApi::Metal => wgpu::Backends::METAL,
            GraphicsApi::Dx12 => wgpu::Backends::DX12,
            GraphicsApi::Gl => wgpu::Backends::GL,
        }
    }
}

/// Device limits requested from the adapter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LimitsProfile {
    #[default]
    Default,
    Downlevel,
    Webgl2,
}

impl LimitsProfile {
    pub fn limits(&self) -> wgpu::Limits {
        match self {
            LimitsProfile::Default => wgpu::Limits::default(),
            LimitsProfile::Downlevel => wgpu::Limits::downlevel_defaults(),
            LimitsProfile::Webgl2 => wgpu::Limits::downlevel_webgl2_defaults(),
        }
    }
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "plyview",
    version,
    about = "View an ASCII PLY model with a live-adjustable light"
)]
pub struct Cli {
    /// Mesh file to display
    #[arg(long, default_value = "assets/models/cube.ply")]
    pub model: PathBuf,

    /// Color map image
    #[arg(long)]
    pub color: Option<PathBuf>,

    /// Normal map image
    #[arg(long)]
    pub normal: Option<PathBuf>,

    /// Texture group: uses <GROUP>.png and, if present, <GROUP>.normal.png
    #[arg(long, value_name = "GROUP", conflicts_with_all = ["color", "normal"])]
    pub textures: Option<String>,

    /// Shader group: uses <BASE>.vert.wgsl and <BASE>.frag.wgsl
    #[arg(long, value_name = "BASE", default_value = "assets/shaders/normalmap")]
    pub shaders: String,

    /// Vertex shader file; overrides the group's vertex stage
    #[arg(long)]
    pub vert: Option<PathBuf>,

    /// Fragment shader file; overrides the group's fragment stage
    #[arg(long)]
    pub frag: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub backend: GraphicsApi,

    #[arg(long, value_enum, default_value_t)]
    pub limits: LimitsProfile,

    #[arg(long, default_value_t = 640, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    #[arg(long, default_value_t = 480, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    #[arg(long)]
    pub fullscreen: bool,

    #[arg(long, value_enum, default_value_t)]
    pub rotation: Rotation,

    #[arg(long, value_enum, default_value_t)]
    pub light_drag: LightDrag,

    /// Load everything and render one frame without a window or GPU, then exit
    #[arg(long)]
    pub check: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphicsConfig {
    pub api: GraphicsApi,
    pub limits: LimitsProfile,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub scene: SceneConfig,
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub check: bool,
}

impl Cli {
    pub fn resolve(self) -> ViewerConfig {
        let (color_map, normal_map) = match &self.textures {
            Some(group) => {
                let (color, normal) = texture::group(group);
                (Some(color), normal)
            }
            None => (self.color.clone(), self.normal.clone()),
        };

        let defaults = shader::group(&self.shaders);
        let mut shaders = Vec::new();
        for (stage, explicit) in [
            (ShaderStage::Vertex, &self.vert),
            (ShaderStage::Fragment, &self.frag),
        ] {
            match explicit {
                Some(path) => shaders.push(ShaderFile::new(stage, path)),
                None => shaders.extend(defaults.iter().filter(|f| f.stage == stage).cloned()),
            }
        }

        let title = format!(
            "plyview - {}",
            self.model
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.model.display().to_string())
        );

        ViewerConfig {
            scene: SceneConfig {
                model: self.model,
                shaders,
                color_map,
                normal_map,
                rotation: self.rotation,
                light_drag: self.light_drag,
                bindings: KeyBindings::default(),
            },
            window: WindowConfig {
                title,
                width: self.width,
                height: self.height,
                fullscreen: self.fullscreen,
            },
            graphics: GraphicsConfig {
                api: self.backend,
                limits: self.limits,
            },
            check: self.check,
        }
    }
}
