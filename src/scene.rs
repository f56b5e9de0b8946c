//! The one-mesh scene: setup, per-frame update and input handling.
//!
//! A [`Scene`] walks through [`Phase::Uninitialized`], [`Phase::Ready`],
//! [`Phase::Rendering`] and finally [`Phase::Terminated`]. Everything it
//! acquires from the backend during [`Scene::setup`] is released again by
//! [`Scene::shutdown`], or on drop.

use std::path::PathBuf;

use cgmath::{Deg, Matrix4, Point3, Vector3};

use crate::{
    backend::{GpuBackend, UniformValue, VertexArrayHandle, VertexAttribute, VertexLayout},
    data_structures::{
        mesh::{Mesh, VERTEX_STRIDE},
        render_state::{RenderState, Rotation},
    },
    error::{Error, Result},
    input::{Action, InputEvent, KeyBindings, LightDrag},
    resources::{
        load_mesh,
        shader::{self, ShaderFile, ShaderProgram},
        texture::{COLOR_MAP_UNIT, NORMAL_MAP_UNIT, load_texture},
    },
};

/// WGPU clip space has z in `[0, 1]`, cgmath projections produce `[-1, 1]`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const FOV_Y: Deg<f32> = Deg(45.0);
pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 10.0;
pub const EYE: [f32; 3] = [3.0, 3.0, 3.0];

/// Uniforms the scene feeds. Programs may leave any of them out.
pub const UNIFORMS: [&str; 10] = [
    "ProjMatrix",
    "ViewMatrix",
    "ModelMatrix",
    "ColorMap",
    "NormalMap",
    "UseColorMap",
    "AmbientColor",
    "LightPos",
    "LightColor",
    "LightPower",
];

/// Vertex inputs with their component count and offset within a vertex, in floats.
pub const ATTRIBUTES: [(&str, u32, u64); 3] = [
    ("MCVertex", 3, 0),
    ("MCNormal", 3, 3),
    ("TexCoord0", 2, 6),
];

#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    pub model: PathBuf,
    pub shaders: Vec<ShaderFile>,
    pub color_map: Option<PathBuf>,
    pub normal_map: Option<PathBuf>,
    pub rotation: Rotation,
    pub light_drag: LightDrag,
    pub bindings: KeyBindings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            model: "assets/models/cube.ply".into(),
            shaders: shader::group("assets/shaders/normalmap"),
            color_map: None,
            normal_map: None,
            rotation: Rotation::default(),
            light_drag: LightDrag::default(),
            bindings: KeyBindings::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    Rendering,
    Terminated,
}

#[derive(Debug)]
struct Loaded {
    program: ShaderProgram,
    vertex_array: VertexArrayHandle,
    index_count: u32,
}

pub struct Scene<B: GpuBackend> {
    config: SceneConfig,
    backend: B,
    phase: Phase,
    state: RenderState,
    mesh: Option<Mesh>,
    loaded: Option<Loaded>,
    quit: bool,
}

impl<B: GpuBackend> Scene<B> {
    pub fn new(config: SceneConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            phase: Phase::Uninitialized,
            state: RenderState::default(),
            mesh: None,
            loaded: None,
            quit: false,
        }
    }

    /// Load the mesh, program and textures and upload them.
    ///
    /// On failure everything acquired so far is released and the scene stays
    /// uninitialized. A scene that is already set up is left as it is; a
    /// terminated scene fails with [`Error::Terminated`].
    pub fn setup(&mut self, viewport: (u32, u32)) -> Result<()> {
        match self.phase {
            Phase::Uninitialized => {}
            Phase::Ready | Phase::Rendering => {
                log::warn!("setup called in phase {:?}", self.phase);
                return Ok(());
            }
            Phase::Terminated => return Err(Error::Terminated),
        }
        self.state.viewport = viewport;

        let mesh = load_mesh(&self.config.model)?;
        let sources = self
            .config
            .shaders
            .iter()
            .map(ShaderFile::load)
            .collect::<Result<Vec<_>>>()?;
        let mut program = ShaderProgram::build(&mut self.backend, &sources)?;

        let vertex_array = match self.upload(&mut program, &mesh) {
            Ok(vertex_array) => vertex_array,
            Err(e) => {
                program.release(&mut self.backend);
                return Err(e);
            }
        };

        self.loaded = Some(Loaded {
            program,
            vertex_array,
            index_count: mesh.index_count(),
        });
        self.mesh = Some(mesh);
        self.push_static_uniforms();
        self.push_frame_uniforms();
        self.phase = Phase::Ready;
        Ok(())
    }

    fn upload(&mut self, program: &mut ShaderProgram, mesh: &Mesh) -> Result<VertexArrayHandle> {
        program.resolve_uniforms(&self.backend, &UNIFORMS);

        let textures = [
            (self.config.color_map.as_ref(), COLOR_MAP_UNIT, false),
            (self.config.normal_map.as_ref(), NORMAL_MAP_UNIT, true),
        ];
        for (path, unit, is_normal_map) in textures {
            let Some(path) = path else {
                continue;
            };
            let texture = load_texture(&mut self.backend, path, unit, is_normal_map)?;
            if let Some(previous) = program.attach_texture(unit, texture) {
                self.backend.delete_texture(previous);
            }
        }

        let float_size = std::mem::size_of::<f32>() as u64;
        let mut layout = VertexLayout {
            stride: VERTEX_STRIDE as u64 * float_size,
            attributes: Vec::with_capacity(ATTRIBUTES.len()),
        };
        for (name, components, offset) in ATTRIBUTES {
            match self.backend.attrib_location(program.id, name) {
                Some(location) => layout.attributes.push(VertexAttribute {
                    location,
                    components,
                    offset: offset * float_size,
                }),
                None => log::debug!("vertex input '{name}' is not used by the program"),
            }
        }

        self.backend
            .create_vertex_array(program.id, &mesh.vertex_data, &mesh.face_data, &layout)
            .map_err(|log| Error::ShaderLink {
                log: format!("{log}\n{}", describe_layout(&layout)),
            })
    }

    /// Advance the animation by `dt` seconds and draw one frame.
    pub fn tick(&mut self, dt: f32) {
        match self.phase {
            Phase::Ready => self.phase = Phase::Rendering,
            Phase::Rendering => {}
            Phase::Uninitialized | Phase::Terminated => return,
        }
        self.state.advance(dt, self.config.rotation.rates());
        self.push_frame_uniforms();

        let Some(loaded) = &self.loaded else {
            return;
        };
        let [r, g, b, _] = self.state.ambient_color;
        self.backend.clear([r, g, b, 1.0]);
        loaded.program.bind_textures(&mut self.backend);
        self.backend.draw_indexed(loaded.program.id, loaded.vertex_array, loaded.index_count);
        self.backend.present();
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyReleased(key) => match self.config.bindings.action(key) {
                Some(Action::Quit) => self.quit = true,
                Some(action) => action.apply(&mut self.state),
                None => {}
            },
            InputEvent::CursorMoved { x, y } => {
                if self.config.light_drag.follows_cursor(self.state.left_button_down) {
                    self.state.place_light(x, y);
                }
            }
            InputEvent::MouseButton { button, pressed } => {
                if button == winit::event::MouseButton::Left {
                    self.state.left_button_down = pressed;
                }
            }
            InputEvent::CloseRequested => self.quit = true,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.state.viewport = (width, height);
        self.backend.resize(width, height);
        if let Some(loaded) = &self.loaded {
            let projection = projection_matrix(self.state.aspect_ratio());
            loaded.program.set(&mut self.backend, "ProjMatrix", mat4(projection));
        }
    }

    /// Release every backend resource the scene holds. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            self.backend.delete_vertex_array(loaded.vertex_array);
            loaded.program.release(&mut self.backend);
            log::info!("scene resources released");
        }
        self.phase = Phase::Terminated;
    }

    fn push_static_uniforms(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let program = &loaded.program;
        let backend = &mut self.backend;
        program.set(backend, "ProjMatrix", mat4(projection_matrix(self.state.aspect_ratio())));
        program.set(backend, "ViewMatrix", mat4(view_matrix()));
        program.set(backend, "ModelMatrix", mat4(self.state.model_matrix));
        program.set(backend, "ColorMap", UniformValue::Sampler(COLOR_MAP_UNIT));
        program.set(backend, "NormalMap", UniformValue::Sampler(NORMAL_MAP_UNIT));
        let use_color_map = self.config.color_map.is_some() as i32;
        program.set(backend, "UseColorMap", UniformValue::Int(use_color_map));
    }

    fn push_frame_uniforms(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let program = &loaded.program;
        let backend = &mut self.backend;
        let state = &self.state;
        program.set(backend, "ModelMatrix", mat4(state.model_matrix));
        program.set(backend, "AmbientColor", UniformValue::Vec4(state.ambient_color));
        program.set(backend, "LightPos", UniformValue::Vec3(state.light_position.into()));
        program.set(backend, "LightColor", UniformValue::Vec4(state.light_color));
        program.set(backend, "LightPower", UniformValue::Float(state.light_power));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn program(&self) -> Option<&ShaderProgram> {
        self.loaded.as_ref().map(|loaded| &loaded.program)
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.loaded.as_ref().map(|loaded| loaded.vertex_array)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GpuBackend> Drop for Scene<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn projection_matrix(aspect: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::perspective(FOV_Y, aspect, Z_NEAR, Z_FAR)
}

pub fn view_matrix() -> Matrix4<f32> {
    Matrix4::look_at_rh(Point3::from(EYE), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y())
}

/// One line naming the vertex buffer layout the mesh was uploaded with.
fn describe_layout(layout: &VertexLayout) -> String {
    let attributes: Vec<String> = ATTRIBUTES
        .iter()
        .map(|&(name, components, offset)| {
            let location = layout
                .attributes
                .iter()
                .find(|a| a.offset == offset * std::mem::size_of::<f32>() as u64)
                .map(|a| format!("location {}", a.location))
                .unwrap_or_else(|| "unused".to_string());
            format!("{name} ({components} floats at float {offset}, {location})")
        })
        .collect();
    format!(
        "note: the mesh supplies a {}-byte stride with {}",
        layout.stride,
        attributes.join(", ")
    )
}

fn mat4(m: Matrix4<f32>) -> UniformValue {
    UniformValue::Mat4(m.into())
}
