use std::f32::consts::TAU;

use approx::assert_relative_eq;
use cgmath::{Matrix4, Rad};
use plyview::{
    Error,
    backend::{
        ShaderStage, UniformValue,
        headless::{Command, HeadlessBackend},
    },
    data_structures::render_state::{DEFAULT_LIGHT_POWER, Rotation, rotation_matrix},
    input::{InputEvent, LightDrag},
    resources::shader::ShaderFile,
    scene::{Phase, Scene, projection_matrix},
};
use winit::{event::MouseButton, keyboard::KeyCode};

use crate::common::test_utils::{TempDir, shader_group, triangle_scene};
mod common;

fn ready_scene(dir: &TempDir) -> Scene<HeadlessBackend> {
    let mut scene = Scene::new(triangle_scene(dir), HeadlessBackend::new());
    scene.setup((640, 480)).expect("triangle scene sets up");
    scene
}

fn key(scene: &mut Scene<HeadlessBackend>, code: KeyCode, times: usize) {
    for _ in 0..times {
        scene.handle_input(InputEvent::KeyReleased(code));
    }
}

#[test]
fn one_triangle_renders_one_draw_of_three_indices() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);
    assert_eq!(scene.phase(), Phase::Ready);

    scene.tick(0.016);
    assert_eq!(scene.phase(), Phase::Rendering);

    let backend = scene.backend();
    let program = scene.program().expect("program").id;
    let vertex_array = scene.vertex_array().expect("vertex array");
    assert_eq!(backend.draw_calls(), vec![(program, vertex_array, 3)]);
    assert_eq!(
        backend.commands().first(),
        Some(&Command::Clear([0.2, 0.2, 0.2, 1.0]))
    );
    assert_eq!(backend.commands().last(), Some(&Command::Present));

    let info = backend.vertex_array_info(vertex_array).expect("uploaded");
    assert_eq!(info.vertex_count, 3);
    assert_eq!(info.index_count, 3);
    assert_eq!(info.layout.stride, 32);
    let offsets: Vec<u64> = info.layout.attributes.iter().map(|a| a.offset).collect();
    // The untextured shaders do not read TexCoord0.
    assert_eq!(offsets, vec![0, 12]);
}

#[test]
fn uniforms_are_pushed_every_tick() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.rotation = Rotation::Spin;
    let mut scene = Scene::new(config, HeadlessBackend::new());
    scene.setup((800, 400)).expect("sets up");
    let program = scene.program().expect("program").id;

    assert_eq!(
        scene.backend().uniform_value(program, "ProjMatrix"),
        Some(UniformValue::Mat4(projection_matrix(2.0).into()))
    );

    scene.tick(0.5);
    scene.tick(0.5);
    assert_relative_eq!(scene.state().angles.y, 1.0, epsilon = 1e-6);
    assert_relative_eq!(scene.state().angles.x, 0.0);

    let expected: [[f32; 4]; 4] = rotation_matrix(scene.state().angles).into();
    match scene.backend().uniform_value(program, "ModelMatrix") {
        Some(UniformValue::Mat4(m)) => {
            for (row, expected_row) in m.iter().zip(expected.iter()) {
                for (value, expected_value) in row.iter().zip(expected_row.iter()) {
                    assert_relative_eq!(*value, *expected_value, epsilon = 1e-6);
                }
            }
        }
        other => panic!("unexpected model matrix {other:?}"),
    }
    assert_eq!(
        scene.backend().uniform_value(program, "LightPower"),
        Some(UniformValue::Float(DEFAULT_LIGHT_POWER))
    );
    assert_eq!(scene.backend().frames_presented(), 2);
}

#[test]
fn ambient_stays_clamped_under_any_key_sequence() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);

    key(&mut scene, KeyCode::KeyQ, 25);
    key(&mut scene, KeyCode::KeyS, 7);
    key(&mut scene, KeyCode::KeyE, 3);
    key(&mut scene, KeyCode::KeyD, 40);
    let ambient = scene.state().ambient_color;
    assert_relative_eq!(ambient[0], 1.0);
    assert_relative_eq!(ambient[1], 0.0);
    assert_relative_eq!(ambient[2], 0.0);
    assert_relative_eq!(ambient[3], 1.0);

    let pattern = [
        KeyCode::KeyQ,
        KeyCode::KeyA,
        KeyCode::KeyA,
        KeyCode::KeyW,
        KeyCode::KeyE,
        KeyCode::KeyD,
    ];
    for (i, code) in pattern.iter().cycle().take(200).enumerate() {
        key(&mut scene, *code, i % 3 + 1);
        assert!(scene.state().ambient_color.iter().all(|c| (0.0..=1.0).contains(c)));
        assert!(scene.state().light_color.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    scene.tick(0.0);
    let program = scene.program().expect("program").id;
    assert_eq!(
        scene.backend().uniform_value(program, "AmbientColor"),
        Some(UniformValue::Vec4(scene.state().ambient_color))
    );
}

#[test]
fn light_keys_adjust_color_power_and_depth() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);

    key(&mut scene, KeyCode::KeyR, 10);
    key(&mut scene, KeyCode::KeyH, 2);
    key(&mut scene, KeyCode::KeyJ, 60);
    key(&mut scene, KeyCode::Equal, 3);
    key(&mut scene, KeyCode::Minus, 1);

    let state = scene.state();
    assert_relative_eq!(state.light_color[0], 1.0);
    assert_relative_eq!(state.light_color[2], 0.5, epsilon = 1e-6);
    assert_relative_eq!(state.light_power, DEFAULT_LIGHT_POWER - 600.0);
    assert_relative_eq!(state.light_position.z, 12.0);
}

#[test]
fn light_follows_cursor_only_while_dragging() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.light_drag = LightDrag::LeftButton;
    let mut scene = Scene::new(config, HeadlessBackend::new());
    scene.setup((640, 480)).expect("sets up");

    scene.handle_input(InputEvent::CursorMoved { x: 100.0, y: 80.0 });
    assert_relative_eq!(scene.state().light_position.x, 0.0);

    scene.handle_input(InputEvent::MouseButton {
        button: MouseButton::Left,
        pressed: true,
    });
    scene.handle_input(InputEvent::CursorMoved { x: 100.0, y: 80.0 });
    assert_relative_eq!(scene.state().light_position.x, 100.0);
    assert_relative_eq!(scene.state().light_position.y, 400.0);

    scene.handle_input(InputEvent::MouseButton {
        button: MouseButton::Left,
        pressed: false,
    });
    scene.handle_input(InputEvent::CursorMoved { x: 5.0, y: 5.0 });
    assert_relative_eq!(scene.state().light_position.x, 100.0);
}

#[test]
fn escape_and_close_request_quit() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);
    key(&mut scene, KeyCode::KeyX, 1);
    assert!(!scene.should_quit());
    key(&mut scene, KeyCode::Escape, 1);
    assert!(scene.should_quit());

    let mut scene = ready_scene(&dir);
    scene.handle_input(InputEvent::CloseRequested);
    assert!(scene.should_quit());
}

#[test]
fn ticks_outside_ready_or_rendering_are_ignored() {
    let dir = TempDir::new("scene");
    let mut scene = Scene::new(triangle_scene(&dir), HeadlessBackend::new());
    scene.tick(1.0);
    assert_eq!(scene.phase(), Phase::Uninitialized);
    assert!(scene.backend().commands().is_empty());

    scene.setup((640, 480)).expect("sets up");
    scene.tick(1.0);
    scene.shutdown();
    assert_eq!(scene.phase(), Phase::Terminated);

    scene.backend_mut().clear_commands();
    scene.tick(1.0);
    assert!(scene.backend().commands().is_empty());
}

#[test]
fn shutdown_releases_everything_once() {
    let dir = TempDir::new("scene");
    let color = dir.write_png("wood.png", 2, 2, [90, 60, 30, 255]);
    let normal = dir.write_png("wood.normal.png", 2, 2, [127, 127, 255, 255]);
    let mut config = triangle_scene(&dir);
    config.shaders = shader_group("normalmap");
    config.color_map = Some(color);
    config.normal_map = Some(normal);

    let mut scene = Scene::new(config, HeadlessBackend::new());
    scene.setup((640, 480)).expect("textured scene sets up");
    let program = scene.program().expect("program").id;
    assert_eq!(scene.backend().live_textures(), 2);
    assert_eq!(scene.backend().uniform_value(program, "UseColorMap"), Some(UniformValue::Int(1)));
    assert_eq!(scene.backend().uniform_value(program, "NormalMap"), Some(UniformValue::Sampler(1)));

    scene.tick(0.1);
    let binds = scene
        .backend()
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::BindTexture { .. }))
        .count();
    assert_eq!(binds, 2);

    scene.shutdown();
    scene.shutdown();
    let backend = scene.backend();
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_programs(), 0);
    assert_eq!(backend.live_vertex_arrays(), 0);
    assert_eq!(backend.live_shaders(), 0);
}

#[test]
fn failed_setup_releases_what_it_acquired() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.shaders = shader_group("normalmap");
    config.color_map = Some(dir.write_png("ok.png", 1, 1, [255, 0, 0, 255]));
    config.normal_map = Some(dir.write("broken.normal.png", "not a png"));

    let mut scene = Scene::new(config, HeadlessBackend::new());
    let err = scene.setup((640, 480)).unwrap_err();
    assert!(matches!(err, Error::ImageDecode(_)), "{err}");
    assert_eq!(scene.phase(), Phase::Uninitialized);
    let backend = scene.backend();
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_programs(), 0);
    assert_eq!(backend.live_shaders(), 0);
}

#[test]
fn missing_model_fails_setup() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.model = dir.path().join("nothing.ply");
    let mut scene = Scene::new(config, HeadlessBackend::new());
    assert!(matches!(
        scene.setup((640, 480)),
        Err(Error::ResourceOpen { .. })
    ));
    assert!(scene.mesh().is_none());
}

#[test]
fn resize_updates_projection() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);
    scene.resize(1000, 500);
    let program = scene.program().expect("program").id;
    assert_eq!(scene.state().viewport, (1000, 500));
    assert_eq!(scene.backend().viewport(), (1000, 500));
    assert_eq!(
        scene.backend().uniform_value(program, "ProjMatrix"),
        Some(UniformValue::Mat4(projection_matrix(2.0).into()))
    );
}

fn assert_model_matrix(scene: &Scene<HeadlessBackend>, expected: cgmath::Matrix4<f32>) {
    let program = scene.program().expect("program").id;
    let expected: [[f32; 4]; 4] = expected.into();
    match scene.backend().uniform_value(program, "ModelMatrix") {
        Some(UniformValue::Mat4(m)) => {
            for (row, expected_row) in m.iter().zip(expected.iter()) {
                for (value, expected_value) in row.iter().zip(expected_row.iter()) {
                    assert_relative_eq!(*value, *expected_value, epsilon = 1e-5);
                }
            }
        }
        other => panic!("unexpected model matrix {other:?}"),
    }
}

#[test]
fn tumble_turns_all_three_axes() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.rotation = Rotation::Tumble;
    let mut scene = Scene::new(config, HeadlessBackend::new());
    scene.setup((640, 480)).expect("sets up");

    scene.tick(0.5);
    let angles = scene.state().angles;
    assert_relative_eq!(angles.x, 0.15, epsilon = 1e-6);
    assert_relative_eq!(angles.y, 0.5, epsilon = 1e-6);
    assert_relative_eq!(angles.z, 0.35, epsilon = 1e-6);

    let expected = Matrix4::from_angle_x(Rad(0.15))
        * Matrix4::from_angle_y(Rad(0.5))
        * Matrix4::from_angle_z(Rad(0.35));
    assert_model_matrix(&scene, expected);
}

#[test]
fn angles_wrap_at_a_full_turn() {
    let dir = TempDir::new("scene");
    let mut config = triangle_scene(&dir);
    config.rotation = Rotation::Spin;
    let mut scene = Scene::new(config, HeadlessBackend::new());
    scene.setup((640, 480)).expect("sets up");

    scene.tick(TAU - 0.25);
    assert_relative_eq!(scene.state().angles.y, TAU - 0.25, epsilon = 1e-5);
    scene.tick(0.5);
    assert_relative_eq!(scene.state().angles.y, 0.25, epsilon = 1e-5);

    scene.tick(3.0 * TAU);
    assert_relative_eq!(scene.state().angles.y, 0.25, epsilon = 1e-4);
    assert!((0.0..TAU).contains(&scene.state().angles.y));
    assert_model_matrix(&scene, Matrix4::from_angle_y(Rad(0.25)));
}

#[test]
fn setup_after_shutdown_is_an_error() {
    let dir = TempDir::new("scene");
    let mut scene = ready_scene(&dir);
    assert!(scene.setup((640, 480)).is_ok());
    assert_eq!(scene.phase(), Phase::Ready);

    scene.shutdown();
    assert!(matches!(scene.setup((640, 480)), Err(Error::Terminated)));
    assert_eq!(scene.phase(), Phase::Terminated);
    assert_eq!(scene.backend().live_programs(), 0);
}

#[test]
fn unfed_vertex_input_reports_the_mesh_layout() {
    let dir = TempDir::new("scene");
    let vert = dir.write(
        "tangent.vert.wgsl",
        "
@vertex
fn vs_main(@location(0) MCVertex: vec3<f32>, @location(5) Tangent: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(MCVertex + Tangent, 1.0);
}
",
    );
    let frag = dir.write(
        "flat.frag.wgsl",
        "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
    );
    let mut config = triangle_scene(&dir);
    config.shaders = vec![
        ShaderFile::new(ShaderStage::Vertex, vert),
        ShaderFile::new(ShaderStage::Fragment, frag),
    ];

    let mut scene = Scene::new(config, HeadlessBackend::new());
    match scene.setup((640, 480)).unwrap_err() {
        Error::ShaderLink { log } => {
            assert!(log.contains("'Tangent' (location 5)"), "{log}");
            assert!(log.contains("32-byte stride"), "{log}");
            assert!(log.contains("MCVertex (3 floats at float 0, location 0)"), "{log}");
            assert!(log.contains("TexCoord0 (2 floats at float 6, unused)"), "{log}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(scene.phase(), Phase::Uninitialized);
    assert_eq!(scene.backend().live_programs(), 0);
}
