//! Application event loop.
//!
//! [`run`] opens the window, creates the WGPU context, sets the scene up and
//! then drives it from winit events:
//! 1. translate window events into [`InputEvent`]s for the scene
//! 2. on `Resized`, resize the surface and re-push the projection
//! 3. on `RedrawRequested`, tick the scene with the elapsed time, which draws
//!    and presents a frame and requests the next redraw
//!
//! [`check`] performs the same setup against the headless backend.

use std::sync::Arc;

use anyhow::Context as _;
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window},
};

use crate::{
    backend::{gpu::WgpuBackend, headless::HeadlessBackend},
    config::ViewerConfig,
    context::Context,
    input::InputEvent,
    scene::Scene,
};

struct App {
    async_runtime: tokio::runtime::Runtime,
    config: ViewerConfig,
    scene: Option<Scene<WgpuBackend>>,
    // The event loop cannot return errors, so a failed setup is kept for `run`.
    error: Option<anyhow::Error>,
    last_time: Instant,
}

impl App {
    fn new(config: ViewerConfig) -> anyhow::Result<Self> {
        let async_runtime =
            tokio::runtime::Runtime::new().context("could not start the async runtime")?;
        Ok(Self {
            async_runtime,
            config,
            scene: None,
            error: None,
            last_time: Instant::now(),
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Scene<WgpuBackend>> {
        let window_config = &self.config.window;
        let mut window_attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        if window_config.fullscreen {
            window_attributes =
                window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("could not create the window")?,
        );

        let graphics = self.config.graphics;
        let ctx = self
            .async_runtime
            .block_on(Context::new(window.clone(), graphics.api, graphics.limits))?;

        let size = window.inner_size();
        let mut scene = Scene::new(self.config.scene.clone(), WgpuBackend::new(ctx));
        scene
            .setup((size.width.max(1), size.height.max(1)))
            .context("could not set up the scene")?;
        window.request_redraw();
        Ok(scene)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(scene) => {
                self.last_time = Instant::now();
                self.scene = Some(scene);
            }
            Err(e) => {
                log::error!("{e:#}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let scene = match &mut self.scene {
            Some(scene) => scene,
            None => return,
        };

        if let Some(input) = InputEvent::from_window_event(&event) {
            scene.handle_input(input);
        }

        match event {
            WindowEvent::Resized(size) => scene.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                scene.tick(dt.as_secs_f32());
            }
            _ => {}
        }

        if scene.should_quit() {
            scene.shutdown();
            event_loop.exit();
        }
    }
}

/// Initialise `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }
}

/// Open the viewer window and run until it is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    init_logger();

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Load and validate everything, render a single frame headlessly and return
/// the mesh summary.
pub fn check(config: &ViewerConfig) -> anyhow::Result<String> {
    init_logger();

    let mut scene = Scene::new(config.scene.clone(), HeadlessBackend::new());
    let viewport = (config.window.width, config.window.height);
    scene.setup(viewport).context("could not set up the scene")?;
    scene.tick(0.0);

    let frames = scene.backend().frames_presented();
    let summary = scene
        .mesh()
        .map(|mesh| mesh.to_string())
        .unwrap_or_default();
    scene.shutdown();
    log::info!("check passed, {frames} frame rendered");
    Ok(summary)
}
