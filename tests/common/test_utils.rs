#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use plyview::{
    backend::ShaderStage,
    resources::shader::{self, ShaderFile, ShaderSource},
    scene::SceneConfig,
};

/// One triangle in the z = 0 plane, facing +z.
pub const TRIANGLE_PLY: &str = "ply
format ascii 1.0
comment one triangle
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
property float s
property float t
element face 1
property list uchar uint vertex_indices
end_header
0 0 0 0 0 1 0 0
1 0 0 0 0 1 1 0
0 1 0 0 0 1 0 1
3 0 1 2
";

/// A scratch directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("plyview-{name}-{}-{n}", std::process::id()));
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path.join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    /// Save a `width` x `height` PNG filled with `rgba`.
    pub fn write_png(&self, name: &str, width: u32, height: u32, rgba: [u8; 4]) -> PathBuf {
        let path = self.path.join(name);
        image::RgbaImage::from_pixel(width, height, image::Rgba(rgba))
            .save(&path)
            .expect("write png");
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// A file shipped in the repository's `assets/` directory.
pub fn asset(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets").join(relative)
}

pub fn shader_group(name: &str) -> Vec<ShaderFile> {
    let base = asset(&format!("shaders/{name}"));
    shader::group(&base.to_string_lossy())
}

pub fn load_sources(name: &str) -> Vec<ShaderSource> {
    shader_group(name)
        .iter()
        .map(|file| file.load().expect("load shipped shader"))
        .collect()
}

pub fn vertex(code: &str) -> ShaderSource {
    ShaderSource::new(ShaderStage::Vertex, "test.vert.wgsl", code)
}

pub fn fragment(code: &str) -> ShaderSource {
    ShaderSource::new(ShaderStage::Fragment, "test.frag.wgsl", code)
}

/// The one-triangle scene drawn with the untextured shaders.
pub fn triangle_scene(dir: &TempDir) -> SceneConfig {
    SceneConfig {
        model: dir.write("triangle.ply", TRIANGLE_PLY),
        shaders: shader_group("basic"),
        ..SceneConfig::default()
    }
}
