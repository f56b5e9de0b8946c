//! plyview
//!
//! An interactive viewer for meshes stored in a small ASCII PLY subset. The
//! mesh is rendered with a WGSL vertex/fragment shader pair, optional color and
//! normal maps and one point light whose color, power and position can be
//! changed from the keyboard and mouse while the model turns.
//!
//! High-level modules
//! - `backend`: the `GpuBackend` trait with a WGPU and a headless implementation
//! - `config`: command line options and their resolution into a viewer configuration
//! - `context`: window surface, device and queue
//! - `data_structures`: meshes, textures and the per-frame render state
//! - `error`: the error type of every loading step
//! - `flow`: the winit event loop and the headless check
//! - `input`: key bindings and light dragging
//! - `pipelines`: the render pipeline used to draw the mesh
//! - `resources`: loaders for mesh, shader and texture files
//! - `scene`: setup, per-frame update and teardown of the displayed model
//!

pub mod backend;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod input;
pub mod pipelines;
pub mod resources;
pub mod scene;

pub use error::{Error, Result};
