//! Viewer data structures: meshes, textures and the per-frame render state.
//!
//! - `mesh` contains the packed vertex and face buffers of a loaded model
//! - `texture` contains decoded pixel data and the GPU texture wrapper
//! - `render_state` holds the animated and user-adjustable uniform values

pub mod mesh;
pub mod render_state;
pub mod texture;
