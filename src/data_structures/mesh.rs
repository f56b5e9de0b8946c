//! Packed mesh buffers decoded from a PLY file.

use std::{fmt, io::Write};

/// Floats per vertex: position (3), normal (3), texture coordinate (2).
pub const VERTEX_STRIDE: usize = 8;

/// Indices per face. Only triangles are supported.
pub const FACE_STRIDE: usize = 3;

/// Format identifiers accepted on the second line of a mesh file.
pub const SUPPORTED_FORMATS: [&str; 1] = ["format ascii 1.0"];

/// A triangle mesh in the interleaved layout the render pipeline uploads as-is.
///
/// `vertex_data` holds `vertex_count` repetitions of `x y z nx ny nz s t` and
/// `face_data` holds `face_count` triangles. Indices are trusted to be smaller
/// than `vertex_count`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub format: String,
    pub vertex_count: usize,
    pub face_count: usize,
    pub vertex_data: Vec<f32>,
    pub face_data: Vec<u32>,
}

impl Mesh {
    /// Number of indices a draw call covering the whole mesh needs.
    pub fn index_count(&self) -> u32 {
        (self.face_count * FACE_STRIDE) as u32
    }

    /// Position, normal and texture coordinate of vertex `i`.
    pub fn vertex(&self, i: usize) -> Option<&[f32]> {
        self.vertex_data.get(i * VERTEX_STRIDE..(i + 1) * VERTEX_STRIDE)
    }

    /// Encode the mesh in the same ASCII format [`crate::resources::mesh::parse_mesh`] reads.
    ///
    /// Floats are written with the shortest representation that parses back to
    /// the same value, so a round trip is lossless.
    pub fn write_ply<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        let format = if self.format.is_empty() {
            SUPPORTED_FORMATS[0]
        } else {
            self.format.as_str()
        };
        writeln!(w, "ply")?;
        writeln!(w, "{format}")?;
        writeln!(w, "element vertex {}", self.vertex_count)?;
        for property in ["x", "y", "z", "nx", "ny", "nz", "s", "t"] {
            writeln!(w, "property float {property}")?;
        }
        writeln!(w, "element face {}", self.face_count)?;
        writeln!(w, "property list uchar uint vertex_indices")?;
        writeln!(w, "end_header")?;

        for vertex in self.vertex_data.chunks(VERTEX_STRIDE) {
            let fields: Vec<String> = vertex.iter().map(|v| v.to_string()).collect();
            writeln!(w, "{}", fields.join(" "))?;
        }
        for face in self.face_data.chunks_exact(FACE_STRIDE) {
            writeln!(w, "{} {} {} {}", FACE_STRIDE, face[0], face[1], face[2])?;
        }
        Ok(())
    }
}

impl fmt::Display for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PLY {{ format: '{}', vertices: {}, faces: {} }}",
            self.format, self.vertex_count, self.face_count
        )
    }
}
