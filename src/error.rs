//! Error types for model loading and GPU resource setup.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// The part of a mesh file a parse failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Vertex,
    Face,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Header => f.write_str("header"),
            Section::Vertex => f.write_str("vertex"),
            Section::Face => f.write_str("face"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Unexpected magic line or unsupported format identifier.
    #[error("invalid mesh file: expected {expected}, got '{found}'")]
    Format { expected: String, found: String },

    #[error("malformed header declaration '{line}': {reason}")]
    HeaderParse { line: String, reason: String },

    /// A vertex or face line could not be decoded. `index` is 0-based within its block.
    #[error("malformed {section} record {index} ('{line}'): {reason}")]
    RecordParse {
        section: Section,
        index: usize,
        line: String,
        reason: String,
    },

    #[error("input ended in the {section} section after {found} of {expected} lines")]
    TruncatedInput {
        section: Section,
        expected: usize,
        found: usize,
    },

    #[error("failed to compile {origin}:\n{log}")]
    ShaderCompile { origin: String, log: String },

    #[error("failed to link program:\n{log}")]
    ShaderLink { log: String },

    #[error("could not open {}: {source}", path.display())]
    ResourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The decoded pixel rows are padded; uploads assume `width * 4` bytes per row.
    #[error("unsupported stride: rows are {stride} bytes, expected {expected}")]
    Stride { stride: usize, expected: usize },

    #[error("the scene was shut down and cannot be set up again")]
    Terminated,
}

pub type Result<T> = std::result::Result<T, Error>;
