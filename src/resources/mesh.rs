use std::io::BufRead;

use crate::{
    data_structures::mesh::{FACE_STRIDE, Mesh, SUPPORTED_FORMATS, VERTEX_STRIDE},
    error::{Error, Result, Section},
};

const MAGIC: &str = "ply";
const END_HEADER: &str = "end_header";
const ELEMENT: &str = "element";
/// Upper bound on records reserved up front; declared counts are not trusted.
const MAX_RESERVED_RECORDS: usize = 64 * 1024;

/**
 * Parses the ASCII PLY subset the viewer renders: a magic line, a format line, a
 * header declaring the vertex and face counts, then exactly that many vertex
 * records (`x y z nx ny nz s t`) and triangle records (`3 v0 v1 v2`).
 *
 * Nothing is returned on failure, so a half-filled mesh can never reach the GPU.
 */
pub fn parse_mesh<R: BufRead>(reader: R) -> Result<Mesh> {
    let mut lines = Lines::new(reader);
    let mut mesh = read_header(&mut lines)?;
    mesh.vertex_data = read_vertices(&mut lines, mesh.vertex_count)?;
    mesh.face_data = read_faces(&mut lines, mesh.face_count)?;
    Ok(mesh)
}

/// Line reader that strips `\n` and `\r\n` endings. Bytes that are not
/// UTF-8 are replaced, so they fail as a malformed record instead of an I/O
/// error.
struct Lines<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

fn read_header<R: BufRead>(lines: &mut Lines<R>) -> Result<Mesh> {
    let magic = lines.next_line()?.unwrap_or_default();
    if magic != MAGIC {
        return Err(Error::Format {
            expected: format!("'{MAGIC}'"),
            found: magic,
        });
    }

    let format = lines.next_line()?.unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&format.as_str()) {
        return Err(Error::Format {
            expected: format!("one of {SUPPORTED_FORMATS:?}"),
            found: format,
        });
    }

    let mut mesh = Mesh {
        format,
        ..Default::default()
    };
    loop {
        let Some(line) = lines.next_line()? else {
            return Err(Error::TruncatedInput {
                section: Section::Header,
                expected: 1,
                found: 0,
            });
        };
        if line.starts_with(END_HEADER) {
            break;
        }
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some(ELEMENT) {
            continue;
        }
        let (category, count) = parse_declaration(tokens).map_err(|reason| Error::HeaderParse {
            line: line.clone(),
            reason,
        })?;
        match category {
            "vertex" => mesh.vertex_count = count,
            "face" => mesh.face_count = count,
            other => log::debug!("ignoring unsupported element '{other}' ({count} records)"),
        }
    }
    Ok(mesh)
}

fn parse_declaration<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
) -> std::result::Result<(&'a str, usize), String> {
    let category = tokens.next().ok_or("missing element category")?;
    let count = tokens.next().ok_or("missing element count")?;
    let count = count
        .parse::<usize>()
        .map_err(|e| format!("invalid count '{count}': {e}"))?;
    Ok((category, count))
}

fn read_vertices<R: BufRead>(lines: &mut Lines<R>, vertex_count: usize) -> Result<Vec<f32>> {
    let mut data = Vec::with_capacity(vertex_count.min(MAX_RESERVED_RECORDS) * VERTEX_STRIDE);
    for index in 0..vertex_count {
        let line = lines.next_line()?.ok_or(Error::TruncatedInput {
            section: Section::Vertex,
            expected: vertex_count,
            found: index,
        })?;
        let record = parse_vertex(&line).map_err(|reason| Error::RecordParse {
            section: Section::Vertex,
            index,
            line: line.clone(),
            reason,
        })?;
        data.extend_from_slice(&record);
    }
    Ok(data)
}

fn parse_vertex(line: &str) -> std::result::Result<[f32; VERTEX_STRIDE], String> {
    let mut record = [0.0; VERTEX_STRIDE];
    let mut fields = line.split_whitespace();
    for (i, slot) in record.iter_mut().enumerate() {
        let field = fields
            .next()
            .ok_or_else(|| format!("expected {VERTEX_STRIDE} fields, found {i}"))?;
        *slot = field
            .parse::<f32>()
            .map_err(|e| format!("field {i} ('{field}'): {e}"))?;
    }
    let extra = fields.count();
    if extra > 0 {
        return Err(format!(
            "expected {VERTEX_STRIDE} fields, found {}",
            VERTEX_STRIDE + extra
        ));
    }
    Ok(record)
}

fn read_faces<R: BufRead>(lines: &mut Lines<R>, face_count: usize) -> Result<Vec<u32>> {
    let mut data = Vec::with_capacity(face_count.min(MAX_RESERVED_RECORDS) * FACE_STRIDE);
    for index in 0..face_count {
        let line = lines.next_line()?.ok_or(Error::TruncatedInput {
            section: Section::Face,
            expected: face_count,
            found: index,
        })?;
        let triangle = parse_face(&line).map_err(|reason| Error::RecordParse {
            section: Section::Face,
            index,
            line: line.clone(),
            reason,
        })?;
        data.extend_from_slice(&triangle);
    }
    Ok(data)
}

fn parse_face(line: &str) -> std::result::Result<[u32; FACE_STRIDE], String> {
    let mut fields = line.split_whitespace();
    let arity = fields.next().ok_or("empty face record")?;
    let arity = arity
        .parse::<u32>()
        .map_err(|e| format!("vertex count ('{arity}'): {e}"))?;
    if arity as usize != FACE_STRIDE {
        return Err(format!(
            "faces with {arity} vertices are not supported, only triangles"
        ));
    }

    let mut triangle = [0; FACE_STRIDE];
    for (i, slot) in triangle.iter_mut().enumerate() {
        let field = fields
            .next()
            .ok_or_else(|| format!("expected {FACE_STRIDE} indices, found {i}"))?;
        *slot = field
            .parse::<u32>()
            .map_err(|e| format!("index {i} ('{field}'): {e}"))?;
    }
    if fields.next().is_some() {
        return Err(format!("more than {FACE_STRIDE} indices"));
    }
    Ok(triangle)
}
