use std::io::Cursor;

use approx::assert_relative_eq;
use plyview::{
    Error,
    data_structures::mesh::{FACE_STRIDE, Mesh, VERTEX_STRIDE},
    error::Section,
    resources::{load_mesh, mesh::parse_mesh},
};

use crate::common::test_utils::{TRIANGLE_PLY, TempDir, asset};
mod common;

fn parse(text: &str) -> plyview::Result<Mesh> {
    parse_mesh(Cursor::new(text))
}

fn header(vertices: usize, faces: usize) -> String {
    format!(
        "ply\nformat ascii 1.0\nelement vertex {vertices}\nproperty float x\nelement face {faces}\nend_header\n"
    )
}

#[test]
fn parses_packed_buffers() {
    let mesh = parse(TRIANGLE_PLY).expect("valid triangle");
    assert_eq!(mesh.format, "format ascii 1.0");
    assert_eq!(mesh.vertex_count, 3);
    assert_eq!(mesh.face_count, 1);
    assert_eq!(mesh.vertex_data.len(), 3 * VERTEX_STRIDE);
    assert_eq!(mesh.face_data, vec![0, 1, 2]);
    assert_eq!(mesh.index_count(), 3);

    let second = mesh.vertex(1).expect("vertex 1");
    assert_relative_eq!(second[0], 1.0);
    assert_relative_eq!(second[5], 1.0);
    assert_relative_eq!(second[6], 1.0);
    assert!(mesh.vertex(3).is_none());
}

#[test]
fn shipped_cube_has_expected_counts() {
    let mesh = load_mesh(&asset("models/cube.ply")).expect("cube loads");
    assert_eq!(mesh.vertex_count, 24);
    assert_eq!(mesh.face_count, 12);
    assert_eq!(mesh.face_data.len(), 12 * FACE_STRIDE);
    assert!(mesh.face_data.iter().all(|&i| (i as usize) < mesh.vertex_count));
    assert_eq!(
        mesh.to_string(),
        "PLY { format: 'format ascii 1.0', vertices: 24, faces: 12 }"
    );
}

#[test]
fn written_mesh_parses_back_identically() {
    let mesh = Mesh {
        format: "format ascii 1.0".to_string(),
        vertex_count: 2,
        face_count: 1,
        vertex_data: vec![
            0.1, -2.5, 3.0e-7, 0.0, 0.0, 1.0, 0.333_333_34, 1.0, //
            1e10, 7.25, -0.0, 1.0, 0.0, 0.0, 0.5, 0.125,
        ],
        face_data: vec![0, 1, 1],
    };
    let mut text = Vec::new();
    mesh.write_ply(&mut text).expect("write to memory");
    let parsed = parse_mesh(Cursor::new(text)).expect("round trip");
    assert_eq!(parsed, mesh);
}

#[test]
fn header_lines_other_than_elements_are_ignored() {
    let text = "ply\r\nformat ascii 1.0\r\ncomment made by hand\r\nobj_info whatever\r\nelement vertex 1\r\nelement material 4\r\nproperty float x\r\nelement face 0\r\nend_header\r\n1 2 3 4 5 6 7 8\r\n";
    let mesh = parse(text).expect("CRLF file with extra header lines");
    assert_eq!(mesh.vertex_data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    assert_eq!(mesh.face_count, 0);
}

#[test]
fn rejects_bad_magic() {
    let err = parse(&TRIANGLE_PLY.replacen("ply", "obj", 1)).unwrap_err();
    assert!(matches!(err, Error::Format { ref found, .. } if found == "obj"), "{err}");
}

#[test]
fn rejects_empty_input() {
    let err = parse("").unwrap_err();
    assert!(matches!(err, Error::Format { ref found, .. } if found.is_empty()), "{err}");
}

#[test]
fn rejects_unsupported_format() {
    let binary = TRIANGLE_PLY.replace("format ascii 1.0", "format binary_little_endian 1.0");
    let err = parse(&binary).unwrap_err();
    match err {
        Error::Format { found, .. } => assert_eq!(found, "format binary_little_endian 1.0"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_malformed_element_declaration() {
    for declaration in ["element vertex", "element vertex many", "element face -1"] {
        let text = format!("ply\nformat ascii 1.0\n{declaration}\nend_header\n");
        let err = parse(&text).unwrap_err();
        assert!(
            matches!(err, Error::HeaderParse { ref line, .. } if line == declaration),
            "{declaration}: {err}"
        );
    }
}

#[test]
fn header_without_end_is_truncated() {
    let err = parse("ply\nformat ascii 1.0\nelement vertex 3\n").unwrap_err();
    assert!(matches!(
        err,
        Error::TruncatedInput {
            section: Section::Header,
            ..
        }
    ));
}

#[test]
fn truncated_vertex_block_reports_progress() {
    let text = header(3, 0) + "0 0 0 0 0 1 0 0\n0 0 0 0 0 1 0 0\n";
    match parse(&text).unwrap_err() {
        Error::TruncatedInput {
            section,
            expected,
            found,
        } => {
            assert_eq!(section, Section::Vertex);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn non_numeric_vertex_field_names_the_record() {
    let text = header(2, 0) + "0 0 0 0 0 1 0 0\n0 0 zero 0 0 1 0 0\n";
    match parse(&text).unwrap_err() {
        Error::RecordParse { section, index, .. } => {
            assert_eq!(section, Section::Vertex);
            assert_eq!(index, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn vertex_records_need_exactly_eight_fields() {
    for record in ["0 0 0 0 0 1 0", "0 0 0 0 0 1 0 0 9"] {
        let text = header(1, 0) + record + "\n";
        assert!(
            matches!(parse(&text), Err(Error::RecordParse { index: 0, .. })),
            "{record}"
        );
    }
}

#[test]
fn faces_must_be_triangles() {
    let vertices = "0 0 0 0 0 1 0 0\n".repeat(4);
    for face in ["4 0 1 2 3", "3 0 1", "3 0 1 2 3", "3 0 -1 2", "x 0 1 2"] {
        let text = header(4, 1) + &vertices + face + "\n";
        match parse(&text) {
            Err(Error::RecordParse { section, index, .. }) => {
                assert_eq!(section, Section::Face, "{face}");
                assert_eq!(index, 0, "{face}");
            }
            other => panic!("{face}: unexpected result {other:?}"),
        }
    }
}

#[test]
fn truncated_face_block() {
    let text = header(1, 2) + "0 0 0 0 0 1 0 0\n3 0 0 0\n";
    assert!(matches!(
        parse(&text),
        Err(Error::TruncatedInput {
            section: Section::Face,
            expected: 2,
            found: 1,
        })
    ));
}

#[test]
fn missing_file_reports_path() {
    let dir = TempDir::new("mesh");
    let path = dir.path().join("absent.ply");
    match load_mesh(&path).unwrap_err() {
        Error::ResourceOpen { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn huge_declared_counts_are_truncated_not_allocated() {
    for count in ["18446744073709551615", "100000000000"] {
        let text = format!("ply\nformat ascii 1.0\nelement vertex {count}\nend_header\n");
        match parse(&text) {
            Err(Error::TruncatedInput {
                section: Section::Vertex,
                found: 0,
                expected,
            }) => assert_eq!(expected.to_string(), count),
            other => panic!("{count}: unexpected result {other:?}"),
        }
    }

    let text = "ply\nformat ascii 1.0\nelement vertex 0\nelement face 6148914691236517206\nend_header\n";
    assert!(matches!(
        parse(text),
        Err(Error::TruncatedInput {
            section: Section::Face,
            found: 0,
            ..
        })
    ));
}

#[test]
fn invalid_utf8_in_a_record_names_the_record() {
    let mut bytes = header(2, 0).into_bytes();
    bytes.extend_from_slice(b"0 0 0 0 0 1 0 0\n0 0 \xff 0 0 1 0 0\n");
    match parse_mesh(Cursor::new(bytes)).unwrap_err() {
        Error::RecordParse { section, index, .. } => {
            assert_eq!(section, Section::Vertex);
            assert_eq!(index, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}
