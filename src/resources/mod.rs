use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use crate::{
    data_structures::mesh::Mesh,
    error::{Error, Result},
};

/**
 * This module contains all logic for loading meshes, shaders and textures from external files.
 */
pub mod mesh;
pub mod shader;
pub mod texture;

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::ResourceOpen {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_string(path: &Path) -> Result<String> {
    let mut txt = String::new();
    open(path)?.read_to_string(&mut txt)?;
    Ok(txt)
}

pub fn load_binary(path: &Path) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    open(path)?.read_to_end(&mut data)?;
    Ok(data)
}

/// Parse the mesh file at `path`.
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let file = open(path)?;
    let mesh = mesh::parse_mesh(BufReader::new(file))?;
    log::info!("loaded {} from {}", mesh, path.display());
    Ok(mesh)
}
