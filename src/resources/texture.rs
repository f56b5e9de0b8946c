use std::path::{Path, PathBuf};

use crate::{
    backend::{GpuBackend, SamplerDesc, TextureHandle},
    data_structures::texture::TextureImage,
    error::Result,
};

use super::load_binary;

/// Texture unit the color map is bound to.
pub const COLOR_MAP_UNIT: u32 = 0;
/// Texture unit the normal map is bound to.
pub const NORMAL_MAP_UNIT: u32 = 1;

/// Decode the image at `path` and upload it to `unit` with bilinear, clamped sampling.
pub fn load_texture<B: GpuBackend + ?Sized>(
    backend: &mut B,
    path: &Path,
    unit: u32,
    is_normal_map: bool,
) -> Result<TextureHandle> {
    let data = load_binary(path)?;
    let image = TextureImage::decode(&data)?;
    let handle = backend.create_texture(unit, &image, SamplerDesc::BILINEAR_CLAMP, is_normal_map);
    log::info!(
        "uploaded {} ({}x{}) to unit {unit}",
        path.display(),
        image.width,
        image.height
    );
    Ok(handle)
}

/// The color and normal map of a texture group: `<group>.png` and, if it
/// exists, `<group>.normal.png`.
pub fn group(group: &str) -> (PathBuf, Option<PathBuf>) {
    let color = PathBuf::from(format!("{group}.png"));
    let normal = PathBuf::from(format!("{group}.normal.png"));
    let normal = normal.exists().then_some(normal);
    (color, normal)
}
