//! Texture pixel data and GPU textures.
//!
//! This module provides [`TextureImage`], the decoded RGBA8 pixels of a color or
//! normal map, and [`Texture`], a wrapper around the WGPU texture, view and
//! sampler created from it. The WGPU side also hosts the depth texture and the
//! 1x1 fallback textures bound when a shader samples an empty texture unit.

use crate::{
    backend::{SamplerDesc, SamplerFilter, SamplerWrap},
    error::{Error, Result},
};

/// Decoded pixels, tightly packed RGBA8 rows (`width * 4` bytes each).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Decode an image file of any format the `image` crate was built with.
    ///
    /// Decoder errors are returned unchanged as [`Error::ImageDecode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Self::from_image(&img)
    }

    pub fn from_image(img: &image::DynamicImage) -> Result<Self> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let stride = rgba.sample_layout().height_stride;
        Self::from_packed(width, height, stride, rgba.into_raw())
    }

    /// Wrap already decoded RGBA8 rows of `stride` bytes.
    ///
    /// Fails with [`Error::Stride`] unless the rows carry no padding.
    pub fn from_packed(width: u32, height: u32, stride: usize, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * Self::BYTES_PER_PIXEL;
        if stride != expected {
            return Err(Error::Stride { stride, expected });
        }
        if pixels.len() != expected * height as usize {
            return Err(Error::Stride {
                stride: pixels.len() / (height.max(1) as usize),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A `width` x `height` image filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .cycle()
            .take(width as usize * height as usize * Self::BYTES_PER_PIXEL)
            .copied()
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// The blue/purple-ish colour that represents an undisturbed normal.
    pub fn flat_normal() -> Self {
        Self::solid(1, 1, [127, 127, 255, 255])
    }

    pub fn white() -> Self {
        Self::solid(1, 1, [255, 255, 255, 255])
    }
}

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    ///
    /// # Arguments
    ///
    /// * `size` is [width, height] of the texture in pixels
    /// * `label` is used as a debug label for the GPU resource
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Upload decoded pixels into a new sampled texture.
    ///
    /// # Arguments
    ///
    /// * `label` is used as a debug name for the GPU resource
    /// * `is_normal_map` toggles between sRGB (false) and linear (true) color space
    /// * `sampler` describes the filtering and wrapping the texture is sampled with
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &TextureImage,
        label: Option<&str>,
        is_normal_map: bool,
        sampler: &SamplerDesc,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: img.width.max(1),
            height: img.height.max(1),
            depth_or_array_layers: 1,
        };
        let format = if is_normal_map {
            wgpu::TextureFormat::Rgba8Unorm
        } else {
            wgpu::TextureFormat::Rgba8UnormSrgb
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if !img.pixels.is_empty() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                &img.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(TextureImage::BYTES_PER_PIXEL as u32 * img.width),
                    rows_per_image: Some(img.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_sampler(device, sampler));
        Self {
            texture,
            view,
            sampler,
        }
    }
}

pub fn create_sampler(device: &wgpu::Device, desc: &SamplerDesc) -> wgpu::Sampler {
    let address_mode = match desc.wrap {
        SamplerWrap::Clamp => wgpu::AddressMode::ClampToEdge,
    };
    let filter = match desc.filter {
        SamplerFilter::Linear => wgpu::FilterMode::Linear,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}
