//! [`GpuBackend`] on top of WGPU.
//!
//! Every uniform gets its own small buffer and every bind group is rebuilt at
//! present time from whatever textures are bound to the units then. Draw calls
//! are queued between [`GpuBackend::clear`] and [`GpuBackend::present`] and
//! recorded into a single render pass.

use std::{
    collections::{BTreeMap, HashMap},
    iter,
};

use wgpu::util::DeviceExt;

use super::{
    GpuBackend, ProgramHandle, SamplerDesc, ShaderHandle, ShaderStage, TextureHandle,
    UniformKind, UniformLocation, UniformValue, VertexArrayHandle, VertexLayout,
    reflect::{self, CompiledShader, ProgramLayout},
};
use crate::{
    context::Context,
    data_structures::texture::{Texture, TextureImage, create_sampler},
    pipelines::basic::{Stage, mk_render_pipeline, vertex_attributes},
};

struct GpuProgram {
    layout: ProgramLayout,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    bind_group_layouts: Vec<wgpu::BindGroupLayout>,
    pipeline_layout: wgpu::PipelineLayout,
    buffers: HashMap<UniformLocation, wgpu::Buffer>,
    /// Texture unit each texture uniform samples, as set through `UniformValue::Sampler`.
    texture_units: HashMap<UniformLocation, u32>,
}

struct GpuVertexArray {
    program: ProgramHandle,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct PendingDraw {
    program: ProgramHandle,
    vertex_array: VertexArrayHandle,
    index_count: u32,
}

#[derive(Default)]
struct Frame {
    clear: Option<[f32; 4]>,
    draws: Vec<PendingDraw>,
}

pub struct WgpuBackend {
    ctx: Context,
    next_id: u32,
    shaders: HashMap<u32, CompiledShader>,
    programs: HashMap<u32, GpuProgram>,
    textures: HashMap<u32, Texture>,
    units: BTreeMap<u32, TextureHandle>,
    vertex_arrays: HashMap<u32, GpuVertexArray>,
    default_sampler: wgpu::Sampler,
    fallback_color: Texture,
    fallback_normal: Texture,
    frame: Frame,
}

impl WgpuBackend {
    pub fn new(ctx: Context) -> Self {
        let default_sampler = create_sampler(&ctx.device, &SamplerDesc::BILINEAR_CLAMP);
        let fallback_color = Texture::from_image(
            &ctx.device,
            &ctx.queue,
            &TextureImage::white(),
            Some("fallback color map"),
            false,
            &SamplerDesc::BILINEAR_CLAMP,
        );
        let fallback_normal = Texture::from_image(
            &ctx.device,
            &ctx.queue,
            &TextureImage::flat_normal(),
            Some("fallback normal map"),
            true,
            &SamplerDesc::BILINEAR_CLAMP,
        );
        Self {
            ctx,
            next_id: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            units: BTreeMap::new(),
            vertex_arrays: HashMap::new(),
            default_sampler,
            fallback_color,
            fallback_normal,
            frame: Frame::default(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn create_bind_group_layouts(&self, layout: &ProgramLayout) -> Vec<wgpu::BindGroupLayout> {
        (0..layout.group_count())
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
                    .uniforms
                    .values()
                    .filter(|info| info.location.group == group)
                    .map(|info| {
                        let mut visibility = wgpu::ShaderStages::NONE;
                        if info.in_vertex {
                            visibility |= wgpu::ShaderStages::VERTEX;
                        }
                        if info.in_fragment {
                            visibility |= wgpu::ShaderStages::FRAGMENT;
                        }
                        wgpu::BindGroupLayoutEntry {
                            binding: info.location.binding,
                            visibility,
                            ty: binding_type(info.kind),
                            count: None,
                        }
                    })
                    .collect();
                self.ctx
                    .device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(format!("uniform group {group}").as_str()),
                        entries: &entries,
                    })
            })
            .collect()
    }

    fn texture_for(&self, program: &GpuProgram, location: UniformLocation, name: &str) -> &Texture {
        program
            .texture_units
            .get(&location)
            .and_then(|unit| self.units.get(unit))
            .and_then(|handle| self.textures.get(&handle.0))
            .unwrap_or(if name.contains("Normal") {
                &self.fallback_normal
            } else {
                &self.fallback_color
            })
    }

    fn sampler_for(&self, program: &GpuProgram, name: &str) -> &wgpu::Sampler {
        name.strip_suffix("Sampler")
            .and_then(|texture_name| {
                let info = program.layout.uniform(texture_name)?;
                (info.kind == UniformKind::Texture).then_some((texture_name, info.location))
            })
            .and_then(|(texture_name, location)| {
                self.texture_for(program, location, texture_name)
                    .sampler
                    .as_ref()
            })
            .unwrap_or(&self.default_sampler)
    }

    fn create_bind_groups(&self, program: &GpuProgram) -> Vec<wgpu::BindGroup> {
        program
            .bind_group_layouts
            .iter()
            .enumerate()
            .map(|(group, bind_group_layout)| {
                let entries: Vec<wgpu::BindGroupEntry> = program
                    .layout
                    .uniforms
                    .iter()
                    .filter(|(_, info)| info.location.group == group as u32)
                    .filter_map(|(name, info)| {
                        let resource = match info.kind {
                            UniformKind::Texture => wgpu::BindingResource::TextureView(
                                &self.texture_for(program, info.location, name).view,
                            ),
                            UniformKind::Sampler => {
                                wgpu::BindingResource::Sampler(self.sampler_for(program, name))
                            }
                            _ => program.buffers.get(&info.location)?.as_entire_binding(),
                        };
                        Some(wgpu::BindGroupEntry {
                            binding: info.location.binding,
                            resource,
                        })
                    })
                    .collect();
                self.ctx
                    .device
                    .create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(format!("uniform group {group}").as_str()),
                        layout: bind_group_layout,
                        entries: &entries,
                    })
            })
            .collect()
    }
}

fn binding_type(kind: UniformKind) -> wgpu::BindingType {
    match kind {
        UniformKind::Texture => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        UniformKind::Sampler => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        _ => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    }
}

impl GpuBackend for WgpuBackend {
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
        label: &str,
    ) -> Result<ShaderHandle, String> {
        let compiled = reflect::compile(stage, source, label)?;
        let id = self.next_id();
        self.shaders.insert(id, compiled);
        Ok(ShaderHandle(id))
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, String> {
        let mut stages = Vec::with_capacity(shaders.len());
        for handle in shaders {
            let shader = self
                .shaders
                .get(&handle.0)
                .ok_or_else(|| format!("error: shader {} does not exist", handle.0))?;
            stages.push(shader);
        }
        let layout = reflect::link(&stages)?;

        let device = &self.ctx.device;
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(layout.vertex_label.as_str()),
            source: wgpu::ShaderSource::Wgsl(layout.vertex_source.as_str().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(layout.fragment_label.as_str()),
            source: wgpu::ShaderSource::Wgsl(layout.fragment_source.as_str().into()),
        });

        let bind_group_layouts = self.create_bind_group_layouts(&layout);
        let layout_refs: Vec<Option<&wgpu::BindGroupLayout>> = bind_group_layouts.iter().map(Some).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &layout_refs,
            immediate_size: 0,
        });

        let buffers = layout
            .uniforms
            .iter()
            .filter_map(|(name, info)| {
                let size = info.kind.buffer_size()?;
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(name.as_str()),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                Some((info.location, buffer))
            })
            .collect();

        log::debug!(
            "linked {} + {} ({} bind groups)",
            layout.vertex_label,
            layout.fragment_label,
            bind_group_layouts.len()
        );
        let id = self.next_id();
        self.programs.insert(
            id,
            GpuProgram {
                layout,
                vertex_module,
                fragment_module,
                bind_group_layouts,
                pipeline_layout,
                buffers,
                texture_units: HashMap::new(),
            },
        );
        Ok(ProgramHandle(id))
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let program = self.programs.get(&program.0)?;
        program.layout.uniform(name).map(|info| info.location)
    }

    fn attrib_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let program = self.programs.get(&program.0)?;
        program
            .layout
            .attributes
            .get(name)
            .map(|attribute| attribute.location)
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: UniformLocation,
        value: UniformValue,
    ) {
        let Some(program) = self.programs.get_mut(&program.0) else {
            log::warn!("set_uniform on deleted program {}", program.0);
            return;
        };
        let Some((name, info)) = program.layout.uniform_at(location) else {
            log::warn!(
                "no uniform at group {} binding {}",
                location.group,
                location.binding
            );
            return;
        };
        if !info.kind.accepts(&value) {
            log::warn!("ignoring {value:?} for uniform '{name}' of type {:?}", info.kind);
            return;
        }
        match value {
            UniformValue::Sampler(unit) => {
                program.texture_units.insert(location, unit);
            }
            _ => {
                if let Some(buffer) = program.buffers.get(&location) {
                    self.ctx.queue.write_buffer(buffer, 0, &value.to_bytes());
                }
            }
        }
    }

    fn create_texture(
        &mut self,
        unit: u32,
        image: &TextureImage,
        sampler: SamplerDesc,
        is_normal_map: bool,
    ) -> TextureHandle {
        let label = if is_normal_map { "normal map" } else { "color map" };
        let texture = Texture::from_image(
            &self.ctx.device,
            &self.ctx.queue,
            image,
            Some(label),
            is_normal_map,
            &sampler,
        );
        let id = self.next_id();
        self.textures.insert(id, texture);
        let handle = TextureHandle(id);
        self.units.insert(unit, handle);
        handle
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.units.retain(|_, bound| *bound != texture);
    }

    fn create_vertex_array(
        &mut self,
        program: ProgramHandle,
        vertices: &[f32],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<VertexArrayHandle, String> {
        let gpu_program = self
            .programs
            .get(&program.0)
            .ok_or_else(|| format!("error: program {} does not exist", program.0))?;
        for (name, attribute) in &gpu_program.layout.attributes {
            if !layout
                .attributes
                .iter()
                .any(|a| a.location == attribute.location)
            {
                return Err(format!(
                    "error: vertex input '{name}' (location {}) is not fed by the vertex buffer",
                    attribute.location
                ));
            }
        }

        let attributes = vertex_attributes(layout);
        let buffer_layout = wgpu::VertexBufferLayout {
            array_stride: layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        };
        let pipeline = mk_render_pipeline(
            &self.ctx.device,
            &gpu_program.pipeline_layout,
            self.ctx.config.format,
            Some(Texture::DEPTH_FORMAT),
            &[buffer_layout],
            Stage {
                module: &gpu_program.vertex_module,
                entry_point: &gpu_program.layout.vertex_entry,
            },
            Stage {
                module: &gpu_program.fragment_module,
                entry_point: &gpu_program.layout.fragment_entry,
            },
        );

        let vertex_buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let id = self.next_id();
        self.vertex_arrays.insert(
            id,
            GpuVertexArray {
                program,
                pipeline,
                vertex_buffer,
                index_buffer,
                index_count: indices.len() as u32,
            },
        );
        Ok(VertexArrayHandle(id))
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.frame = Frame {
            clear: Some(color),
            draws: Vec::new(),
        };
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.units.insert(unit, texture);
    }

    fn draw_indexed(
        &mut self,
        program: ProgramHandle,
        vertex_array: VertexArrayHandle,
        index_count: u32,
    ) {
        self.frame.draws.push(PendingDraw {
            program,
            vertex_array,
            index_count,
        });
    }

    fn present(&mut self) {
        let frame = std::mem::take(&mut self.frame);
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.ctx.is_surface_configured {
            return;
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                let size = self.ctx.window.inner_size();
                self.ctx.resize(size.width, size.height);
                return;
            }
            e => {
                log::error!("Unable to render {:?}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut batches = Vec::with_capacity(frame.draws.len());
        for draw in &frame.draws {
            let (Some(program), Some(vertex_array)) = (
                self.programs.get(&draw.program.0),
                self.vertex_arrays.get(&draw.vertex_array.0),
            ) else {
                log::warn!("skipping draw with a deleted program or vertex array");
                continue;
            };
            if vertex_array.program != draw.program {
                log::warn!("vertex array {} was built for another program", draw.vertex_array.0);
                continue;
            }
            let count = draw.index_count.min(vertex_array.index_count);
            if count == 0 {
                continue;
            }
            batches.push((vertex_array, self.create_bind_groups(program), count));
        }

        let [r, g, b, a] = frame.clear.unwrap_or([0.0, 0.0, 0.0, 1.0]);
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            for (vertex_array, bind_groups, count) in &batches {
                render_pass.set_pipeline(&vertex_array.pipeline);
                for (group, bind_group) in bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(group as u32, bind_group, &[]);
                }
                render_pass.set_vertex_buffer(0, vertex_array.vertex_buffer.slice(..));
                render_pass.set_index_buffer(
                    vertex_array.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..*count, 0, 0..1);
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }
}
