use std::collections::HashMap;
use std::ops::Range;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::atlas::{AtlasRect, PixelFormat};
use crate::coords::ScissorRect;
use crate::scene::{BlendMode, RenderState, ShaderId};

use super::{GraphicsDevice, RenderCtx, RenderTarget, SurfaceHandle, Vertex};

// ── GPU types ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    viewport: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

struct GpuSurface {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    format: PixelFormat,
    width: u32,
    height: u32,
}

struct PendingDraw {
    vertices: Range<u32>,
    blend: BlendMode,
    texture: SurfaceHandle,
    scissor: Option<ScissorRect>,
}

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

fn additive_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

// ── device ────────────────────────────────────────────────────────────────

/// [`GraphicsDevice`] on wgpu.
///
/// Long-lived GPU state (atlas textures, pipelines, vertex buffer) lives here.
/// Each flush borrows it together with a [`RenderCtx`] and [`RenderTarget`]
/// through [`frame`](Self::frame):
///
/// ```ignore
/// let mut frame = wgpu_device.frame(&ctx, &mut target);
/// let stats = renderer.end_frame(&mut frame);
/// ```
///
/// Every atlas surface is stored as `Rgba8Unorm`; R8 coverage is expanded to
/// premultiplied white on upload so one shader samples both formats. Draws are
/// recorded into a single render pass that loads the target's contents.
#[derive(Default)]
pub struct WgpuDevice {
    // pipelines (rebuilt when the target format changes)
    pipeline_format: Option<wgpu::TextureFormat>,
    pipelines: HashMap<BlendMode, wgpu::RenderPipeline>,
    shader: Option<wgpu::ShaderModule>,
    pipeline_layout: Option<wgpu::PipelineLayout>,

    // bindings
    viewport_bgl: Option<wgpu::BindGroupLayout>,
    surface_bgl: Option<wgpu::BindGroupLayout>,
    viewport_ubo: Option<wgpu::Buffer>,
    viewport_bind_group: Option<wgpu::BindGroup>,
    sampler: Option<wgpu::Sampler>,

    // atlas surfaces
    surfaces: HashMap<SurfaceHandle, GpuSurface>,
    next_handle: u64,
    upload_scratch: Vec<u8>,

    // geometry
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: u32,
    draws: Vec<PendingDraw>,

    warned_unknown_shader: bool,
}

impl WgpuDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the device to one flush target.
    pub fn frame<'d, 'c>(
        &'d mut self,
        ctx: &'d RenderCtx<'c>,
        target: &'d mut RenderTarget<'c>,
    ) -> WgpuFrame<'d, 'c> {
        WgpuFrame { device: self, ctx, target }
    }

    /// Number of GPU textures held, including the executor's fallback.
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    // ── lazy-init helpers ──────────────────────────────────────────────────

    fn ensure_bindings(&mut self, ctx: &RenderCtx<'_>) {
        if self.viewport_bind_group.is_some() && self.surface_bgl.is_some() && self.sampler.is_some() {
            return;
        }

        let viewport_bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nabu viewport bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ViewportUniform>() as u64),
                },
                count: None,
            }],
        });

        let surface_bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nabu surface bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let viewport_ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nabu viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viewport_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("nabu viewport bind group"),
            layout: &viewport_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("nabu atlas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        self.viewport_bgl = Some(viewport_bgl);
        self.surface_bgl = Some(surface_bgl);
        self.viewport_ubo = Some(viewport_ubo);
        self.viewport_bind_group = Some(viewport_bind_group);
        self.sampler = Some(sampler);
        self.pipeline_layout = None;
        self.pipelines.clear();
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, blend: BlendMode) -> Result<()> {
        if self.pipeline_format != Some(ctx.target_format) {
            self.pipelines.clear();
            self.pipeline_format = Some(ctx.target_format);
        }
        if self.pipelines.contains_key(&blend) {
            return Ok(());
        }

        if self.pipeline_layout.is_none() {
            let viewport_bgl = self.viewport_bgl.as_ref().context("viewport layout not created")?;
            let surface_bgl = self.surface_bgl.as_ref().context("surface layout not created")?;
            self.pipeline_layout = Some(ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("nabu batch pipeline layout"),
                bind_group_layouts: &[viewport_bgl, surface_bgl],
                immediate_size: 0,
            }));
        }
        let shader = self.shader.get_or_insert_with(|| {
            ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("nabu batch shader"),
                source: wgpu::ShaderSource::Wgsl(include_str!("shaders/batch.wgsl").into()),
            })
        });
        let layout = self.pipeline_layout.as_ref().context("pipeline layout not created")?;

        let blend_state = match blend {
            BlendMode::Alpha => Some(premul_alpha_blend()),
            BlendMode::Additive => Some(additive_blend()),
            BlendMode::Opaque => None,
        };

        log::debug!("creating batch pipeline for {blend:?} ({:?})", ctx.target_format);
        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("nabu batch pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.target_format,
                    blend: blend_state,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(blend, pipeline);
        Ok(())
    }

    fn ensure_vertex_capacity(&mut self, ctx: &RenderCtx<'_>, required: u32) {
        if required <= self.vertex_capacity && self.vertex_buffer.is_some() {
            return;
        }
        let new_cap = required.next_power_of_two().max(1024);
        let new_size = new_cap as u64 * std::mem::size_of::<Vertex>() as u64;
        self.vertex_buffer = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nabu batch vbo"),
            size: new_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.vertex_capacity = new_cap;
    }
}

// ── per-flush binding ─────────────────────────────────────────────────────

/// A [`WgpuDevice`] bound to one target for one flush.
pub struct WgpuFrame<'d, 'c> {
    device: &'d mut WgpuDevice,
    ctx: &'d RenderCtx<'c>,
    target: &'d mut RenderTarget<'c>,
}

impl GraphicsDevice for WgpuFrame<'_, '_> {
    fn create_surface(&mut self, width: u32, height: u32, format: PixelFormat) -> Result<SurfaceHandle> {
        anyhow::ensure!(width > 0 && height > 0, "surface has zero size");
        let ctx = self.ctx;
        let dev = &mut *self.device;
        dev.ensure_bindings(ctx);

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("nabu atlas surface"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let layout = dev.surface_bgl.as_ref().context("surface layout not created")?;
        let sampler = dev.sampler.as_ref().context("sampler not created")?;
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("nabu atlas surface bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        dev.next_handle += 1;
        let handle = SurfaceHandle(dev.next_handle);
        dev.surfaces.insert(handle, GpuSurface { texture, bind_group, format, width, height });
        log::debug!("gpu: created {width}x{height} surface {handle:?} ({format:?})");
        Ok(handle)
    }

    fn upload_texture_region(&mut self, surface: SurfaceHandle, region: AtlasRect, pixels: &[u8]) -> Result<()> {
        let dev = &mut *self.device;
        let gpu = dev
            .surfaces
            .get(&surface)
            .with_context(|| format!("upload to unknown surface {surface:?}"))?;
        anyhow::ensure!(
            region.right() <= gpu.width && region.bottom() <= gpu.height,
            "upload region {region:?} outside {}x{} surface",
            gpu.width,
            gpu.height
        );
        let texels = region.width as usize * region.height as usize;
        anyhow::ensure!(
            pixels.len() == texels * gpu.format.bytes_per_pixel(),
            "upload of {} bytes does not match {region:?}",
            pixels.len()
        );
        if texels == 0 {
            return Ok(());
        }

        let rgba: &[u8] = match gpu.format {
            PixelFormat::Rgba8 => pixels,
            PixelFormat::R8 => {
                dev.upload_scratch.clear();
                dev.upload_scratch.extend(pixels.iter().flat_map(|&c| [c; 4]));
                &dev.upload_scratch
            }
        };

        self.ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: region.x, y: region.y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d { width: region.width, height: region.height, depth_or_array_layers: 1 },
        );
        Ok(())
    }

    fn begin_frame(&mut self, vertex_count: u32) -> Result<()> {
        let ctx = self.ctx;
        anyhow::ensure!(ctx.viewport.is_valid(), "invalid viewport {:?}", ctx.viewport);
        let dev = &mut *self.device;
        dev.ensure_bindings(ctx);
        dev.ensure_vertex_capacity(ctx, vertex_count);
        dev.draws.clear();

        let ubo = dev.viewport_ubo.as_ref().context("viewport ubo not created")?;
        let uniform = ViewportUniform {
            viewport: [ctx.viewport.width, ctx.viewport.height],
            _pad: [0.0; 2],
        };
        ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&uniform));
        Ok(())
    }

    fn upload_vertices(&mut self, first: u32, vertices: &[Vertex]) -> Result<()> {
        let dev = &*self.device;
        anyhow::ensure!(
            first as u64 + vertices.len() as u64 <= dev.vertex_capacity as u64,
            "vertex upload {first}+{} exceeds capacity {}",
            vertices.len(),
            dev.vertex_capacity
        );
        if vertices.is_empty() {
            return Ok(());
        }
        let vbo = dev.vertex_buffer.as_ref().context("vertex buffer not created")?;
        let offset = first as u64 * std::mem::size_of::<Vertex>() as u64;
        self.ctx.queue.write_buffer(vbo, offset, bytemuck::cast_slice(vertices));
        Ok(())
    }

    fn draw(&mut self, vertices: Range<u32>, state: &RenderState, texture: SurfaceHandle) -> Result<()> {
        let ctx = self.ctx;
        let dev = &mut *self.device;
        anyhow::ensure!(dev.surfaces.contains_key(&texture), "draw with unknown surface {texture:?}");
        if state.shader != ShaderId::DEFAULT && !dev.warned_unknown_shader {
            log::warn!("shader {:?} is not registered; using the default program", state.shader);
            dev.warned_unknown_shader = true;
        }
        dev.ensure_pipeline(ctx, state.blend)?;
        dev.draws.push(PendingDraw {
            vertices,
            blend: state.blend,
            texture,
            scissor: state.scissor,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let dev = &mut *self.device;
        if dev.draws.is_empty() {
            return Ok(());
        }
        let (phys_w, phys_h) = self.ctx.viewport.physical_size();

        let vbo = dev.vertex_buffer.as_ref().context("vertex buffer not created")?;
        let viewport_bind_group = dev.viewport_bind_group.as_ref().context("viewport bind group not created")?;

        let mut rpass = self.target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("nabu batch pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_bind_group(0, viewport_bind_group, &[]);
        rpass.set_vertex_buffer(0, vbo.slice(..));

        for draw in dev.draws.drain(..) {
            let clip = match draw.scissor {
                None => Some(ScissorRect::new(0, 0, phys_w, phys_h)),
                Some(s) => s.clamp_to(phys_w, phys_h),
            };
            // Entirely off-target.
            let Some(clip) = clip else { continue };
            let Some(pipeline) = dev.pipelines.get(&draw.blend) else { continue };
            let Some(surface) = dev.surfaces.get(&draw.texture) else { continue };

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(1, &surface.bind_group, &[]);
            rpass.set_scissor_rect(clip.x, clip.y, clip.width, clip.height);
            rpass.draw(draw.vertices, 0..1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_holds_no_gpu_state() {
        let dev = WgpuDevice::new();
        assert_eq!(dev.surface_count(), 0);
        assert_eq!(dev.vertex_capacity, 0);
        assert!(dev.pipelines.is_empty());
    }

    #[test]
    fn alpha_blend_is_premultiplied_source_over() {
        let blend = premul_alpha_blend();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(blend.alpha, blend.color);
        assert_eq!(additive_blend().color.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn viewport_uniform_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<ViewportUniform>(), 16);
    }
}
