use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::coords::{Color, PixelRect};
use crate::display::PresentationSettings;
use crate::render::{
    BatchBegin, BlendPreset, DrawOrder, GraphicsBackend, MeshId, Quad, RenderSurface, ResourceCounts, Shader,
    ShaderHandle, ShaderId, TextureId, ViewTransform,
};

use super::context::{Gpu, SurfaceErrorAction};
use super::pipeline::SpritePipelines;
use super::readback;
use super::vertex::{Globals, SpriteVertex, quad_indices, quad_vertices};

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    render_target: bool,
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    texture: TextureId,
}

struct AcquiredFrame {
    surface: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// Consecutive quads sharing a texture.
#[derive(Debug, Copy, Clone)]
struct TextureRun {
    texture: TextureId,
    first: u32,
    quads: u32,
}

struct OpenBatch {
    begin: BatchBegin,
    vertices: Vec<SpriteVertex>,
    runs: Vec<TextureRun>,
}

impl OpenBatch {
    fn new(begin: BatchBegin) -> Self {
        Self {
            begin,
            vertices: Vec::new(),
            runs: Vec::new(),
        }
    }

    fn push(&mut self, texture: TextureId, vertices: [SpriteVertex; 4]) {
        let index = (self.vertices.len() / 4) as u32;
        self.vertices.extend_from_slice(&vertices);
        match self.runs.last_mut() {
            Some(run) if run.texture == texture => run.quads += 1,
            _ => self.runs.push(TextureRun {
                texture,
                first: index,
                quads: 1,
            }),
        }
    }
}

/// wgpu implementation of [`GraphicsBackend`].
///
/// Quads are expanded on the CPU and recorded as one render pass per flushed
/// batch (per quad for immediate batches). The swapchain texture is acquired
/// the first time something is drawn to the primary surface in a frame and
/// presented by [`present`](GraphicsBackend::present).
pub struct WgpuBackend<'w> {
    gpu: Gpu<'w>,
    pipelines: SpritePipelines,
    textures: HashMap<TextureId, GpuTexture>,
    meshes: HashMap<MeshId, GpuMesh>,
    next_texture: u32,
    next_mesh: u32,
    next_shader: u32,
    encoder: Option<wgpu::CommandEncoder>,
    frame: Option<AcquiredFrame>,
    target: Option<RenderSurface>,
    batch: Option<OpenBatch>,
    lost: bool,
}

impl<'w> WgpuBackend<'w> {
    pub fn new(gpu: Gpu<'w>) -> Self {
        let pipelines = SpritePipelines::new(gpu.device(), gpu.surface_format());
        Self {
            gpu,
            pipelines,
            textures: HashMap::new(),
            meshes: HashMap::new(),
            next_texture: 1,
            next_mesh: 1,
            next_shader: 1,
            encoder: None,
            frame: None,
            target: None,
            batch: None,
            lost: false,
        }
    }

    pub fn gpu(&self) -> &Gpu<'w> {
        &self.gpu
    }

    /// `true` once the surface reported an unrecoverable error.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Follows the window's drawable size.
    pub fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.discard_frame();
        self.gpu.resize(size);
    }

    /// Uploads tightly packed RGBA8 pixels as a sampleable texture.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<TextureId> {
        anyhow::ensure!(width > 0 && height > 0, "texture has zero size");
        anyhow::ensure!(
            rgba.len() == width as usize * height as usize * 4,
            "expected {} bytes of RGBA for {width}x{height}, got {}",
            width as usize * height as usize * 4,
            rgba.len()
        );

        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(self.insert_texture(texture, width, height, false))
    }

    /// Decodes a PNG and uploads it.
    pub fn load_png(&mut self, bytes: &[u8]) -> Result<TextureId> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .context("failed to decode png")?
            .to_rgba8();
        let (w, h) = image.dimensions();
        self.create_texture(w, h, image.as_raw())
    }

    pub fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    /// Builds a static mesh (tile buffer) in world coordinates sampling `texture`.
    pub fn create_mesh(&mut self, texture: TextureId, vertices: &[SpriteVertex], indices: &[u32]) -> Result<MeshId> {
        anyhow::ensure!(!indices.is_empty(), "mesh has no indices");
        anyhow::ensure!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "mesh index out of range"
        );
        let device = self.gpu.device();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln mesh vbo"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln mesh ibo"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let id = MeshId(self.next_mesh);
        self.next_mesh += 1;
        self.meshes.insert(
            id,
            GpuMesh {
                vertices: vertex_buffer,
                indices: index_buffer,
                index_count: indices.len() as u32,
                texture,
            },
        );
        Ok(id)
    }

    pub fn release_mesh(&mut self, id: MeshId) {
        self.meshes.remove(&id);
    }

    /// Registers a custom fragment stage (see [`SpritePipelines::add_shader`]).
    pub fn register_shader(&mut self, name: &str, fragment_wgsl: &str) -> ShaderHandle {
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;
        self.pipelines.add_shader(self.gpu.device(), id, name, fragment_wgsl);
        Shader::new(id, name)
    }

    fn insert_texture(&mut self, texture: wgpu::Texture, width: u32, height: u32, render_target: bool) -> TextureId {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.pipelines.texture_bind_group(self.gpu.device(), &view);
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id,
            GpuTexture {
                texture,
                view,
                bind_group,
                width,
                height,
                render_target,
            },
        );
        id
    }

    fn acquire_frame(&mut self) {
        if self.frame.is_some() || self.lost {
            return;
        }
        match self.gpu.acquire() {
            Ok(surface) => {
                let view = surface.texture.create_view(&wgpu::TextureViewDescriptor::default());
                let (width, height) = (surface.texture.width(), surface.texture.height());
                self.frame = Some(AcquiredFrame {
                    surface,
                    view,
                    width,
                    height,
                });
            }
            Err(err) => {
                let reason = err.to_string();
                match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface lost for good: {reason}");
                        self.lost = true;
                    }
                    action => log::debug!("skipping frame: {reason} ({action:?})"),
                }
            }
        }
    }

    /// Acquires the swapchain texture when the primary surface is about to be
    /// drawn to.
    fn prepare_target(&mut self) {
        if self.target.is_none() {
            self.acquire_frame();
        }
    }

    fn discard_frame(&mut self) {
        self.flush_batch();
        self.submit();
        self.frame = None;
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.gpu.queue().submit(std::iter::once(encoder.finish()));
        }
    }

    /// Records the quads queued in the open batch, keeping the batch open.
    fn flush_batch(&mut self) {
        let Some(batch) = self.batch.as_mut() else { return };
        if batch.vertices.is_empty() {
            return;
        }
        let vertices = std::mem::take(&mut batch.vertices);
        let runs = std::mem::take(&mut batch.runs);
        let begin = batch.begin.clone();
        self.record_sprites(&begin, &vertices, &runs);
    }

    fn record_sprites(&mut self, begin: &BatchBegin, vertices: &[SpriteVertex], runs: &[TextureRun]) {
        self.prepare_target();
        let Self {
            gpu,
            pipelines,
            textures,
            encoder,
            frame,
            target,
            ..
        } = self;
        let Some((view, width, height)) = target_view(*target, textures, frame) else {
            log::trace!("no drawable target; dropped {} quads", vertices.len() / 4);
            return;
        };
        let scissor = match begin.clip {
            Some(clip) => match clip.clamp_to(width, height) {
                Some(rect) => Some(rect),
                None => return,
            },
            None => None,
        };

        let device = gpu.device();
        let params = begin.shader.map(|s| s.params).unwrap_or_default();
        let globals = Globals::new(&begin.transform, params);
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln batch globals"),
            contents: bytemuck::bytes_of(&globals),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let globals_group = pipelines.globals_bind_group(device, &globals_buffer);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln batch vbo"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln batch ibo"),
            contents: bytemuck::cast_slice(&quad_indices((vertices.len() / 4) as u32)),
            usage: wgpu::BufferUsages::INDEX,
        });
        let pipeline = pipelines.get(device, begin.preset, begin.shader.map(|s| s.id));

        let encoder = encoder.get_or_insert_with(|| new_encoder(device));
        let mut pass = begin_pass(encoder, view, wgpu::LoadOp::Load);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &globals_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        if let Some(rect) = scissor {
            set_scissor(&mut pass, rect);
        }

        let bound = target.map(|t| t.texture());
        for run in runs {
            if Some(run.texture) == bound {
                log::warn!("texture {:?} sampled while bound as the target; skipped", run.texture);
                continue;
            }
            let Some(texture) = textures.get(&run.texture) else { continue };
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.draw_indexed(run.first * 6..(run.first + run.quads) * 6, 0, 0..1);
        }
    }
}

fn target_view<'a>(
    target: Option<RenderSurface>,
    textures: &'a HashMap<TextureId, GpuTexture>,
    frame: &'a Option<AcquiredFrame>,
) -> Option<(&'a wgpu::TextureView, u32, u32)> {
    match target {
        Some(surface) => textures
            .get(&surface.texture())
            .map(|t| (&t.view, t.width, t.height)),
        None => frame.as_ref().map(|f| (&f.view, f.width, f.height)),
    }
}

fn new_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("kiln frame encoder"),
    })
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("kiln pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

fn set_scissor(pass: &mut wgpu::RenderPass<'_>, rect: PixelRect) {
    pass.set_scissor_rect(rect.x.max(0) as u32, rect.y.max(0) as u32, rect.width, rect.height);
}

fn to_wgpu_color(color: Color) -> wgpu::Color {
    let [r, g, b, a] = color.to_f32_array();
    wgpu::Color {
        r: f64::from(r),
        g: f64::from(g),
        b: f64::from(b),
        a: f64::from(a),
    }
}

impl GraphicsBackend for WgpuBackend<'_> {
    fn bind_target(&mut self, target: Option<RenderSurface>) {
        self.flush_batch();
        self.target = target;
    }

    fn begin_batch(&mut self, begin: &BatchBegin) {
        self.flush_batch();
        self.batch = Some(OpenBatch::new(begin.clone()));
    }

    fn end_batch(&mut self) {
        self.flush_batch();
        self.batch = None;
    }

    fn draw_quad(&mut self, quad: &Quad) {
        let Some(texture) = self.textures.get(&quad.texture) else {
            log::trace!("draw_quad with unknown texture {:?}", quad.texture);
            return;
        };
        let vertices = quad_vertices(quad, texture.width, texture.height);
        let Some(batch) = self.batch.as_mut() else {
            log::trace!("draw_quad without an open batch");
            return;
        };
        batch.push(quad.texture, vertices);
        if batch.begin.order == DrawOrder::Immediate {
            self.flush_batch();
        }
    }

    fn draw_mesh(&mut self, mesh: MeshId, transform: &ViewTransform) {
        self.flush_batch();
        self.prepare_target();
        let Self {
            gpu,
            pipelines,
            textures,
            meshes,
            encoder,
            frame,
            target,
            ..
        } = self;
        let Some(mesh) = meshes.get(&mesh) else {
            log::trace!("draw_mesh with unknown mesh {mesh:?}");
            return;
        };
        let Some(texture) = textures.get(&mesh.texture) else { return };
        let Some((view, _, _)) = target_view(*target, textures, frame) else { return };

        let device = gpu.device();
        let globals = Globals::new(transform, Default::default());
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kiln mesh globals"),
            contents: bytemuck::bytes_of(&globals),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let globals_group = pipelines.globals_bind_group(device, &globals_buffer);
        let pipeline = pipelines.get(device, BlendPreset::Normal, None);

        let encoder = encoder.get_or_insert_with(|| new_encoder(device));
        let mut pass = begin_pass(encoder, view, wgpu::LoadOp::Load);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &globals_group, &[]);
        pass.set_bind_group(1, &texture.bind_group, &[]);
        pass.set_vertex_buffer(0, mesh.vertices.slice(..));
        pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    fn clear(&mut self, color: Color) {
        self.flush_batch();
        self.prepare_target();
        let Self {
            gpu,
            textures,
            encoder,
            frame,
            target,
            ..
        } = self;
        let Some((view, _, _)) = target_view(*target, textures, frame) else { return };
        let encoder = encoder.get_or_insert_with(|| new_encoder(gpu.device()));
        let _pass = begin_pass(encoder, view, wgpu::LoadOp::Clear(to_wgpu_color(color)));
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Option<RenderSurface> {
        if width == 0 || height == 0 {
            return None;
        }
        let texture = self.gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln render surface"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.pipelines.format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let id = self.insert_texture(texture, width, height, true);
        log::debug!("render surface {id:?} {width}x{height}");
        Some(RenderSurface::new(id, width, height))
    }

    fn release_surface(&mut self, surface: RenderSurface) {
        if self.target == Some(surface) {
            self.flush_batch();
            self.target = None;
        }
        if self.textures.get(&surface.texture()).is_some_and(|t| t.render_target) {
            self.textures.remove(&surface.texture());
        }
    }

    fn encode_png(&mut self, surface: RenderSurface, sink: &mut dyn Write) -> Result<()> {
        self.flush_batch();
        self.submit();
        let texture = self
            .textures
            .get(&surface.texture())
            .filter(|t| t.render_target)
            .with_context(|| format!("unknown render surface {:?}", surface.texture()))?;
        readback::write_png(
            self.gpu.device(),
            self.gpu.queue(),
            &texture.texture,
            texture.width,
            texture.height,
            sink,
        )
    }

    fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            render_surfaces: self.textures.values().filter(|t| t.render_target).count(),
            meshes: self.meshes.len(),
        }
    }

    fn configure(&mut self, settings: &PresentationSettings) {
        self.discard_frame();
        self.gpu.reconfigure(
            PhysicalSize::new(settings.backbuffer_width, settings.backbuffer_height),
            settings.vsync,
        );
    }

    fn present(&mut self) {
        self.flush_batch();
        self.batch = None;
        self.submit();
        if let Some(frame) = self.frame.take() {
            frame.surface.present();
        }
        self.target = None;
    }
}
