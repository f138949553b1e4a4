use std::io::Write;
use std::rc::Rc;

use anyhow::Context;

use crate::coords::{Color, Rect, Vec2};
use crate::diagnostics::Diagnostics;
use crate::display::{DisplayNegotiator, DisplayPlatform};
use crate::render::{
    BatchController, BatchState, BlendMode, DrawOrder, Font, GraphicsBackend, MeshId, Quad, RenderSurface, Texture,
    TextureRegistry, ViewTransform, measure_text, sanitize_text,
};
use crate::time::{Clock, FrameCounters};

use super::draw::{BORDER_OFFSETS, DrawText, DrawTexture, TextureSource, glyph_quads};
use super::screenshot::ScreenshotQueue;

/// Static coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Prefix of the periodic status line.
    pub title: String,
    /// Create the 1×1 white surface on initialization.
    pub white_texture: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_owned(),
            white_texture: true,
        }
    }
}

/// Frame lifecycle phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramePhase {
    Uninitialized,
    Ready,
    FrameOpen,
}

/// Drives one frame at a time through display reconciliation, batching and
/// presentation, and hosts the draw API.
///
/// Lifecycle calls made in the wrong phase are ignored (logged at debug).
/// Drawing requires an attached backend and an open frame; anything else is
/// a silent no-op, as is drawing a texture or font that is not resident.
pub struct FrameCoordinator<B: GraphicsBackend, P: DisplayPlatform> {
    config: CoordinatorConfig,
    backend: Option<B>,
    negotiator: DisplayNegotiator<P>,
    batch: BatchController,
    clock: Rc<dyn Clock>,
    diagnostics: Rc<dyn Diagnostics>,
    phase: FramePhase,
    counters: FrameCounters,
    view: Rect,
    textures: TextureRegistry,
    white: Option<RenderSurface>,
    screenshots: ScreenshotQueue,
    configured_generation: Option<u64>,
}

impl<B: GraphicsBackend, P: DisplayPlatform> FrameCoordinator<B, P> {
    pub fn new(config: CoordinatorConfig, negotiator: DisplayNegotiator<P>, backend: Option<B>) -> Self {
        let clock = Rc::clone(negotiator.clock());
        let diagnostics = Rc::clone(negotiator.diagnostics());
        let (w, h) = negotiator.screen_size();
        Self {
            config,
            backend,
            negotiator,
            batch: BatchController::new(),
            clock,
            diagnostics,
            phase: FramePhase::Uninitialized,
            counters: FrameCounters::new(),
            view: Rect::from_size(w as f32, h as f32),
            textures: TextureRegistry::new(),
            white: None,
            screenshots: ScreenshotQueue::new(),
            configured_generation: None,
        }
    }

    /// Negotiates the display from stored preferences and creates the white
    /// texture. Moves to `Ready`.
    pub fn initialize(&mut self) {
        if self.phase != FramePhase::Uninitialized {
            log::debug!("initialize ignored in {:?}", self.phase);
            return;
        }
        self.negotiator.initialize();
        self.sync_presentation();

        let (w, h) = self.negotiator.screen_size();
        self.view = Rect::from_size(w as f32, h as f32);

        if self.config.white_texture {
            self.white = self.create_white_surface();
        }
        self.phase = FramePhase::Ready;
        log::info!("frame coordinator ready at {}", self.negotiator.resolution_string());
    }

    /// Opens a frame: settle nudge if due, external change poll, then a forced
    /// default batch. Returns `false` outside `Ready`.
    pub fn begin_frame(&mut self) -> bool {
        if self.phase != FramePhase::Ready {
            log::debug!("begin_frame ignored in {:?}", self.phase);
            return false;
        }
        if let Some(steps) = self.negotiator.run_settle_nudge() {
            if let Some(backend) = self.backend.as_mut() {
                for settings in &steps {
                    backend.configure(settings);
                }
                self.configured_generation = Some(self.negotiator.generation());
            }
        }
        self.negotiator.poll_external_change();
        self.sync_presentation();

        if let Some(backend) = self.backend.as_mut() {
            self.batch.submit(backend, &BatchState::new(self.view), true);
        }
        self.phase = FramePhase::FrameOpen;
        true
    }

    /// Closes the frame: ends the batch, presents, samples FPS and runs texture
    /// maintenance.
    pub fn end_frame(&mut self) {
        if self.phase != FramePhase::FrameOpen {
            log::debug!("end_frame ignored in {:?}", self.phase);
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            self.batch.end(backend);
            backend.present();
        }

        let now = self.clock.now_ms();
        if let Some(fps) = self.counters.record_frame(now) {
            let counts = self.backend.as_ref().map(|b| b.resource_counts()).unwrap_or_default();
            self.diagnostics.set_status(&format!(
                "{} fps: {} rts: {} vbos: {}",
                self.config.title, fps, counts.render_surfaces, counts.meshes
            ));
        }
        self.textures.maintain(now);
        self.phase = FramePhase::Ready;
    }

    /// Redirects default-destination drawing into an offscreen surface the size
    /// of the screen.
    ///
    /// Returns `false`, changing nothing, outside `Ready`/`FrameOpen`, without
    /// a backend, or if the surface cannot be created.
    pub fn begin_screenshot(&mut self) -> bool {
        if self.phase == FramePhase::Uninitialized {
            return false;
        }
        if self.batch.capture_target().is_some() {
            return true;
        }
        let Some(backend) = self.backend.as_mut() else {
            log::debug!("screenshot unavailable: no graphics backend");
            return false;
        };
        let (w, h) = self.negotiator.screen_size();
        let Some(surface) = backend.create_surface(w, h) else {
            log::warn!("screenshot unavailable: cannot allocate {w}x{h} surface");
            return false;
        };
        self.batch.set_capture_target(surface);
        true
    }

    /// Finishes a capture: writes the captured image to every queued sink,
    /// releases the capture and presents the captured frame.
    ///
    /// Ends the open frame first if needed. No-op when no capture is active.
    pub fn end_screenshot(&mut self) {
        let Some(capture) = self.batch.capture_target() else {
            return;
        };
        if self.phase == FramePhase::FrameOpen {
            self.end_frame();
        }

        let sinks = self.screenshots.drain();
        let count = sinks.len();
        if let Some(backend) = self.backend.as_mut() {
            for mut sink in sinks {
                let written = backend
                    .encode_png(capture, &mut sink)
                    .and_then(|()| sink.flush().context("flush screenshot sink"));
                if let Err(e) = written {
                    log::error!("screenshot write failed: {e:#}");
                }
            }
        }
        log::info!("screenshot {}x{} written to {count} sink(s)", capture.width(), capture.height());

        self.batch.clear_capture_target();
        if let Some(backend) = self.backend.as_mut() {
            backend.bind_target(None);
        }

        if self.begin_frame() {
            if let Some(backend) = self.backend.as_mut() {
                let full = capture.bounds();
                let state = BatchState::new(full).with_blend(BlendMode::Opaque);
                self.batch.submit(backend, &state, false);
                backend.draw_quad(&Quad::new(capture.texture(), full, Vec2::ZERO));
            }
            self.end_frame();
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.release_surface(capture);
        }
    }

    pub fn draw_texture(&mut self, request: &DrawTexture<'_>) {
        if self.phase != FramePhase::FrameOpen {
            log::debug!("draw_texture outside a frame");
            return;
        }
        let Some(backend) = self.backend.as_mut() else { return };

        let (texture, pack_frame) = match request.source {
            TextureSource::Texture(texture) => {
                let Some(id) = texture.drawable() else {
                    log::trace!("texture '{}' not resident", texture.name());
                    return;
                };
                texture.mark_drawn(self.clock.now_ms());
                (id, texture.pack_frame())
            }
            TextureSource::Surface(surface) => (surface.texture(), None),
        };
        let Some(mut quad) = request.layout(texture, pack_frame) else { return };

        let viewport = match request.target {
            Some(target) => target.bounds(),
            None => {
                if request.is_ui {
                    quad.position += self.view.origin();
                }
                self.view
            }
        };
        let state = BatchState::new(viewport)
            .with_blend(request.blend)
            .with_shader(request.shader.clone())
            .with_target(request.target)
            .with_order(if request.immediate { DrawOrder::Immediate } else { DrawOrder::Deferred });

        self.batch.submit(backend, &state, false);
        backend.draw_quad(&quad);
    }

    pub fn draw_string(&mut self, request: &DrawText<'_>) {
        if self.phase != FramePhase::FrameOpen {
            log::debug!("draw_string outside a frame");
            return;
        }
        let Some(backend) = self.backend.as_mut() else { return };
        let Some(texture) = request.font.texture() else {
            log::trace!("font atlas not resident");
            return;
        };

        let text = sanitize_text(request.text, request.font);
        let mut position = request.position;
        let mut state = BatchState::new(self.view).with_target(request.target);
        if let Some(clip) = request.clip {
            position += self.view.origin();
            state = state.with_clip(Some(clip.to_pixels())).with_order(DrawOrder::Immediate);
        }
        self.batch.submit(backend, &state, false);

        let glyphs = |at: Vec2, color: Color| glyph_quads(&text, request.font, texture, at, request.scale, color);
        if !request.border.is_transparent() {
            for offset in BORDER_OFFSETS {
                for quad in glyphs(position + offset, request.border) {
                    backend.draw_quad(&quad);
                }
            }
        }
        for quad in glyphs(position, request.color) {
            backend.draw_quad(&quad);
        }

        if request.clip.is_some() {
            self.batch.end(backend);
        }
    }

    /// Draws a prebuilt tile mesh through the current view, outside any batch.
    pub fn draw_tile_buffer(&mut self, mesh: MeshId) {
        if self.phase != FramePhase::FrameOpen {
            log::debug!("draw_tile_buffer outside a frame");
            return;
        }
        let Some(backend) = self.backend.as_mut() else { return };
        self.batch.end(backend);
        backend.bind_target(self.batch.capture_target());
        backend.draw_mesh(mesh, &ViewTransform::compute(self.view));
    }

    pub fn measure_text(&self, text: &str, font: &dyn Font, scale: f32) -> Vec2 {
        measure_text(text, font, scale)
    }

    /// Clears whatever the backend currently has bound.
    pub fn clear(&mut self, color: Color) {
        if let Some(backend) = self.backend.as_mut() {
            backend.clear(color);
        }
    }

    pub fn create_render_surface(&mut self, width: u32, height: u32) -> Option<RenderSurface> {
        self.backend.as_mut()?.create_surface(width, height)
    }

    pub fn release_render_surface(&mut self, surface: RenderSurface) {
        if let Some(backend) = self.backend.as_mut() {
            backend.release_surface(surface);
        }
    }

    /// Clears `surface` to `color` outside the frame's batches.
    pub fn clear_render_surface(&mut self, surface: RenderSurface, color: Color) {
        let Some(backend) = self.backend.as_mut() else { return };
        self.batch.end(backend);
        backend.bind_target(Some(surface));
        backend.clear(color);
    }

    /// Moves the world-space window subsequent draws project through.
    pub fn set_view(&mut self, view: Rect) {
        self.view = view;
    }

    #[inline]
    pub fn view(&self) -> Rect {
        self.view
    }

    /// Keeps `texture` in the per-frame maintenance pass while it is alive.
    pub fn track_texture(&mut self, texture: &Rc<Texture>) {
        self.textures.track(texture);
    }

    pub fn fps(&self) -> u32 {
        self.counters.fps()
    }

    pub fn screen_size(&self) -> (u32, u32) {
        self.negotiator.screen_size()
    }

    pub fn consume_mode_changed(&mut self) -> bool {
        self.negotiator.consume_mode_changed()
    }

    /// 1×1 opaque white surface, for solid-colored quads.
    pub fn white_texture(&self) -> Option<RenderSurface> {
        self.white
    }

    /// Handle producers use to queue screenshot sinks.
    pub fn screenshot_queue(&self) -> ScreenshotQueue {
        self.screenshots.clone()
    }

    /// Queues a sink for the next screenshot.
    pub fn request_screenshot(&self, sink: Box<dyn Write + Send>) {
        self.screenshots.push(sink);
    }

    #[inline]
    pub fn is_capturing(&self) -> bool {
        self.batch.capture_target().is_some()
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn negotiator(&self) -> &DisplayNegotiator<P> {
        &self.negotiator
    }

    pub fn negotiator_mut(&mut self) -> &mut DisplayNegotiator<P> {
        &mut self.negotiator
    }

    pub fn batch(&self) -> &BatchController {
        &self.batch
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    /// Attaches a backend and pushes the current presentation settings to it.
    pub fn attach_backend(&mut self, backend: B) {
        self.backend = Some(backend);
        self.configured_generation = None;
        self.sync_presentation();
        if self.config.white_texture && self.white.is_none() && self.phase != FramePhase::Uninitialized {
            self.white = self.create_white_surface();
        }
    }

    /// Detaches the backend. Surfaces it created become invalid; an active
    /// capture is dropped.
    pub fn detach_backend(&mut self) -> Option<B> {
        self.batch.clear_capture_target();
        self.white = None;
        let mut backend = self.backend.take()?;
        self.batch.end(&mut backend);
        Some(backend)
    }

    fn sync_presentation(&mut self) {
        let generation = self.negotiator.generation();
        if self.configured_generation == Some(generation) {
            return;
        }
        let Some(backend) = self.backend.as_mut() else { return };
        backend.configure(&self.negotiator.settings());
        self.configured_generation = Some(generation);
    }

    fn create_white_surface(&mut self) -> Option<RenderSurface> {
        let backend = self.backend.as_mut()?;
        let surface = backend.create_surface(1, 1)?;
        backend.bind_target(Some(surface));
        backend.clear(Color::WHITE);
        backend.bind_target(None);
        Some(surface)
    }
}
