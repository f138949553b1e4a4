//! Recording fakes for the backend, platform and diagnostics seams.
//!
//! Every fake is a cheap handle over shared state: keep a clone, hand the other
//! to the engine, and inspect what happened afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, bail};

use crate::coords::Color;
use crate::diagnostics::Diagnostics;
use crate::display::{ALLOWED_MODES, DisplayMode, DisplayPlatform, PresentationSettings};
use crate::frame::encode_rgba_png;
use crate::render::{BatchBegin, GraphicsBackend, MeshId, Quad, RenderSurface, ResourceCounts, TextureId, ViewTransform};

/// One call made on a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    BindTarget(Option<RenderSurface>),
    BeginBatch(BatchBegin),
    EndBatch,
    DrawQuad(Quad),
    DrawMesh(MeshId, ViewTransform),
    Clear(Color),
    CreateSurface(RenderSurface),
    ReleaseSurface(RenderSurface),
    EncodePng(RenderSurface),
    Configure(PresentationSettings),
    Present,
}

#[derive(Debug, Default)]
struct RecordingState {
    events: Vec<BackendEvent>,
    next_texture: u32,
    next_mesh: u32,
    live_surfaces: usize,
    meshes: usize,
    bound: Option<RenderSurface>,
    fills: HashMap<TextureId, Color>,
    fail_surfaces: bool,
    fail_encode: bool,
}

/// A [`GraphicsBackend`] that records every call.
///
/// Surfaces are filled with the last color they were cleared to, so encoded
/// screenshots carry real, comparable pixels.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BackendEvent> {
        self.state.borrow().events.clone()
    }

    pub fn take_events(&self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.state.borrow_mut().events)
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn count(&self, pred: impl Fn(&BackendEvent) -> bool) -> usize {
        self.state.borrow().events.iter().filter(|e| pred(e)).count()
    }

    pub fn begin_count(&self) -> usize {
        self.count(|e| matches!(e, BackendEvent::BeginBatch(_)))
    }

    pub fn end_count(&self) -> usize {
        self.count(|e| matches!(e, BackendEvent::EndBatch))
    }

    pub fn present_count(&self) -> usize {
        self.count(|e| matches!(e, BackendEvent::Present))
    }

    pub fn last_begin(&self) -> Option<BatchBegin> {
        self.state.borrow().events.iter().rev().find_map(|e| match e {
            BackendEvent::BeginBatch(begin) => Some(begin.clone()),
            _ => None,
        })
    }

    /// Target of the most recent `bind_target` call; `None` if never bound.
    pub fn last_bound(&self) -> Option<Option<RenderSurface>> {
        self.state.borrow().events.iter().rev().find_map(|e| match e {
            BackendEvent::BindTarget(target) => Some(*target),
            _ => None,
        })
    }

    pub fn quads(&self) -> Vec<Quad> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::DrawQuad(q) => Some(*q),
                _ => None,
            })
            .collect()
    }

    pub fn configured(&self) -> Vec<PresentationSettings> {
        self.state
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                BackendEvent::Configure(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn live_surfaces(&self) -> usize {
        self.state.borrow().live_surfaces
    }

    /// Registers a mesh as if a tile buffer had been uploaded.
    pub fn add_mesh(&self) -> MeshId {
        let mut state = self.state.borrow_mut();
        state.next_mesh += 1;
        state.meshes += 1;
        MeshId(state.next_mesh)
    }

    /// Makes `create_surface` return `None`.
    pub fn set_fail_surfaces(&self, fail: bool) {
        self.state.borrow_mut().fail_surfaces = fail;
    }

    /// Makes `encode_png` return an error.
    pub fn set_fail_encode(&self, fail: bool) {
        self.state.borrow_mut().fail_encode = fail;
    }

    fn record(&self, event: BackendEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

impl GraphicsBackend for RecordingBackend {
    fn bind_target(&mut self, target: Option<RenderSurface>) {
        self.state.borrow_mut().bound = target;
        self.record(BackendEvent::BindTarget(target));
    }

    fn begin_batch(&mut self, begin: &BatchBegin) {
        self.record(BackendEvent::BeginBatch(begin.clone()));
    }

    fn end_batch(&mut self) {
        self.record(BackendEvent::EndBatch);
    }

    fn draw_quad(&mut self, quad: &Quad) {
        self.record(BackendEvent::DrawQuad(*quad));
    }

    fn draw_mesh(&mut self, mesh: MeshId, transform: &ViewTransform) {
        self.record(BackendEvent::DrawMesh(mesh, *transform));
    }

    fn clear(&mut self, color: Color) {
        let mut state = self.state.borrow_mut();
        let bound = state.bound;
        if let Some(surface) = bound {
            state.fills.insert(surface.texture(), color);
        }
        state.events.push(BackendEvent::Clear(color));
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Option<RenderSurface> {
        let mut state = self.state.borrow_mut();
        if state.fail_surfaces {
            return None;
        }
        state.next_texture += 1;
        state.live_surfaces += 1;
        let surface = RenderSurface::new(TextureId(1000 + state.next_texture), width, height);
        state.events.push(BackendEvent::CreateSurface(surface));
        Some(surface)
    }

    fn release_surface(&mut self, surface: RenderSurface) {
        let mut state = self.state.borrow_mut();
        state.live_surfaces = state.live_surfaces.saturating_sub(1);
        state.fills.remove(&surface.texture());
        state.events.push(BackendEvent::ReleaseSurface(surface));
    }

    fn encode_png(&mut self, surface: RenderSurface, sink: &mut dyn Write) -> Result<()> {
        self.record(BackendEvent::EncodePng(surface));
        let (fail, fill) = {
            let state = self.state.borrow();
            let fill = state.fills.get(&surface.texture()).copied().unwrap_or(Color::TRANSPARENT);
            (state.fail_encode, fill)
        };
        if fail {
            bail!("readback failed");
        }
        let pixel = [fill.r, fill.g, fill.b, fill.a];
        let rgba = pixel.repeat(surface.width() as usize * surface.height() as usize);
        encode_rgba_png(surface.width(), surface.height(), &rgba, sink)
    }

    fn resource_counts(&self) -> ResourceCounts {
        let state = self.state.borrow();
        ResourceCounts {
            render_surfaces: state.live_surfaces,
            meshes: state.meshes,
        }
    }

    fn configure(&mut self, settings: &PresentationSettings) {
        self.record(BackendEvent::Configure(*settings));
    }

    fn present(&mut self) {
        self.record(BackendEvent::Present);
    }
}

#[derive(Debug)]
struct DisplayFakeState {
    supported: Vec<DisplayMode>,
    adapter: DisplayMode,
    client: (u32, u32),
    fullscreen: bool,
    follow_apply: bool,
    applied: Vec<PresentationSettings>,
    positions: Vec<(i32, i32)>,
}

/// A [`DisplayPlatform`] over a simulated adapter and window.
///
/// By default the window adopts every applied backbuffer size and fullscreen
/// flag at once.
#[derive(Debug, Clone)]
pub struct FakeDisplay {
    state: Rc<RefCell<DisplayFakeState>>,
}

impl FakeDisplay {
    /// An adapter whose native mode is `native`, supporting every allow-listed
    /// mode that fits plus `native` itself. The window starts at 800x600.
    pub fn new(native: DisplayMode) -> Self {
        let mut supported: Vec<DisplayMode> = ALLOWED_MODES.iter().copied().filter(|m| m.fits_within(native)).collect();
        if !supported.contains(&native) {
            supported.push(native);
        }
        Self {
            state: Rc::new(RefCell::new(DisplayFakeState {
                supported,
                adapter: native,
                client: (800, 600),
                fullscreen: false,
                follow_apply: true,
                applied: Vec::new(),
                positions: Vec::new(),
            })),
        }
    }

    pub fn set_supported_modes(&self, modes: Vec<DisplayMode>) {
        self.state.borrow_mut().supported = modes;
    }

    pub fn set_adapter_mode(&self, mode: DisplayMode) {
        self.state.borrow_mut().adapter = mode;
    }

    /// Simulates the user (or the OS) resizing the window.
    pub fn set_client_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().client = (width, height);
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.state.borrow_mut().fullscreen = fullscreen;
    }

    /// When `false`, applied settings no longer resize the window.
    pub fn set_follow_apply(&self, follow: bool) {
        self.state.borrow_mut().follow_apply = follow;
    }

    pub fn applied(&self) -> Vec<PresentationSettings> {
        self.state.borrow().applied.clone()
    }

    pub fn last_applied(&self) -> Option<PresentationSettings> {
        self.state.borrow().applied.last().copied()
    }

    pub fn clear_applied(&self) {
        self.state.borrow_mut().applied.clear();
    }

    pub fn last_position(&self) -> Option<(i32, i32)> {
        self.state.borrow().positions.last().copied()
    }
}

impl DisplayPlatform for FakeDisplay {
    fn supported_modes(&self) -> Vec<DisplayMode> {
        self.state.borrow().supported.clone()
    }

    fn adapter_mode(&self) -> DisplayMode {
        self.state.borrow().adapter
    }

    fn client_size(&self) -> (u32, u32) {
        self.state.borrow().client
    }

    fn is_fullscreen(&self) -> bool {
        self.state.borrow().fullscreen
    }

    fn apply(&mut self, settings: &PresentationSettings) {
        let mut state = self.state.borrow_mut();
        state.applied.push(*settings);
        if state.follow_apply {
            state.client = (settings.backbuffer_width, settings.backbuffer_height);
            state.fullscreen = settings.fullscreen;
        }
    }

    fn set_window_position(&mut self, x: i32, y: i32) {
        self.state.borrow_mut().positions.push((x, y));
    }
}

/// Collects warnings and status lines.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    warnings: RefCell<Vec<(String, String)>>,
    statuses: RefCell<Vec<String>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(title, message)` pairs in arrival order.
    pub fn warnings(&self) -> Vec<(String, String)> {
        self.warnings.borrow().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.borrow().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.borrow().last().cloned()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn warn(&self, title: &str, message: &str) {
        self.warnings.borrow_mut().push((title.to_owned(), message.to_owned()));
    }

    fn set_status(&self, text: &str) {
        self.statuses.borrow_mut().push(text.to_owned());
    }
}

#[derive(Debug, Default)]
struct SinkState {
    bytes: Vec<u8>,
    writes: usize,
    flushes: usize,
    closed: bool,
}

/// Observer for a screenshot sink handed to the engine via [`writer`](Self::writer).
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    state: Arc<Mutex<SinkState>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writing end; dropping it marks the sink closed.
    pub fn writer(&self) -> SinkWriter {
        SinkWriter { state: Arc::clone(&self.state) }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Number of `write` calls that delivered data.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writing end of a [`SharedSink`].
#[derive(Debug)]
pub struct SinkWriter {
    state: Arc<Mutex<SinkState>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        state.bytes.extend_from_slice(buf);
        if !buf.is_empty() {
            state.writes += 1;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).flushes += 1;
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
    }
}
