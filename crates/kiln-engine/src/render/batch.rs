use super::backend::{BatchBegin, BlendPreset, GraphicsBackend, ShaderBinding};
use super::state::BatchState;
use super::texture::RenderSurface;
use super::view::ViewTransform;

/// Decides when the open batch must be flushed and a new one begun.
///
/// Redundant submissions collapse: as long as requests compare equal to the
/// open batch's state, nothing reaches the backend. Any difference in blend
/// mode, shader identity, shader parameters, resolved destination, viewport or
/// clip ends the open batch and begins a new one. Immediate-order requests and
/// forced submissions always flush.
#[derive(Debug, Default)]
pub struct BatchController {
    current: Option<BatchState>,
    current_target: Option<RenderSurface>,
    open: bool,
    capture: Option<RenderSurface>,
    flushes: u64,
}

impl BatchController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a batch matching `requested` is open. Returns `true` if a new
    /// batch was begun.
    pub fn submit<B>(&mut self, backend: &mut B, requested: &BatchState, forced: bool) -> bool
    where
        B: GraphicsBackend + ?Sized,
    {
        let target = self.resolve_target(requested);
        if !self.needs_flush(requested, target, forced) {
            return false;
        }

        self.end(backend);
        backend.bind_target(target);

        let shader = requested.shader.as_ref().map(|shader| {
            let binding = ShaderBinding {
                id: shader.id(),
                params: shader.params(),
            };
            shader.reset_changed();
            binding
        });

        let begin = BatchBegin {
            preset: BlendPreset::from(requested.blend),
            shader,
            transform: ViewTransform::compute(requested.viewport),
            order: requested.order,
            clip: requested.clip,
        };
        log::trace!(
            "batch begin: {:?} shader={:?} target={:?} viewport={:?} clip={:?} {:?}",
            begin.preset,
            begin.shader.map(|s| s.id),
            target.map(|t| t.texture()),
            requested.viewport,
            begin.clip,
            begin.order,
        );
        backend.begin_batch(&begin);

        self.current = Some(requested.clone());
        self.current_target = target;
        self.open = true;
        self.flushes += 1;
        true
    }

    /// Ends the open batch, if any.
    pub fn end<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend + ?Sized,
    {
        if !self.open {
            return;
        }
        backend.end_batch();
        self.open = false;
    }

    /// Redirects requests without an explicit target into `surface`.
    ///
    /// The next submission resolves to a different destination and therefore
    /// flushes.
    pub fn set_capture_target(&mut self, surface: RenderSurface) {
        self.capture = Some(surface);
    }

    pub fn clear_capture_target(&mut self) -> Option<RenderSurface> {
        self.capture.take()
    }

    #[inline]
    pub fn capture_target(&self) -> Option<RenderSurface> {
        self.capture
    }

    /// Destination a request renders into: its own target, else the active
    /// capture target, else the primary surface (`None`).
    pub fn resolve_target(&self, requested: &BatchState) -> Option<RenderSurface> {
        requested.target.or(self.capture)
    }

    /// State of the most recently begun batch, open or not.
    #[inline]
    pub fn current(&self) -> Option<&BatchState> {
        self.current.as_ref()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Batches begun so far.
    #[inline]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    fn needs_flush(&self, requested: &BatchState, target: Option<RenderSurface>, forced: bool) -> bool {
        if forced || !self.open || requested.is_immediate() {
            return true;
        }
        if requested.shader.as_ref().is_some_and(|s| s.values_changed()) {
            return true;
        }
        let Some(current) = &self.current else {
            return true;
        };
        current.blend != requested.blend
            || !current.same_shader(requested)
            || self.current_target != target
            || current.viewport != requested.viewport
            || current.clip != requested.clip
            || current.order != requested.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{PixelRect, Rect};
    use crate::render::shader::{Shader, ShaderId};
    use crate::render::state::{BlendMode, DrawOrder};
    use crate::render::texture::TextureId;
    use crate::testing::{BackendEvent, RecordingBackend};

    fn base() -> BatchState {
        BatchState::new(Rect::from_size(800.0, 600.0))
    }

    #[test]
    fn identical_submissions_collapse_into_one_batch() {
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();

        assert!(batch.submit(&mut backend, &base(), false));
        for _ in 0..50 {
            assert!(!batch.submit(&mut backend, &base(), false));
        }

        assert_eq!(backend.begin_count(), 1);
        assert_eq!(backend.end_count(), 0);
        assert!(batch.is_open());
    }

    #[test]
    fn single_field_changes_flush_once() {
        let shader = Shader::new(ShaderId(2), "tint");
        let surface = RenderSurface::new(TextureId(40), 64, 64);
        let variants = [
            base().with_blend(BlendMode::Add),
            base().with_shader(Some(shader)),
            base().with_target(Some(surface)),
            BatchState::new(Rect::new(10.0, 0.0, 800.0, 600.0)),
            base().with_clip(Some(PixelRect::new(0, 0, 32, 32))),
        ];

        for variant in variants {
            let mut backend = RecordingBackend::new();
            let mut batch = BatchController::new();
            batch.submit(&mut backend, &base(), false);
            backend.clear_events();

            assert!(batch.submit(&mut backend, &variant, false), "{variant:?}");
            assert!(!batch.submit(&mut backend, &variant, false));
            assert_eq!(backend.end_count(), 1);
            assert_eq!(backend.begin_count(), 1);
        }
    }

    #[test]
    fn flush_sequence_is_end_bind_begin() {
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();
        batch.submit(&mut backend, &base(), false);
        backend.clear_events();

        batch.submit(&mut backend, &base().with_blend(BlendMode::Multiply), false);
        let events = backend.events();
        assert!(matches!(events[0], BackendEvent::EndBatch));
        assert!(matches!(events[1], BackendEvent::BindTarget(None)));
        match &events[2] {
            BackendEvent::BeginBatch(begin) => {
                assert_eq!(begin.preset, BlendPreset::Multiply);
                assert_eq!(begin.order, DrawOrder::Deferred);
                assert_eq!(begin.transform, ViewTransform::compute(Rect::from_size(800.0, 600.0)));
            }
            other => panic!("expected begin, got {other:?}"),
        }
    }

    #[test]
    fn dirty_shader_forces_flush_and_is_cleared() {
        let shader = Shader::new(ShaderId(5), "wave");
        let state = base().with_shader(Some(shader.clone()));
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();

        batch.submit(&mut backend, &state, false);
        shader.set_param(0, 0.5);
        assert!(shader.values_changed());

        assert!(batch.submit(&mut backend, &state, false));
        assert!(!shader.values_changed());
        assert!(!batch.submit(&mut backend, &state, false));

        let last = backend.last_begin().expect("batch begun");
        assert_eq!(
            last.shader,
            Some(ShaderBinding { id: ShaderId(5), params: [0.5, 0.0, 0.0, 0.0] })
        );
    }

    #[test]
    fn forced_and_immediate_always_flush() {
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();
        batch.submit(&mut backend, &base(), false);

        assert!(batch.submit(&mut backend, &base(), true));
        let immediate = base().with_order(DrawOrder::Immediate);
        assert!(batch.submit(&mut backend, &immediate, false));
        assert!(batch.submit(&mut backend, &immediate, false));
        assert_eq!(backend.begin_count(), 4);
    }

    #[test]
    fn capture_target_resolves_default_destination() {
        let capture = RenderSurface::new(TextureId(77), 800, 600);
        let explicit = RenderSurface::new(TextureId(12), 32, 32);
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();

        batch.submit(&mut backend, &base(), false);
        batch.set_capture_target(capture);
        assert!(batch.submit(&mut backend, &base(), false));
        assert_eq!(backend.last_bound(), Some(Some(capture)));

        batch.submit(&mut backend, &base().with_target(Some(explicit)), false);
        assert_eq!(backend.last_bound(), Some(Some(explicit)));

        assert_eq!(batch.clear_capture_target(), Some(capture));
        assert!(batch.submit(&mut backend, &base(), false));
        assert_eq!(backend.last_bound(), Some(None));
    }

    #[test]
    fn end_is_idempotent() {
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();
        batch.end(&mut backend);
        batch.submit(&mut backend, &base(), false);
        batch.end(&mut backend);
        batch.end(&mut backend);

        assert_eq!(backend.end_count(), 1);
        assert!(!batch.is_open());
        assert!(batch.current().is_some());
    }

    #[test]
    fn submit_after_end_reopens() {
        let mut backend = RecordingBackend::new();
        let mut batch = BatchController::new();
        batch.submit(&mut backend, &base(), false);
        batch.end(&mut backend);
        assert!(batch.submit(&mut backend, &base(), false));
        assert_eq!(batch.flush_count(), 2);
    }
}
