use std::cell::OnceCell;
use std::rc::Rc;

use crate::diagnostics::Diagnostics;
use crate::time::Clock;

use super::mode::{DisplayMode, FALLBACK_MODE, build_catalog};
use super::platform::{DisplayPlatform, FrameRateCap, PresentationSettings};
use super::prefs::PreferenceStore;

/// Delay between leaving fullscreen and the backbuffer nudge.
pub const SETTLE_DELAY_MS: u64 = 1000;

/// Warning title for a fullscreen request the adapter cannot honour.
pub const UNSUPPORTED_RESOLUTION_TITLE: &str = "Resolution not supported";

/// Snapshot of the negotiated display configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub requested_fullscreen: bool,
    pub current_fullscreen: bool,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Adapter mode observed at the last negotiation.
    pub native_mode: DisplayMode,
    /// Set by fullscreen exits and external changes; cleared on read.
    pub mode_changed: bool,
    /// When the pending backbuffer nudge becomes due.
    pub settle_deadline: Option<u64>,
}

/// Outcome of resolving a stored resolution index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedMode {
    pub mode: DisplayMode,
    pub index: usize,
    /// The stored index was out of range and has been rewritten.
    pub corrected: bool,
}

/// Reconciles requested display settings with what the adapter supports.
///
/// Owns the display state exclusively; every change goes through
/// [`negotiate`](Self::negotiate). Each commit to the platform bumps
/// [`generation`](Self::generation) so the graphics backend can follow.
pub struct DisplayNegotiator<P: DisplayPlatform> {
    platform: P,
    prefs: Box<dyn PreferenceStore>,
    clock: Rc<dyn Clock>,
    diagnostics: Rc<dyn Diagnostics>,
    catalog: OnceCell<Vec<DisplayMode>>,
    state: DisplayState,
    settings: PresentationSettings,
    generation: u64,
}

impl<P: DisplayPlatform> DisplayNegotiator<P> {
    pub fn new(
        platform: P,
        prefs: Box<dyn PreferenceStore>,
        clock: Rc<dyn Clock>,
        diagnostics: Rc<dyn Diagnostics>,
    ) -> Self {
        let (width, height) = platform.client_size();
        let state = DisplayState {
            requested_fullscreen: false,
            current_fullscreen: platform.is_fullscreen(),
            screen_width: width,
            screen_height: height,
            native_mode: platform.adapter_mode(),
            mode_changed: false,
            settle_deadline: None,
        };
        Self {
            platform,
            prefs,
            clock,
            diagnostics,
            catalog: OnceCell::new(),
            state,
            settings: PresentationSettings::windowed(width, height),
            generation: 0,
        }
    }

    /// Allow-listed modes this adapter can show, built on first use.
    pub fn mode_catalog(&self) -> &[DisplayMode] {
        self.catalog.get_or_init(|| {
            let catalog = build_catalog(&self.platform.supported_modes(), self.platform.adapter_mode());
            log::debug!(
                "mode catalog: [{}]",
                catalog.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            );
            catalog
        })
    }

    /// Maps a stored resolution index to a catalog mode.
    ///
    /// Out-of-range indices resolve to entry 0 and the corrected index is
    /// persisted. An empty catalog resolves to 800x600; index 0 then needs no
    /// correction.
    pub fn resolve_requested_mode(&mut self, index: i32) -> ResolvedMode {
        let (mode, resolved, corrected) = {
            let catalog = self.mode_catalog();
            match usize::try_from(index).ok().and_then(|i| catalog.get(i).map(|m| (i, *m))) {
                Some((i, mode)) => (mode, i, false),
                None => (catalog.first().copied().unwrap_or(FALLBACK_MODE), 0, index != 0),
            }
        };

        if corrected {
            log::info!("resolution index {index} out of range, using {mode}");
            self.prefs.set_resolution_index(0);
            self.persist();
        }
        ResolvedMode { mode, index: resolved, corrected }
    }

    /// Negotiates from stored preferences: resolution index and fullscreen.
    pub fn initialize(&mut self) {
        self.apply_preferences();
    }

    /// Re-reads preferences and negotiates them.
    pub fn apply_preferences(&mut self) {
        let resolved = self.resolve_requested_mode(self.prefs.resolution_index());
        let fullscreen = self.prefs.fullscreen();
        self.negotiate(resolved.mode.width, resolved.mode.height, fullscreen);
    }

    /// Commits `width` × `height`, fullscreen or windowed.
    ///
    /// A fullscreen request for a mode the adapter does not list exactly (or
    /// that exceeds the native mode) is downgraded to windowed, the downgrade
    /// is persisted and the user is warned. Leaving fullscreen commits the
    /// windowed flag on its own before resizing and schedules the settle nudge.
    pub fn negotiate(&mut self, width: u32, height: u32, fullscreen: bool) {
        let requested = DisplayMode::new(width, height);
        let mut fullscreen = fullscreen;

        if fullscreen && !self.supports_fullscreen(requested) {
            fullscreen = false;
            self.prefs.set_fullscreen(false);
            self.persist();
            self.diagnostics.warn(
                UNSUPPORTED_RESOLUTION_TITLE,
                &format!("{requested} is not supported in fullscreen by this display"),
            );
        }

        let transition = self.platform.is_fullscreen() != fullscreen && !fullscreen;
        self.state.requested_fullscreen = fullscreen;
        if transition {
            let exit = PresentationSettings { fullscreen: false, ..self.settings };
            self.commit(exit);
        }

        let cap = FrameRateCap::from_level(self.prefs.frame_rate_cap());
        let settings = PresentationSettings {
            fullscreen,
            backbuffer_width: width,
            backbuffer_height: height,
            vsync: true,
            frame_interval: None,
        }
        .with_frame_rate_cap(cap);
        self.commit(settings);

        let native = self.platform.adapter_mode();
        self.state.screen_width = width;
        self.state.screen_height = height;
        self.state.current_fullscreen = fullscreen;
        self.state.native_mode = native;

        let x = (i64::from(native.width) - i64::from(width)) / 2;
        let y = (i64::from(native.height) - i64::from(height)) / 2;
        self.platform.set_window_position(x as i32, y as i32);

        if transition {
            self.state.settle_deadline = Some(self.clock.now_ms() + SETTLE_DELAY_MS);
            self.state.mode_changed = true;
        }

        log::info!(
            "display: {requested} {} cap={:?} native={native}",
            if fullscreen { "fullscreen" } else { "windowed" },
            cap,
        );
    }

    /// Runs the pending backbuffer nudge once its deadline has passed: commits
    /// one pixel narrower, then the real width. Returns both commits, in order,
    /// so the graphics backend can follow each step.
    ///
    /// Some backends keep a stale window size after leaving fullscreen until
    /// the backbuffer changes again.
    pub fn run_settle_nudge(&mut self) -> Option<[PresentationSettings; 2]> {
        let deadline = self.state.settle_deadline?;
        if deadline >= self.clock.now_ms() {
            return None;
        }

        let settled = self.settings;
        let nudged = PresentationSettings {
            backbuffer_width: settled.backbuffer_width.saturating_sub(1).max(1),
            ..settled
        };
        log::debug!("settle nudge at {}x{}", settled.backbuffer_width, settled.backbuffer_height);
        self.commit(nudged);
        self.commit(settled);
        self.state.settle_deadline = None;
        Some([nudged, settled])
    }

    /// Detects a resize or adapter change made outside the negotiator.
    ///
    /// Ignored while fullscreen or while the client area is empty (minimized).
    /// Returns `true` when a renegotiation happened.
    pub fn poll_external_change(&mut self) -> bool {
        let (width, height) = self.platform.client_size();
        if width == 0 || height == 0 {
            return false;
        }
        let size_changed = width != self.state.screen_width || height != self.state.screen_height;
        let adapter_changed = self.platform.adapter_mode() != self.state.native_mode;
        if !(size_changed || adapter_changed) || self.platform.is_fullscreen() {
            return false;
        }

        log::debug!(
            "external display change: client {width}x{height}, was {}x{}",
            self.state.screen_width,
            self.state.screen_height
        );
        let fullscreen = self.prefs.fullscreen();
        self.negotiate(width, height, fullscreen);
        self.state.mode_changed = true;
        true
    }

    /// Reads and clears the mode-changed flag.
    pub fn consume_mode_changed(&mut self) -> bool {
        std::mem::take(&mut self.state.mode_changed)
    }

    #[inline]
    pub fn state(&self) -> DisplayState {
        self.state
    }

    #[inline]
    pub fn screen_size(&self) -> (u32, u32) {
        (self.state.screen_width, self.state.screen_height)
    }

    /// Current resolution as `"WxH"`.
    pub fn resolution_string(&self) -> String {
        DisplayMode::new(self.state.screen_width, self.state.screen_height).to_string()
    }

    /// Backbuffer-to-client ratio for mapping pointer coordinates.
    pub fn pointer_scale(&self) -> (f32, f32) {
        let (cw, ch) = self.platform.client_size();
        if cw == 0 || ch == 0 {
            return (1.0, 1.0);
        }
        (
            self.settings.backbuffer_width as f32 / cw as f32,
            self.settings.backbuffer_height as f32 / ch as f32,
        )
    }

    /// Last committed presentation settings.
    #[inline]
    pub fn settings(&self) -> PresentationSettings {
        self.settings
    }

    /// Incremented on every commit to the platform.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn preferences(&self) -> &dyn PreferenceStore {
        self.prefs.as_ref()
    }

    /// Preference edits take effect on the next [`apply_preferences`](Self::apply_preferences).
    pub fn preferences_mut(&mut self) -> &mut dyn PreferenceStore {
        self.prefs.as_mut()
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn diagnostics(&self) -> &Rc<dyn Diagnostics> {
        &self.diagnostics
    }

    fn supports_fullscreen(&self, mode: DisplayMode) -> bool {
        self.platform.supported_modes().contains(&mode) && mode.fits_within(self.platform.adapter_mode())
    }

    fn commit(&mut self, settings: PresentationSettings) {
        self.platform.apply(&settings);
        self.settings = settings;
        self.generation += 1;
    }

    fn persist(&mut self) {
        if let Err(e) = self.prefs.save() {
            log::warn!("failed to save display preferences: {e:#}");
        }
    }
}
