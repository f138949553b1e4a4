//! Display negotiation through the coordinator with preferences on disk.

use std::path::Path;
use std::rc::Rc;

use kiln_engine::display::{
    BASE_FRAME_INTERVAL, DisplayMode, DisplayNegotiator, FilePreferences, UNSUPPORTED_RESOLUTION_TITLE,
};
use kiln_engine::frame::{CoordinatorConfig, FrameCoordinator};
use kiln_engine::testing::{FakeDisplay, RecordingBackend, RecordingDiagnostics};
use kiln_engine::time::ManualClock;

struct Rig {
    backend: RecordingBackend,
    display: FakeDisplay,
    clock: ManualClock,
    diagnostics: Rc<RecordingDiagnostics>,
    coordinator: FrameCoordinator<RecordingBackend, FakeDisplay>,
}

fn rig(prefs_path: &Path, native: DisplayMode) -> Rig {
    let backend = RecordingBackend::new();
    let display = FakeDisplay::new(native);
    let clock = ManualClock::new(50_000);
    let diagnostics = Rc::new(RecordingDiagnostics::new());
    let prefs = FilePreferences::load(prefs_path).expect("load prefs");
    let negotiator = DisplayNegotiator::new(
        display.clone(),
        Box::new(prefs),
        Rc::new(clock.clone()),
        diagnostics.clone(),
    );
    let mut coordinator = FrameCoordinator::new(CoordinatorConfig::default(), negotiator, Some(backend.clone()));
    coordinator.initialize();
    Rig {
        backend,
        display,
        clock,
        diagnostics,
        coordinator,
    }
}

#[test]
fn monitor_swap_downgrades_fullscreen_and_persists_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("display.toml");
    std::fs::write(&path, "resolution = 12\nfullscreen = true\ntarget_fps = 0\n").unwrap();

    let mut r = rig(&path, DisplayMode::new(1920, 1080));
    let state = r.coordinator.negotiator().state();
    assert!(state.current_fullscreen);
    assert_eq!(r.coordinator.screen_size(), (1920, 1080));
    assert!(!r.coordinator.consume_mode_changed());

    // The new monitor no longer lists 1920x1080.
    r.display
        .set_supported_modes(vec![DisplayMode::new(800, 600), DisplayMode::new(1280, 720)]);
    r.coordinator.negotiator_mut().apply_preferences();

    let warnings = r.diagnostics.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, UNSUPPORTED_RESOLUTION_TITLE);
    assert!(warnings[0].1.contains("1920x1080"), "{}", warnings[0].1);

    let saved = FilePreferences::load(&path).unwrap();
    assert!(!saved.preferences().fullscreen);
    assert_eq!(saved.preferences().resolution, 12);

    assert!(!r.coordinator.negotiator().state().current_fullscreen);
    assert!(r.coordinator.consume_mode_changed());
    assert!(!r.coordinator.consume_mode_changed());
}

#[test]
fn settle_nudge_runs_on_the_first_frame_after_the_delay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("display.toml");
    std::fs::write(&path, "resolution = 12\nfullscreen = true\n").unwrap();
    let mut r = rig(&path, DisplayMode::new(1920, 1080));

    r.coordinator.negotiator_mut().preferences_mut().set_fullscreen(false);
    r.coordinator.negotiator_mut().apply_preferences();
    r.display.clear_applied();

    r.clock.advance(1000);
    r.coordinator.begin_frame();
    r.coordinator.end_frame();
    assert!(r.display.applied().is_empty());

    let configured_before = r.backend.configured().len();
    r.clock.advance(1);
    r.coordinator.begin_frame();
    r.coordinator.end_frame();
    let widths: Vec<u32> = r.display.applied().iter().map(|s| s.backbuffer_width).collect();
    assert_eq!(widths, vec![1919, 1920]);
    let configured: Vec<u32> = r.backend.configured()[configured_before..]
        .iter()
        .map(|s| s.backbuffer_width)
        .collect();
    assert_eq!(configured, vec![1919, 1920]);

    r.clock.advance(5000);
    r.coordinator.begin_frame();
    r.coordinator.end_frame();
    assert_eq!(r.display.applied().len(), 2);
}

#[test]
fn frame_rate_cap_reaches_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("display.toml");
    std::fs::write(&path, "target_fps = 3\n").unwrap();
    let mut r = rig(&path, DisplayMode::new(1280, 720));

    let configured = *r.backend.configured().last().expect("configured");
    assert!(!configured.vsync);
    assert_eq!(configured.frame_interval, Some(BASE_FRAME_INTERVAL / 3));

    r.coordinator.negotiator_mut().preferences_mut().set_frame_rate_cap(0);
    r.coordinator.negotiator_mut().apply_preferences();
    r.coordinator.begin_frame();

    let configured = *r.backend.configured().last().expect("configured");
    assert!(configured.vsync);
    assert_eq!(configured.frame_interval, None);
}

#[test]
fn missing_preferences_file_starts_windowed_at_the_smallest_mode() {
    let dir = tempfile::tempdir().unwrap();
    let r = rig(&dir.path().join("absent.toml"), DisplayMode::new(1366, 768));

    assert_eq!(r.coordinator.screen_size(), (800, 600));
    assert!(!r.coordinator.negotiator().state().current_fullscreen);
    assert_eq!(r.coordinator.negotiator().resolution_string(), "800x600");
    assert_eq!(r.display.last_position(), Some((283, 84)));
}

#[test]
fn minimized_window_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut r = rig(&dir.path().join("display.toml"), DisplayMode::new(1920, 1080));
    let before = r.backend.configured().len();

    r.display.set_client_size(0, 0);
    r.coordinator.begin_frame();
    r.coordinator.end_frame();

    assert_eq!(r.backend.configured().len(), before);
    assert_eq!(r.coordinator.screen_size(), (800, 600));
}
