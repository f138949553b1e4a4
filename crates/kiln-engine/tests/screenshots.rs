//! Screenshot requests from other threads and to files.

use std::rc::Rc;
use std::thread;

use kiln_engine::coords::Color;
use kiln_engine::display::{DisplayMode, DisplayNegotiator, DisplayPreferences, MemoryPreferences};
use kiln_engine::frame::{CoordinatorConfig, FrameCoordinator, FramePhase};
use kiln_engine::testing::{BackendEvent, FakeDisplay, RecordingBackend, RecordingDiagnostics, SharedSink};
use kiln_engine::time::ManualClock;

fn coordinator(backend: &RecordingBackend, resolution: i32) -> FrameCoordinator<RecordingBackend, FakeDisplay> {
    let prefs = MemoryPreferences::new(DisplayPreferences {
        resolution,
        ..DisplayPreferences::default()
    });
    let negotiator = DisplayNegotiator::new(
        FakeDisplay::new(DisplayMode::new(1920, 1080)),
        Box::new(prefs),
        Rc::new(ManualClock::new(0)),
        Rc::new(RecordingDiagnostics::new()),
    );
    let mut coordinator = FrameCoordinator::new(CoordinatorConfig::default(), negotiator, Some(backend.clone()));
    coordinator.initialize();
    coordinator
}

#[test]
fn sinks_pushed_from_worker_threads_all_receive_the_frame() {
    let backend = RecordingBackend::new();
    let mut coordinator = coordinator(&backend, 3);
    let queue = coordinator.screenshot_queue();

    let sinks: Vec<SharedSink> = (0..4).map(|_| SharedSink::new()).collect();
    let handles: Vec<_> = sinks
        .iter()
        .map(|sink| {
            let queue = queue.clone();
            let writer = sink.writer();
            thread::spawn(move || queue.push(Box::new(writer)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(coordinator.screenshot_queue().len(), 4);

    assert!(coordinator.begin_screenshot());
    assert!(coordinator.begin_frame());
    coordinator.clear(Color::rgb(200, 100, 50));
    coordinator.end_screenshot();

    let first = sinks[0].bytes();
    assert!(!first.is_empty());
    for sink in &sinks {
        assert_eq!(sink.bytes(), first);
        assert!(sink.is_closed());
        assert!(sink.flushes() >= 1);
    }
    let image = image::load_from_memory(&first).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (1280, 720));
    assert_eq!(image.get_pixel(640, 360).0, [200, 100, 50, 255]);
    assert!(queue.is_empty());
}

#[test]
fn file_request_produces_a_png_of_the_screen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.png");
    let backend = RecordingBackend::new();
    let mut coordinator = coordinator(&backend, 0);

    coordinator.screenshot_queue().request_to_file(&path).unwrap();
    assert!(coordinator.begin_screenshot());
    assert!(coordinator.begin_frame());
    coordinator.clear(Color::BLACK);
    coordinator.end_screenshot();

    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (800, 600));
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
}

#[test]
fn requests_wait_for_the_next_capture() {
    let backend = RecordingBackend::new();
    let mut coordinator = coordinator(&backend, 0);

    // An ordinary frame leaves queued sinks untouched.
    let sink = SharedSink::new();
    coordinator.request_screenshot(Box::new(sink.writer()));
    coordinator.begin_frame();
    coordinator.end_frame();
    coordinator.end_screenshot();
    assert!(sink.bytes().is_empty());
    assert!(!sink.is_closed());

    coordinator.begin_screenshot();
    coordinator.begin_frame();
    coordinator.end_screenshot();
    assert!(sink.is_closed());
    assert!(!sink.bytes().is_empty());
}

#[test]
fn capture_without_sinks_still_presents_the_frame() {
    let backend = RecordingBackend::new();
    let mut coordinator = coordinator(&backend, 0);
    let live = backend.live_surfaces();
    backend.clear_events();

    assert!(coordinator.begin_screenshot());
    assert!(coordinator.begin_frame());
    let capture = coordinator.batch().capture_target().expect("capturing");
    coordinator.clear(Color::rgb(1, 2, 3));
    coordinator.end_screenshot();

    let events = backend.events();
    assert_eq!(backend.count(|e| matches!(e, BackendEvent::EncodePng(_))), 0);
    assert!(events.contains(&BackendEvent::ReleaseSurface(capture)));
    assert_eq!(backend.present_count(), 2);
    assert_eq!(backend.live_surfaces(), live);

    // The captured image is drawn back onto the primary surface.
    let represent = events
        .iter()
        .rposition(|e| matches!(e, BackendEvent::DrawQuad(q) if q.texture == capture.texture()))
        .expect("re-present quad");
    let rebind = events
        .iter()
        .rposition(|e| *e == BackendEvent::BindTarget(None))
        .expect("primary rebound");
    assert!(rebind < represent);
    assert!(!events[rebind..].contains(&BackendEvent::BindTarget(Some(capture))));

    assert!(!coordinator.is_capturing());
    assert_eq!(coordinator.phase(), FramePhase::Ready);
}
