//! Whole frames driven through the coordinator against the recording backend.

use std::rc::Rc;

use kiln_engine::coords::{Color, Rect, Vec2};
use kiln_engine::display::{DisplayMode, DisplayNegotiator, DisplayPreferences, MemoryPreferences};
use kiln_engine::frame::{CoordinatorConfig, DrawText, DrawTexture, FrameCoordinator};
use kiln_engine::render::{BitmapFont, BlendMode, BlendPreset, Shader, ShaderId, Texture, TextureId};
use kiln_engine::testing::{BackendEvent, FakeDisplay, RecordingBackend, RecordingDiagnostics};
use kiln_engine::time::ManualClock;

fn coordinator(backend: &RecordingBackend) -> FrameCoordinator<RecordingBackend, FakeDisplay> {
    let negotiator = DisplayNegotiator::new(
        FakeDisplay::new(DisplayMode::new(1920, 1080)),
        Box::new(MemoryPreferences::new(DisplayPreferences::default())),
        Rc::new(ManualClock::new(0)),
        Rc::new(RecordingDiagnostics::new()),
    );
    let mut c = FrameCoordinator::new(CoordinatorConfig::default(), negotiator, Some(backend.clone()));
    c.initialize();
    backend.clear_events();
    c
}

fn tile(t: &Texture, x: f32) -> DrawTexture<'_> {
    DrawTexture::new(t, Rect::from_size(16.0, 16.0), Rect::new(x, 0.0, 16.0, 16.0))
}

#[test]
fn interleaved_states_open_one_batch_per_run() {
    let backend = RecordingBackend::new();
    let mut c = coordinator(&backend);
    let atlas = Texture::new("atlas", TextureId(1), 256, 256);

    c.begin_frame();
    for x in 0..10 {
        c.draw_texture(&tile(&atlas, x as f32 * 16.0));
    }
    c.draw_texture(&tile(&atlas, 0.0).blend(BlendMode::Add));
    c.draw_texture(&tile(&atlas, 16.0).blend(BlendMode::Add));
    c.draw_texture(&tile(&atlas, 32.0));
    c.end_frame();

    let presets: Vec<BlendPreset> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            BackendEvent::BeginBatch(b) => Some(b.preset),
            _ => None,
        })
        .collect();
    assert_eq!(presets, vec![BlendPreset::Normal, BlendPreset::Additive, BlendPreset::Normal]);
    assert_eq!(backend.quads().len(), 13);
    assert_eq!(backend.end_count(), 3);
}

#[test]
fn shader_parameter_edits_split_the_batch() {
    let backend = RecordingBackend::new();
    let mut c = coordinator(&backend);
    let atlas = Texture::new("atlas", TextureId(1), 256, 256);
    let glow = Shader::new(ShaderId(4), "glow");

    c.begin_frame();
    c.draw_texture(&tile(&atlas, 0.0).shader(glow.clone()));
    c.draw_texture(&tile(&atlas, 16.0).shader(glow.clone()));
    glow.set_param(0, 0.75);
    c.draw_texture(&tile(&atlas, 32.0).shader(glow.clone()));
    c.end_frame();

    let bindings: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            BackendEvent::BeginBatch(b) => b.shader,
            _ => None,
        })
        .collect();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].params[0], 0.0);
    assert_eq!(bindings[1].params[0], 0.75);
    assert!(!glow.values_changed());
}

#[test]
fn render_surface_round_trip_within_a_frame() {
    let backend = RecordingBackend::new();
    let mut c = coordinator(&backend);
    let atlas = Texture::new("atlas", TextureId(1), 256, 256);
    let surface = c.create_render_surface(128, 128).expect("surface");

    c.begin_frame();
    c.clear_render_surface(surface, Color::TRANSPARENT);
    c.draw_texture(&tile(&atlas, 0.0).target(surface));
    c.draw_texture(&DrawTexture::surface(surface, surface.bounds(), Rect::new(200.0, 200.0, 128.0, 128.0)));
    c.end_frame();

    let binds: Vec<_> = backend
        .events()
        .iter()
        .filter_map(|e| match e {
            BackendEvent::BindTarget(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![None, Some(surface), Some(surface), None]);

    let last = backend.quads().last().copied().expect("composite quad");
    assert_eq!(last.texture, surface.texture());
    assert_eq!(last.position, Vec2::new(200.0, 200.0));

    c.release_render_surface(surface);
    assert_eq!(backend.live_surfaces(), 1);
}

#[test]
fn text_and_tiles_share_a_frame() {
    let backend = RecordingBackend::new();
    let mut c = coordinator(&backend);
    let font = BitmapFont::monospace_grid(Some(TextureId(9)), " 0123456789", 8.0, 8.0, 16);
    let mesh = backend.add_mesh();

    c.begin_frame();
    c.draw_tile_buffer(mesh);
    c.draw_string(&DrawText::new("42\n7", &font, Vec2::new(8.0, 8.0)));
    c.end_frame();

    assert_eq!(backend.count(|e| matches!(e, BackendEvent::DrawMesh(m, _) if *m == mesh)), 1);
    let positions: Vec<Vec2> = backend.quads().iter().map(|q| q.position).collect();
    assert_eq!(positions, vec![Vec2::new(8.0, 8.0), Vec2::new(16.0, 8.0), Vec2::new(8.0, 16.0)]);
    assert_eq!(c.measure_text("42\n7", &font, 1.0), Vec2::new(16.0, 16.0));
}

#[test]
fn idle_textures_are_flagged_after_going_unused() {
    let backend = RecordingBackend::new();
    let display = FakeDisplay::new(DisplayMode::new(1280, 720));
    let clock = ManualClock::new(0);
    let negotiator = DisplayNegotiator::new(
        display,
        Box::new(MemoryPreferences::default()),
        Rc::new(clock.clone()),
        Rc::new(RecordingDiagnostics::new()),
    );
    let mut c = FrameCoordinator::new(CoordinatorConfig::default(), negotiator, Some(backend.clone()));
    c.initialize();

    let sprite = Rc::new(Texture::new("sprite", TextureId(1), 16, 16));
    c.track_texture(&sprite);

    c.begin_frame();
    c.draw_texture(&tile(&sprite, 0.0));
    c.end_frame();
    assert!(!sprite.is_idle());

    clock.advance(15_000);
    c.begin_frame();
    c.end_frame();
    assert!(sprite.is_idle());
}
