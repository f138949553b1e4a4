//! Kiln studio: a small scene exercising the engine end to end.
//!
//! Keys:
//! - F11 toggles fullscreen
//! - F12 saves a screenshot next to the working directory
//! - 0..4 pick the frame-rate cap (0 = vsync)
//! - Escape quits

mod glyphs;

use std::path::PathBuf;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use kiln_engine::coords::{Color, Rect, Vec2};
use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::display::FilePreferences;
use kiln_engine::frame::{DrawText, DrawTexture};
use kiln_engine::gpu::GpuInit;
use kiln_engine::logging::{LoggingConfig, init_logging};
use kiln_engine::render::{BitmapFont, BlendMode, RenderSurface, ShaderHandle, Texture};
use kiln_engine::window::{Runtime, RuntimeConfig};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

const PREFS_ENV: &str = "KILN_PREFS";
const DEFAULT_PREFS: &str = "kiln-prefs.toml";

const TINT_WGSL: &str = r#"
@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let base = textureSample(sprite_tex, sprite_smp, in.uv) * in.color;
    return vec4<f32>(mix(base.rgb, globals.params.xyz, globals.params.w), base.a);
}
"#;

const BLENDS: [BlendMode; 5] = [
    BlendMode::None,
    BlendMode::Alpha,
    BlendMode::Add,
    BlendMode::Multiply,
    BlendMode::Cutout,
];

/// Input recorded from window events, applied on the next frame.
#[derive(Debug, Default)]
struct Intents {
    toggle_fullscreen: bool,
    screenshot: bool,
    frame_rate_cap: Option<i32>,
}

struct Assets {
    checker: Rc<Texture>,
    font: Option<BitmapFont>,
    tint: Option<ShaderHandle>,
    canvas: Option<RenderSurface>,
}

#[derive(Default)]
struct Studio {
    intents: Intents,
    assets: Option<Assets>,
}

fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let px: [u8; 4] = if ((x / cell) + (y / cell)) % 2 == 0 {
                [235, 225, 200, 255]
            } else {
                [70, 80, 110, 255]
            };
            rgba.extend_from_slice(&px);
        }
    }
    rgba
}

impl Studio {
    fn load(ctx: &mut FrameCtx<'_, '_>) -> Result<Assets> {
        let checker = ctx.create_texture("checker", 64, 64, &checkerboard(64, 8))?;

        let (w, h, pixels) = glyphs::atlas();
        let mut font = None;
        let mut tint = None;
        if let Some(backend) = ctx.backend() {
            font = Some(glyphs::font(backend.create_texture(w, h, &pixels)?));
            tint = Some(backend.register_shader("tint", TINT_WGSL));
        }
        let canvas = ctx.coordinator.create_render_surface(128, 128);
        if canvas.is_none() {
            log::warn!("render surfaces unavailable; skipping the canvas");
        }

        log::info!("studio assets loaded");
        Ok(Assets { checker, font, tint, canvas })
    }

    fn apply_intents(&mut self, ctx: &mut FrameCtx<'_, '_>) {
        let intents = std::mem::take(&mut self.intents);
        if intents.toggle_fullscreen {
            let fullscreen = !ctx.preferences_mut().fullscreen();
            ctx.preferences_mut().set_fullscreen(fullscreen);
            ctx.apply_preferences();
        }
        if let Some(level) = intents.frame_rate_cap {
            ctx.preferences_mut().set_frame_rate_cap(level);
            ctx.apply_preferences();
        }
        if intents.screenshot {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            let path = format!("screenshot-{stamp}.png");
            if let Err(e) = ctx.coordinator.screenshot_queue().request_to_file(&path) {
                log::error!("{e:#}");
            }
        }
    }
}

impl App for Studio {
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::F11) => self.intents.toggle_fullscreen = true,
            PhysicalKey::Code(KeyCode::F12) => self.intents.screenshot = true,
            PhysicalKey::Code(KeyCode::Digit0) => self.intents.frame_rate_cap = Some(0),
            PhysicalKey::Code(KeyCode::Digit1) => self.intents.frame_rate_cap = Some(1),
            PhysicalKey::Code(KeyCode::Digit2) => self.intents.frame_rate_cap = Some(2),
            PhysicalKey::Code(KeyCode::Digit3) => self.intents.frame_rate_cap = Some(3),
            PhysicalKey::Code(KeyCode::Digit4) => self.intents.frame_rate_cap = Some(4),
            _ => {}
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.assets.is_none() {
            match Self::load(ctx) {
                Ok(assets) => self.assets = Some(assets),
                Err(e) => {
                    log::error!("{e:#}");
                    return AppControl::Exit;
                }
            }
        }
        self.apply_intents(ctx);
        if ctx.coordinator.consume_mode_changed() {
            log::info!("display mode is now {}", ctx.coordinator.negotiator().resolution_string());
        }
        let Some(assets) = self.assets.as_ref() else {
            return AppControl::Continue;
        };

        let t = ctx.time.elapsed.as_secs_f32();
        let (sw, sh) = ctx.coordinator.screen_size();
        let centre = Vec2::new(sw as f32 / 2.0, sh as f32 / 2.0);
        let tile = Rect::from_size(64.0, 64.0);
        let c = &mut *ctx.coordinator;

        c.clear(Color::rgb(24, 26, 32));

        if let Some(canvas) = assets.canvas {
            c.clear_render_surface(canvas, Color::rgba(0, 0, 0, 0));
            for i in 0..4 {
                let at = Rect::new((i % 2) as f32 * 64.0, (i / 2) as f32 * 64.0, 64.0, 64.0);
                c.draw_texture(
                    &DrawTexture::new(&assets.checker, tile, at)
                        .target(canvas)
                        .rotation(t * 45.0 * (i + 1) as f32),
                );
            }
            c.draw_texture(&DrawTexture::surface(
                canvas,
                canvas.bounds(),
                Rect::new(centre.x - 128.0, centre.y - 128.0, 256.0, 256.0),
            ));
        }

        for (i, blend) in BLENDS.iter().enumerate() {
            let angle = t * 0.7 + i as f32 * std::f32::consts::TAU / BLENDS.len() as f32;
            let at = centre + Vec2::new(angle.cos(), angle.sin()) * 220.0;
            c.draw_texture(
                &DrawTexture::new(&assets.checker, tile, Rect::new(at.x - 32.0, at.y - 32.0, 64.0, 64.0))
                    .blend(*blend)
                    .color(Color::rgba(255, 255, 255, 200))
                    .rotation(-t * 30.0),
            );
        }

        if let Some(tint) = assets.tint.as_ref() {
            tint.set_param(0, 1.0);
            tint.set_param(1, 0.4);
            tint.set_param(2, 0.1);
            tint.set_param(3, (t.sin() + 1.0) / 2.0);
            c.draw_texture(
                &DrawTexture::new(&assets.checker, tile, Rect::new(16.0, sh as f32 - 80.0, 64.0, 64.0))
                    .shader(Rc::clone(tint)),
            );
        }

        if let Some(font) = assets.font.as_ref() {
            if let Some(white) = c.white_texture() {
                c.draw_texture(
                    &DrawTexture::surface(white, Rect::from_size(1.0, 1.0), Rect::new(8.0, 8.0, 220.0, 48.0))
                        .color(Color::rgba(0, 0, 0, 160))
                        .ui(true),
                );
            }
            let fps = format!("FPS {}", c.fps());
            let mode = c.negotiator().resolution_string();
            c.draw_string(&DrawText::new(&fps, font, Vec2::new(16.0, 14.0)).scale(3.0).border(Color::BLACK));
            c.draw_string(&DrawText::new(&mode, font, Vec2::new(16.0, 34.0)).scale(3.0));
        }

        AppControl::Continue
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let prefs_path = std::env::var_os(PREFS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS));
    let prefs = FilePreferences::load(prefs_path)?;

    let config = RuntimeConfig {
        title: "kiln studio".to_string(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), Box::new(prefs), Studio::default())
}
