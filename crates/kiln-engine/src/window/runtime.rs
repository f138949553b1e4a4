use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, Coordinator, FrameCtx, FrameTime};
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::display::{DisplayNegotiator, PreferenceStore};
use crate::frame::{CoordinatorConfig, FrameCoordinator, FramePhase};
use crate::gpu::{Gpu, GpuInit, WgpuBackend};
use crate::time::SystemClock;

use super::display::WinitDisplay;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    /// Size of the window before stored preferences are negotiated.
    pub initial_size: PhysicalSize<u32>,
    /// Switch video modes for fullscreen when the monitor lists the requested
    /// size; otherwise use a borderless window.
    pub exclusive_fullscreen: bool,
    pub white_texture: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "kiln".to_string(),
            initial_size: PhysicalSize::new(800, 600),
            exclusive_fullscreen: true,
            white_texture: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives `app` until it exits or the window closes.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, prefs: Box<dyn PreferenceStore>, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, prefs, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    diagnostics: Rc<LogDiagnostics>,

    window: Window,

    #[borrows(window)]
    #[not_covariant]
    coordinator: Coordinator<'this>,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    prefs: Option<Box<dyn PreferenceStore>>,
    app: A,

    entry: Option<WindowEntry>,
    started: Option<Instant>,
    last_frame: Option<Instant>,
    next_frame: Instant,
    frame: u64,

    error: Option<anyhow::Error>,
    exit_requested: bool,
}

fn build_coordinator<'w>(
    window: &'w Window,
    config: &RuntimeConfig,
    gpu_init: GpuInit,
    prefs: Box<dyn PreferenceStore>,
    diagnostics: Rc<dyn Diagnostics>,
) -> Result<Coordinator<'w>> {
    let gpu = pollster::block_on(Gpu::new(window, gpu_init)).context("GPU initialization failed")?;
    let display = WinitDisplay::new(window, config.exclusive_fullscreen);
    let negotiator = DisplayNegotiator::new(display, prefs, Rc::new(SystemClock::new()), diagnostics);

    let mut coordinator = FrameCoordinator::new(
        CoordinatorConfig {
            title: config.title.clone(),
            white_texture: config.white_texture,
        },
        negotiator,
        Some(WgpuBackend::new(gpu)),
    );
    coordinator.initialize();
    Ok(coordinator)
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, prefs: Box<dyn PreferenceStore>, app: A) -> Self {
        Self {
            config,
            gpu_init,
            prefs: Some(prefs),
            app,
            entry: None,
            started: None,
            last_frame: None,
            next_frame: Instant::now(),
            frame: 0,
            error: None,
            exit_requested: false,
        }
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        self.request_exit(event_loop);
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop, prefs: Box<dyn PreferenceStore>) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let diagnostics = Rc::new(LogDiagnostics::new());
        let shared: Rc<dyn Diagnostics> = diagnostics.clone();
        let config = &self.config;
        let gpu_init = self.gpu_init.clone();

        WindowEntryTryBuilder {
            diagnostics,
            window,
            coordinator_builder: |w| build_coordinator(w, config, gpu_init, prefs, shared),
        }
        .try_build()
    }

    fn resize(entry: &mut WindowEntry, size: PhysicalSize<u32>) {
        entry.with_coordinator_mut(|c| {
            c.negotiator_mut().platform_mut().acknowledge_resize(size);
            if let Some(backend) = c.backend_mut() {
                backend.resize_surface(size);
            }
        });
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let started = *self.started.get_or_insert(now);
        let time = FrameTime {
            dt: self.last_frame.map(|t| now - t).unwrap_or_default(),
            elapsed: now - started,
            frame: self.frame,
        };

        let Self { app, entry, .. } = self;
        let Some(entry) = entry.as_mut() else { return };

        let outcome = entry.with_mut(|fields| {
            let window: &Window = fields.window;
            let coordinator = fields.coordinator;
            if coordinator.phase() != FramePhase::Ready {
                return None;
            }

            // Capture first so the frame's default batch already targets it.
            let capturing = !coordinator.screenshot_queue().is_empty() && coordinator.begin_screenshot();
            coordinator.begin_frame();

            let control = {
                let mut ctx = FrameCtx {
                    window,
                    coordinator: &mut *coordinator,
                    time,
                };
                app.on_frame(&mut ctx)
            };

            window.pre_present_notify();
            if capturing {
                coordinator.end_screenshot();
            } else {
                coordinator.end_frame();
            }

            if let Some(status) = fields.diagnostics.take_status() {
                window.set_title(&status);
            }
            let lost = coordinator.backend().is_some_and(|b| b.is_lost());
            Some((control, lost, coordinator.negotiator().settings().frame_interval))
        });

        let Some((control, lost, interval)) = outcome else { return };
        self.last_frame = Some(now);
        self.frame += 1;

        if let Some(interval) = interval {
            let next = self.next_frame + interval;
            self.next_frame = if next <= now { now } else { next };
        }

        if lost {
            self.fail(event_loop, anyhow::anyhow!("graphics surface lost"));
        } else if control == AppControl::Exit {
            self.request_exit(event_loop);
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }
        let Some(prefs) = self.prefs.take() else { return };

        match self.create_window_entry(event_loop, prefs) {
            Ok(entry) => {
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
            }
            Err(e) => self.fail(event_loop, e.context("failed to create initial window")),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some(entry) = self.entry.as_ref() else { return };

        let interval = entry.with_coordinator(|c| c.negotiator().settings().frame_interval);
        match interval {
            Some(_) if Instant::now() < self.next_frame => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
            }
            _ => {
                event_loop.set_control_flow(ControlFlow::Wait);
                entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        let Some(entry) = self.entry.as_mut() else { return };
        match event {
            WindowEvent::CloseRequested => {
                self.entry = None;
                self.request_exit(event_loop);
            }
            WindowEvent::Resized(size) => Self::resize(entry, size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = entry.with_window(|w| w.inner_size());
                Self::resize(entry, size);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
