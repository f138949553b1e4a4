use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use winit::window::Window;

use crate::display::PreferenceStore;
use crate::frame::FrameCoordinator;
use crate::gpu::WgpuBackend;
use crate::render::Texture;
use crate::window::WinitDisplay;

/// The coordinator the runtime drives: wgpu backend over a winit window.
pub type Coordinator<'w> = FrameCoordinator<WgpuBackend<'w>, WinitDisplay<'w>>;

/// Frame timing as seen by the app.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct FrameTime {
    /// Time since the previous frame started.
    pub dt: Duration,
    /// Time since the first frame.
    pub elapsed: Duration,
    pub frame: u64,
}

impl FrameTime {
    #[inline]
    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window borrow carried by the GPU and display layers
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub coordinator: &'a mut Coordinator<'w>,
    pub time: FrameTime,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    pub fn backend(&mut self) -> Option<&mut WgpuBackend<'w>> {
        self.coordinator.backend_mut()
    }

    /// Uploads RGBA pixels and returns a texture tracked for idle maintenance.
    pub fn create_texture(&mut self, name: &str, width: u32, height: u32, rgba: &[u8]) -> Result<Rc<Texture>> {
        let backend = self.coordinator.backend_mut().context("no graphics backend")?;
        let id = backend
            .create_texture(width, height, rgba)
            .with_context(|| format!("failed to create texture '{name}'"))?;
        let texture = Rc::new(Texture::new(name, id, width, height));
        self.coordinator.track_texture(&texture);
        Ok(texture)
    }

    pub fn preferences_mut(&mut self) -> &mut dyn PreferenceStore {
        self.coordinator.negotiator_mut().preferences_mut()
    }

    /// Renegotiates the display from the (possibly just edited) preferences.
    pub fn apply_preferences(&mut self) {
        self.coordinator.negotiator_mut().apply_preferences();
    }
}
