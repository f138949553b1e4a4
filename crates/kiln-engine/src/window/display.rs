use std::collections::VecDeque;

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::monitor::{MonitorHandle, VideoModeHandle};
use winit::window::{Fullscreen, Window};

use crate::display::{DisplayMode, DisplayPlatform, PresentationSettings};

/// [`DisplayPlatform`] over a winit window.
///
/// A windowed resize that winit cannot apply synchronously is reported as the
/// client size until the `Resized` event for the most recent request arrives,
/// so the negotiator's external-change poll does not undo it.
pub struct WinitDisplay<'w> {
    window: &'w Window,
    exclusive_fullscreen: bool,
    pending: PendingResizes,
}

impl<'w> WinitDisplay<'w> {
    pub fn new(window: &'w Window, exclusive_fullscreen: bool) -> Self {
        Self {
            window,
            exclusive_fullscreen,
            pending: PendingResizes::default(),
        }
    }

    pub fn window(&self) -> &'w Window {
        self.window
    }

    /// Called from `WindowEvent::Resized`.
    pub fn acknowledge_resize(&mut self, size: PhysicalSize<u32>) {
        self.pending.acknowledge((size.width, size.height));
    }

    fn monitor(&self) -> Option<MonitorHandle> {
        self.window.current_monitor().or_else(|| self.window.primary_monitor())
    }

    fn exclusive_mode(&self, monitor: &MonitorHandle, width: u32, height: u32) -> Option<VideoModeHandle> {
        monitor
            .video_modes()
            .filter(|m| m.size() == PhysicalSize::new(width, height))
            .max_by_key(|m| (m.refresh_rate_millihertz(), m.bit_depth()))
    }
}

impl DisplayPlatform for WinitDisplay<'_> {
    fn supported_modes(&self) -> Vec<DisplayMode> {
        let Some(monitor) = self.monitor() else { return Vec::new() };
        let mut modes: Vec<DisplayMode> = monitor
            .video_modes()
            .map(|m| DisplayMode::new(m.size().width, m.size().height))
            .collect();
        modes.sort();
        modes.dedup();
        modes
    }

    fn adapter_mode(&self) -> DisplayMode {
        let size = self
            .monitor()
            .map(|m| m.size())
            .unwrap_or_else(|| self.window.inner_size());
        DisplayMode::new(size.width, size.height)
    }

    fn client_size(&self) -> (u32, u32) {
        if let Some(pending) = self.pending.latest() {
            return pending;
        }
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn is_fullscreen(&self) -> bool {
        self.window.fullscreen().is_some()
    }

    fn apply(&mut self, settings: &PresentationSettings) {
        let (width, height) = (settings.backbuffer_width, settings.backbuffer_height);

        if settings.fullscreen {
            let monitor = self.monitor();
            let exclusive = if self.exclusive_fullscreen {
                monitor
                    .as_ref()
                    .and_then(|m| self.exclusive_mode(m, width, height))
                    .map(Fullscreen::Exclusive)
            } else {
                None
            };
            let mode = exclusive.unwrap_or(Fullscreen::Borderless(monitor));
            let kind = if matches!(mode, Fullscreen::Exclusive(_)) { "exclusive" } else { "borderless" };
            log::info!("fullscreen {width}x{height} ({kind})");
            self.window.set_fullscreen(Some(mode));
            self.pending.clear();
            return;
        }

        if self.window.fullscreen().is_some() {
            self.window.set_fullscreen(None);
        }
        match self.window.request_inner_size(PhysicalSize::new(width, height)) {
            Some(_) => self.pending.clear(),
            None => self.pending.request((width, height)),
        }
        log::info!("windowed {width}x{height}");
    }

    fn set_window_position(&mut self, x: i32, y: i32) {
        if self.window.fullscreen().is_none() {
            self.window.set_outer_position(PhysicalPosition::new(x, y));
        }
    }
}

/// Window size requests still in flight, oldest first.
///
/// Each `Resized` event retires at most the requests up to the one it matches;
/// an event matching none retires the oldest, so a window manager that clamps
/// the size cannot keep the queue alive forever.
#[derive(Debug, Default)]
struct PendingResizes {
    requests: VecDeque<(u32, u32)>,
}

impl PendingResizes {
    fn request(&mut self, size: (u32, u32)) {
        self.requests.push_back(size);
    }

    fn clear(&mut self) {
        self.requests.clear();
    }

    /// Size the window is heading to, if a request is outstanding.
    fn latest(&self) -> Option<(u32, u32)> {
        self.requests.back().copied()
    }

    fn acknowledge(&mut self, size: (u32, u32)) {
        match self.requests.iter().position(|&r| r == size) {
            Some(i) => {
                self.requests.drain(..=i);
            }
            None => {
                if let Some(expected) = self.requests.pop_front() {
                    log::debug!(
                        "window settled at {}x{} instead of {}x{}",
                        size.0,
                        size.1,
                        expected.0,
                        expected.1
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intermediate_resize_keeps_the_latest_request() {
        let mut p = PendingResizes::default();
        p.request((1920, 1080));
        p.request((1280, 720));

        p.acknowledge((1920, 1080));
        assert_eq!(p.latest(), Some((1280, 720)));

        p.acknowledge((1280, 720));
        assert_eq!(p.latest(), None);
    }

    #[test]
    fn nudge_steps_settle_on_the_final_width() {
        let mut p = PendingResizes::default();
        p.request((1279, 720));
        p.request((1280, 720));

        p.acknowledge((1279, 720));
        assert_eq!(p.latest(), Some((1280, 720)));
        p.acknowledge((1280, 720));
        assert_eq!(p.latest(), None);
    }

    #[test]
    fn unexpected_sizes_retire_the_oldest_request() {
        let mut p = PendingResizes::default();
        p.request((1920, 1080));
        p.request((1280, 720));

        p.acknowledge((1910, 1050));
        assert_eq!(p.latest(), Some((1280, 720)));
        p.acknowledge((1270, 700));
        assert_eq!(p.latest(), None);

        p.acknowledge((800, 600));
        assert_eq!(p.latest(), None);
    }

    #[test]
    fn repeated_sizes_retire_in_order() {
        let mut p = PendingResizes::default();
        p.request((800, 600));
        p.request((1024, 768));
        p.request((800, 600));

        p.acknowledge((800, 600));
        assert_eq!(p.latest(), Some((800, 600)));
        p.acknowledge((1024, 768));
        p.acknowledge((800, 600));
        assert_eq!(p.latest(), None);
    }
}
