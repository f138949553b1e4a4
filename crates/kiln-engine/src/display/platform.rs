use std::time::Duration;

use super::mode::DisplayMode;

/// Base frame interval for capped frame rates: one thirtieth of a second.
pub const BASE_FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Frame-rate cap selector as stored in preferences.
///
/// Level `n` in `1..=4` paces frames at `BASE_FRAME_INTERVAL / n` (about 30, 60,
/// 90 and 120 fps). Level 0 leaves pacing to vertical sync.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum FrameRateCap {
    #[default]
    Uncapped,
    Fps30,
    Fps60,
    Fps90,
    Fps120,
}

impl FrameRateCap {
    /// Maps a stored level. Unknown levels are treated as uncapped.
    pub fn from_level(level: i32) -> Self {
        match level {
            1 => FrameRateCap::Fps30,
            2 => FrameRateCap::Fps60,
            3 => FrameRateCap::Fps90,
            4 => FrameRateCap::Fps120,
            _ => FrameRateCap::Uncapped,
        }
    }

    pub fn level(self) -> i32 {
        match self {
            FrameRateCap::Uncapped => 0,
            FrameRateCap::Fps30 => 1,
            FrameRateCap::Fps60 => 2,
            FrameRateCap::Fps90 => 3,
            FrameRateCap::Fps120 => 4,
        }
    }

    /// Fixed frame interval, or `None` for variable timestep.
    pub fn frame_interval(self) -> Option<Duration> {
        match self.level() {
            0 => None,
            n => Some(BASE_FRAME_INTERVAL / n as u32),
        }
    }

    /// Vertical sync is on only when no explicit cap is set.
    #[inline]
    pub fn vsync(self) -> bool {
        self == FrameRateCap::Uncapped
    }
}

/// Presentation parameters committed to the platform and graphics backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PresentationSettings {
    pub fullscreen: bool,
    pub backbuffer_width: u32,
    pub backbuffer_height: u32,
    pub vsync: bool,
    /// `Some` selects fixed-timestep pacing at this interval.
    pub frame_interval: Option<Duration>,
}

impl PresentationSettings {
    pub fn windowed(width: u32, height: u32) -> Self {
        Self {
            fullscreen: false,
            backbuffer_width: width,
            backbuffer_height: height,
            vsync: true,
            frame_interval: None,
        }
    }

    pub fn with_frame_rate_cap(mut self, cap: FrameRateCap) -> Self {
        self.vsync = cap.vsync();
        self.frame_interval = cap.frame_interval();
        self
    }

    #[inline]
    pub fn fixed_timestep(&self) -> bool {
        self.frame_interval.is_some()
    }

    #[inline]
    pub fn backbuffer(&self) -> DisplayMode {
        DisplayMode::new(self.backbuffer_width, self.backbuffer_height)
    }
}

/// Window-system side of display negotiation.
pub trait DisplayPlatform {
    /// Every mode the display adapter supports exactly.
    fn supported_modes(&self) -> Vec<DisplayMode>;

    /// The adapter's current (native desktop) mode.
    fn adapter_mode(&self) -> DisplayMode;

    /// Current client-area size of the window; may be `(0, 0)` while minimized.
    fn client_size(&self) -> (u32, u32);

    fn is_fullscreen(&self) -> bool;

    /// Commits presentation settings. Each call is one "apply changes".
    fn apply(&mut self, settings: &PresentationSettings);

    fn set_window_position(&mut self, x: i32, y: i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_levels_divide_base_interval() {
        for level in 1..=4 {
            let cap = FrameRateCap::from_level(level);
            let interval = cap.frame_interval().expect("capped").as_secs_f64();
            let expected = (1.0 / 30.0) / level as f64;
            assert!((interval - expected).abs() < 1e-6, "level {level}: {interval}");
            assert!(!cap.vsync());
        }
    }

    #[test]
    fn level_zero_is_variable_with_vsync() {
        let cap = FrameRateCap::from_level(0);
        assert_eq!(cap.frame_interval(), None);
        assert!(cap.vsync());
    }

    #[test]
    fn unknown_levels_are_uncapped() {
        assert_eq!(FrameRateCap::from_level(-1), FrameRateCap::Uncapped);
        assert_eq!(FrameRateCap::from_level(9), FrameRateCap::Uncapped);
    }

    #[test]
    fn settings_follow_cap() {
        let s = PresentationSettings::windowed(1280, 720).with_frame_rate_cap(FrameRateCap::Fps60);
        assert!(s.fixed_timestep());
        assert!(!s.vsync);
        assert_eq!(s.backbuffer(), DisplayMode::new(1280, 720));
    }
}
