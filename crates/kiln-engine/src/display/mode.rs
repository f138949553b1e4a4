use std::fmt;
use std::str::FromStr;

use anyhow::{Context, bail};

/// A display resolution in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
}

impl DisplayMode {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when this mode fits inside `other` on both axes.
    #[inline]
    pub fn fits_within(&self, other: DisplayMode) -> bool {
        self.width <= other.width && self.height <= other.height
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for DisplayMode {
    type Err = anyhow::Error;

    /// Parses `"WxH"`, e.g. `"1920x1080"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((w, h)) = s.trim().split_once(['x', 'X']) else {
            bail!("expected WxH, got {s:?}");
        };
        let width = w.trim().parse().with_context(|| format!("bad width in {s:?}"))?;
        let height = h.trim().parse().with_context(|| format!("bad height in {s:?}"))?;
        if width == 0 || height == 0 {
            bail!("zero-sized mode {s:?}");
        }
        Ok(Self { width, height })
    }
}

/// Resolutions the game offers, in menu order.
pub const ALLOWED_MODES: [DisplayMode; 13] = [
    DisplayMode::new(800, 600),
    DisplayMode::new(1024, 768),
    DisplayMode::new(1024, 720),
    DisplayMode::new(1280, 720),
    DisplayMode::new(1280, 768),
    DisplayMode::new(1280, 1024),
    DisplayMode::new(1360, 768),
    DisplayMode::new(1366, 768),
    DisplayMode::new(1440, 1050),
    DisplayMode::new(1440, 900),
    DisplayMode::new(1600, 900),
    DisplayMode::new(1680, 1050),
    DisplayMode::new(1920, 1080),
];

/// Used when nothing in the allow-list survives filtering.
pub const FALLBACK_MODE: DisplayMode = DisplayMode::new(800, 600);

/// Allow-listed modes the adapter supports exactly and that fit in `native`,
/// in allow-list order.
pub fn build_catalog(supported: &[DisplayMode], native: DisplayMode) -> Vec<DisplayMode> {
    ALLOWED_MODES
        .iter()
        .copied()
        .filter(|mode| supported.contains(mode) && mode.fits_within(native))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let mode = DisplayMode::new(1920, 1080);
        assert_eq!(mode.to_string(), "1920x1080");
        assert_eq!("1920x1080".parse::<DisplayMode>().ok(), Some(mode));
        assert_eq!(" 800 X 600 ".parse::<DisplayMode>().ok(), Some(FALLBACK_MODE));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("1920".parse::<DisplayMode>().is_err());
        assert!("ax600".parse::<DisplayMode>().is_err());
        assert!("0x600".parse::<DisplayMode>().is_err());
    }

    #[test]
    fn catalog_filters_by_support_and_native() {
        let supported = [
            DisplayMode::new(640, 480),
            DisplayMode::new(800, 600),
            DisplayMode::new(1280, 720),
            DisplayMode::new(1920, 1080),
            DisplayMode::new(1600, 900),
        ];
        let catalog = build_catalog(&supported, DisplayMode::new(1600, 900));
        assert_eq!(
            catalog,
            vec![DisplayMode::new(800, 600), DisplayMode::new(1280, 720), DisplayMode::new(1600, 900)]
        );
    }

    #[test]
    fn catalog_keeps_allow_list_order() {
        let mut supported = ALLOWED_MODES.to_vec();
        supported.reverse();
        assert_eq!(build_catalog(&supported, DisplayMode::new(4096, 2160)), ALLOWED_MODES.to_vec());
    }
}
