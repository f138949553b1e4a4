//! Display mode negotiation.
//!
//! The [`DisplayNegotiator`] owns the negotiated display state and talks to the
//! window system through [`DisplayPlatform`] and to stored settings through
//! [`PreferenceStore`].

mod mode;
mod negotiator;
mod platform;
mod prefs;

pub use mode::{ALLOWED_MODES, DisplayMode, FALLBACK_MODE, build_catalog};
pub use negotiator::{DisplayNegotiator, DisplayState, ResolvedMode, SETTLE_DELAY_MS, UNSUPPORTED_RESOLUTION_TITLE};
pub use platform::{BASE_FRAME_INTERVAL, DisplayPlatform, FrameRateCap, PresentationSettings};
pub use prefs::{DisplayPreferences, FilePreferences, MemoryPreferences, PreferenceStore};
