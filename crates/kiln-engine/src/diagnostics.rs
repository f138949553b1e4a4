//! User-visible warnings and the periodic status line.

use std::cell::RefCell;

/// Receiver for messages meant for the player rather than the log.
pub trait Diagnostics {
    /// A recoverable problem the user should know about (e.g. an unsupported
    /// fullscreen resolution).
    fn warn(&self, title: &str, message: &str);

    /// Periodic status text, typically shown in the window title.
    fn set_status(&self, text: &str);
}

/// Routes warnings to the `log` facade and keeps the latest status for the
/// window runtime to pick up.
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    status: RefCell<Option<String>>,
}

impl LogDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status set since the last call, if any.
    pub fn take_status(&self) -> Option<String> {
        self.status.borrow_mut().take()
    }
}

impl Diagnostics for LogDiagnostics {
    fn warn(&self, title: &str, message: &str) {
        log::warn!("{title}: {message}");
    }

    fn set_status(&self, text: &str) {
        log::debug!("status: {text}");
        *self.status.borrow_mut() = Some(text.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_taken_once() {
        let d = LogDiagnostics::new();
        assert_eq!(d.take_status(), None);
        d.set_status("kiln fps: 60 rts: 0 vbos: 0");
        d.set_status("kiln fps: 59 rts: 0 vbos: 0");
        assert_eq!(d.take_status().as_deref(), Some("kiln fps: 59 rts: 0 vbos: 0"));
        assert_eq!(d.take_status(), None);
    }
}
