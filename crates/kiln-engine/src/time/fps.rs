/// Sampling window for the reported frame rate.
pub const FPS_SAMPLE_MS: u64 = 1000;

/// Per-second frame counters.
///
/// Frames are counted as they end; once the sample deadline has passed the count
/// becomes the reported FPS and counting restarts.
#[derive(Debug, Clone, Default)]
pub struct FrameCounters {
    frames_this_second: u32,
    fps: u32,
    next_sample_ms: u64,
}

impl FrameCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one finished frame.
    ///
    /// Returns the freshly sampled FPS when the deadline (strictly) elapsed on
    /// this frame, `None` otherwise.
    pub fn record_frame(&mut self, now_ms: u64) -> Option<u32> {
        self.frames_this_second = self.frames_this_second.saturating_add(1);
        if self.next_sample_ms >= now_ms {
            return None;
        }
        self.fps = self.frames_this_second;
        self.frames_this_second = 0;
        self.next_sample_ms = now_ms + FPS_SAMPLE_MS;
        Some(self.fps)
    }

    /// Last sampled frame rate.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Frames counted since the last sample.
    pub fn frames_this_second(&self) -> u32 {
        self.frames_this_second
    }

    pub fn next_sample_ms(&self) -> u64 {
        self.next_sample_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_once_per_second() {
        let mut c = FrameCounters::new();
        // First frame past the zero deadline primes the window.
        assert_eq!(c.record_frame(1), Some(1));

        for t in 2..=1001 {
            assert_eq!(c.record_frame(t), None, "frame at {t} ms sampled early");
        }
        assert_eq!(c.record_frame(1002), Some(1001));
        assert_eq!(c.fps(), 1001);
        assert_eq!(c.frames_this_second(), 0);
        assert_eq!(c.next_sample_ms(), 2002);
    }

    #[test]
    fn deadline_is_extended_from_sample_time() {
        let mut c = FrameCounters::new();
        c.record_frame(1);
        // A long stall: one frame after five seconds.
        assert_eq!(c.record_frame(5000), Some(1));
        assert_eq!(c.next_sample_ms(), 6000);
    }
}
