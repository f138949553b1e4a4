use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, ensure};
use image::ExtendedColorType;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;

/// Destination for one screenshot's PNG bytes. Dropped (closed) after writing.
pub type ScreenshotSink = Box<dyn Write + Send>;

/// Multi-producer mailbox of screenshot sinks.
///
/// Any thread may [`push`](Self::push); the frame thread drains the whole queue
/// at the end of the capturing frame. Clones share one queue.
#[derive(Clone, Default)]
pub struct ScreenshotQueue {
    sinks: Arc<Mutex<Vec<ScreenshotSink>>>,
}

impl ScreenshotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sink: ScreenshotSink) {
        self.lock().push(sink);
    }

    /// Queues a buffered file at `path`, created now.
    pub fn request_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("create screenshot {}", path.display()))?;
        log::info!("screenshot requested: {}", path.display());
        self.push(Box::new(BufWriter::new(file)));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Takes every queued sink in push order, leaving the queue empty.
    pub fn drain(&self) -> Vec<ScreenshotSink> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ScreenshotSink>> {
        // A producer panicking mid-push cannot leave the Vec half-updated.
        self.sinks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScreenshotQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotQueue").field("pending", &self.len()).finish()
    }
}

/// Encodes tightly packed RGBA8 pixels as PNG into `sink`.
pub fn encode_rgba_png(width: u32, height: u32, rgba: &[u8], sink: &mut dyn Write) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    ensure!(
        rgba.len() == expected,
        "pixel buffer is {} bytes, expected {expected} for {width}x{height}",
        rgba.len()
    );
    PngEncoder::new(sink)
        .write_image(rgba, width, height, ExtendedColorType::Rgba8)
        .context("encode png")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SharedSink;

    #[test]
    fn clones_share_one_queue() {
        let queue = ScreenshotQueue::new();
        let producer = queue.clone();
        producer.push(Box::new(Vec::new()));
        producer.push(Box::new(Vec::new()));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.drain().len(), 2);
        assert!(producer.is_empty());
    }

    #[test]
    fn producers_on_other_threads() {
        let queue = ScreenshotQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = queue.clone();
                std::thread::spawn(move || q.push(Box::new(Vec::new())))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.drain().len(), 4);
    }

    #[test]
    fn png_has_signature_and_dimensions() {
        let sink = SharedSink::new();
        let mut writer = sink.writer();
        encode_rgba_png(3, 2, &[255; 3 * 2 * 4], &mut writer).unwrap();

        let bytes = sink.bytes();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        // IHDR follows the signature: length, tag, width, height.
        assert_eq!(&bytes[12..16], b"IHDR");
        assert_eq!(u32::from_be_bytes(bytes[16..20].try_into().unwrap()), 3);
        assert_eq!(u32::from_be_bytes(bytes[20..24].try_into().unwrap()), 2);
    }

    #[test]
    fn png_rejects_short_buffer() {
        let mut out = Vec::new();
        assert!(encode_rgba_png(4, 4, &[0; 8], &mut out).is_err());
    }

    #[test]
    fn request_to_file_creates_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let queue = ScreenshotQueue::new();
        queue.request_to_file(&path).unwrap();
        assert!(path.exists());
        assert_eq!(queue.len(), 1);
    }
}
