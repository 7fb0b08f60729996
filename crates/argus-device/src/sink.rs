// argus-device/src/sink.rs
use argus_camera::Frame;
use bytes::Bytes;
use log::warn;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Live-distribution endpoint for processed frames.
///
/// `publish` is called from the device thread once per processed
/// tick and must not wait on subscribers.
pub trait StreamSink: Send + Sync {
    fn publish(&self, frame: &Frame);

    /// Idempotent shutdown hook, called when the device loop exits.
    fn close(&self) {}
}

/// Keeps the latest frame as a JPEG and fans it out to viewers.
///
/// The buffer is a single watch slot: a slow viewer skips frames,
/// it never holds the device back.
pub struct MjpegStream {
    tx: watch::Sender<Option<Bytes>>,
    quality: u8,
    published: AtomicU64,
}

impl MjpegStream {
    pub fn new(quality: u8) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx, quality, published: AtomicU64::new(0) }
    }

    /// Receiver that yields the latest JPEG (`None` before the first
    /// frame and after close).
    pub fn subscribe(&self) -> watch::Receiver<Option<Bytes>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<Bytes> {
        self.tx.borrow().clone()
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl StreamSink for MjpegStream {
    fn publish(&self, frame: &Frame) {
        match frame.encode_jpeg(self.quality) {
            Ok(jpeg) => {
                self.tx.send_replace(Some(Bytes::from(jpeg)));
                self.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!("stream encode failed: {e}"),
        }
    }

    fn close(&self) {
        self.tx.send_replace(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame() -> Frame {
        Frame::from_image(RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])))
    }

    #[test]
    fn publish_without_viewers_keeps_latest() {
        let stream = MjpegStream::new(75);
        assert!(stream.latest().is_none());
        stream.publish(&frame());
        stream.publish(&frame());
        assert_eq!(stream.published(), 2);
        let jpeg = stream.latest().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn empty_frames_are_not_published() {
        let stream = MjpegStream::new(75);
        stream.publish(&Frame::empty());
        assert_eq!(stream.published(), 0);
        assert!(stream.latest().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_new_frames_and_close() {
        let stream = MjpegStream::new(75);
        let mut rx = stream.subscribe();
        assert_eq!(stream.subscribers(), 1);

        stream.publish(&frame());
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        stream.close();
        stream.close();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
