// argus-camera/src/mjpeg.rs
// ------------------------------------------------------------
// HTTP Motion-JPEG source (ESP32-CAM style `multipart/x-mixed-replace`)
// Frames are cut out of the byte stream by their SOI/EOI markers,
// so the multipart headers never need parsing.
// ------------------------------------------------------------
use crate::{CameraError, Frame, FrameSource, Property, Result};
use image::ImageFormat;
use log::debug;
use std::io::Read;
use std::time::Duration;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const CHUNK: usize = 8192;
// anything bigger is a broken stream, not a frame
const MAX_FRAME: usize = 8 * 1024 * 1024;

/// Incremental JPEG splitter over an arbitrary byte stream.
#[derive(Debug, Default)]
pub struct JpegScanner {
    carry: Vec<u8>,
}

impl JpegScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.carry.extend_from_slice(chunk);
    }

    /// Pop the next complete SOI..=EOI image, if one is buffered.
    pub fn extract(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.carry, SOI) else {
            // keep a trailing 0xFF, it may be half of a split marker
            let keep = usize::from(self.carry.last() == Some(&0xFF));
            let cut = self.carry.len() - keep;
            self.carry.drain(..cut);
            return None;
        };
        let body = start + SOI.len();
        let end = find_marker(&self.carry[body..], EOI)? + body + EOI.len();
        let jpeg = self.carry[start..end].to_vec();
        self.carry.drain(..end);
        Some(jpeg)
    }

    pub fn buffered(&self) -> usize {
        self.carry.len()
    }

    /// Read from `reader` until a whole JPEG is available.
    pub fn next_jpeg<R: Read>(&mut self, reader: &mut R) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; CHUNK];
        loop {
            if let Some(jpeg) = self.extract() {
                return Ok(jpeg);
            }
            if self.carry.len() > MAX_FRAME {
                self.carry.clear();
                return Err(CameraError::Read("JPEG frame exceeds size limit".into()));
            }
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                return Err(CameraError::EndOfStream);
            }
            self.feed(&chunk[..n]);
        }
    }
}

fn find_marker(buf: &[u8], marker: [u8; 2]) -> Option<usize> {
    buf.windows(2).position(|w| w == marker)
}

/// Blocking reader for an HTTP Motion-JPEG endpoint.
pub struct MjpegHttpSource {
    url: String,
    response: Option<reqwest::blocking::Response>,
    scanner: JpegScanner,
    width: u32,
    height: u32,
}

impl MjpegHttpSource {
    pub fn open(url: &str) -> Result<Self> {
        // no total timeout: the body is an endless stream
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Option::<Duration>::None)
            .build()?;

        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| CameraError::Open { id: url.to_string(), reason: e.to_string() })?;

        debug!("connected to {url} ({:?})", response.headers().get(reqwest::header::CONTENT_TYPE));

        Ok(Self {
            url: url.to_string(),
            response: Some(response),
            scanner: JpegScanner::new(),
            width: 0,
            height: 0,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for MjpegHttpSource {
    fn read(&mut self, frame: &mut Frame) -> Result<()> {
        let response = self.response.as_mut().ok_or(CameraError::NotOpen)?;
        let jpeg = self.scanner.next_jpeg(response)?;
        let rgb = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?.to_rgb8();
        self.width = rgb.width();
        self.height = rgb.height();
        frame.replace(rgb);
        Ok(())
    }

    fn get(&self, property: Property) -> Option<f64> {
        match property {
            Property::FrameWidth if self.width > 0 => Some(self.width as f64),
            Property::FrameHeight if self.height > 0 => Some(self.height as f64),
            _ => None,
        }
    }

    fn set(&mut self, property: Property, _value: f64) -> Result<()> {
        Err(CameraError::UnsupportedProperty(property))
    }

    fn is_opened(&self) -> bool {
        self.response.is_some()
    }

    fn close(&mut self) {
        self.response = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fake_jpeg(tag: u8) -> Vec<u8> {
        vec![0xFF, 0xD8, tag, 0x00, tag, 0xFF, 0xD9]
    }

    #[test]
    fn splits_multipart_body() {
        let mut body = Vec::new();
        for tag in [1u8, 2] {
            body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            body.extend_from_slice(&fake_jpeg(tag));
            body.extend_from_slice(b"\r\n");
        }
        let mut reader = Cursor::new(body);
        let mut scanner = JpegScanner::new();

        assert_eq!(scanner.next_jpeg(&mut reader).unwrap(), fake_jpeg(1));
        assert_eq!(scanner.next_jpeg(&mut reader).unwrap(), fake_jpeg(2));
        assert!(matches!(scanner.next_jpeg(&mut reader), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn markers_split_across_chunks() {
        let jpeg = fake_jpeg(9);
        let mut scanner = JpegScanner::new();
        scanner.feed(b"junk\xFF");
        assert!(scanner.extract().is_none());
        scanner.feed(&jpeg[1..5]);
        assert!(scanner.extract().is_none());
        scanner.feed(&[0xFF]);
        assert!(scanner.extract().is_none());
        scanner.feed(&[0xD9, 0x00]);
        assert_eq!(scanner.extract().unwrap(), jpeg);
        assert_eq!(scanner.buffered(), 1);
    }

    #[test]
    fn garbage_without_soi_is_discarded() {
        let mut scanner = JpegScanner::new();
        scanner.feed(&[0x00; 64]);
        assert!(scanner.extract().is_none());
        assert_eq!(scanner.buffered(), 0);
    }
}
