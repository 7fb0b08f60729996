// argus-device/src/writer.rs
use crate::{DeviceError, Result};
use argus_camera::{Frame, StreamParams};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Persistent sink for one recording session.
///
/// `finish` consumes the writer, so nothing can touch it once the
/// session is over.
pub trait FrameWriter: Send {
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Opens one [`FrameWriter`] per recording session.
pub trait WriterFactory: Send {
    /// File extension for recordings, without the dot.
    fn extension(&self) -> &str;

    fn create(&mut self, path: &Path, params: &StreamParams) -> Result<Box<dyn FrameWriter>>;
}

/// Concatenated JPEGs in one file (`ffmpeg -f mjpeg -i record_….mjpeg`).
pub struct MjpegFileWriter {
    out: BufWriter<File>,
    quality: u8,
}

impl MjpegFileWriter {
    pub fn create(path: &Path, quality: u8) -> Result<Self> {
        let file = File::create(path)
            .map_err(|source| DeviceError::RecordOutput { path: path.to_path_buf(), source })?;
        Ok(Self { out: BufWriter::new(file), quality })
    }
}

impl FrameWriter for MjpegFileWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        frame.write_jpeg(&mut self.out, self.quality)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MjpegFileFactory {
    pub quality: u8,
}

impl Default for MjpegFileFactory {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

impl WriterFactory for MjpegFileFactory {
    fn extension(&self) -> &str {
        "mjpeg"
    }

    fn create(&mut self, path: &Path, _params: &StreamParams) -> Result<Box<dyn FrameWriter>> {
        Ok(Box::new(MjpegFileWriter::create(path, self.quality)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn writes_concatenated_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mjpeg");
        let mut factory = MjpegFileFactory::default();
        let mut writer = factory.create(&path, &StreamParams::default()).unwrap();

        let frame = Frame::from_image(RgbImage::from_pixel(16, 8, Rgb([1, 2, 3])));
        writer.write(&frame).unwrap();
        writer.write(&frame).unwrap();
        writer.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let starts = bytes.windows(2).filter(|w| *w == [0xFF, 0xD8]).count();
        assert_eq!(starts, 2);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn empty_frames_are_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MjpegFileWriter::create(&dir.path().join("x.mjpeg"), 80).unwrap();
        assert!(writer.write(&Frame::empty()).is_err());
    }

    #[test]
    fn missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = MjpegFileWriter::create(&dir.path().join("no/such/dir.mjpeg"), 80).err().unwrap();
        assert!(matches!(err, DeviceError::RecordOutput { .. }));
    }
}
