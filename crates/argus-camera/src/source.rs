// argus-camera/src/source.rs
use crate::{CameraError, CaptureApi, DeviceId, Frame, MjpegHttpSource, Property, Result};

/// An open capture handle.
///
/// `read` blocks until the next frame is available (or the backend
/// gives up).  `Ok(())` with an empty frame means "nothing this time"
/// and is not a failure; `Err` is a failed read and makes the device
/// loop back off and reopen.
pub trait FrameSource: Send {
    fn read(&mut self, frame: &mut Frame) -> Result<()>;

    /// Current value of `property`, if the backend knows it.
    fn get(&self, property: Property) -> Option<f64>;

    fn set(&mut self, property: Property, value: f64) -> Result<()>;

    fn is_opened(&self) -> bool;

    /// Release the handle.  Must be safe to call more than once.
    fn close(&mut self);
}

/// Turns a device identity into an open [`FrameSource`].
pub trait SourceOpener: Send {
    fn open(&mut self, id: &DeviceId, api: CaptureApi) -> Result<Box<dyn FrameSource>>;
}

/// Backend selection used by the daemon.
///
/// * `http(s)://` streams  → [`MjpegHttpSource`]
/// * local indices / other URIs → GStreamer (feature `gstreamer`)
#[derive(Debug, Default, Clone)]
pub struct SystemOpener;

impl SourceOpener for SystemOpener {
    fn open(&mut self, id: &DeviceId, api: CaptureApi) -> Result<Box<dyn FrameSource>> {
        match (api, id) {
            (CaptureApi::Any | CaptureApi::Mjpeg, DeviceId::Remote(url)) if id.is_http() => {
                Ok(Box::new(MjpegHttpSource::open(url)?))
            }
            #[cfg(feature = "gstreamer")]
            (CaptureApi::Any | CaptureApi::V4l2, DeviceId::Local(index)) => {
                Ok(Box::new(crate::GstSource::open_v4l2(*index)?))
            }
            #[cfg(feature = "gstreamer")]
            (CaptureApi::Any, DeviceId::Remote(uri)) => Ok(Box::new(crate::GstSource::open_uri(uri)?)),
            _ => Err(CameraError::UnsupportedApi { api, id: id.to_string() }),
        }
    }
}
