// argus-camera/src/lib.rs
// ============================================================
// Frame sources for the argus capture daemon
// Opens local sensors or network streams and hands decoded RGB
// frames to the device loop one read at a time.
// ------------------------------------------------------------
// Public API:
//   * SourceOpener::open()  – resolve a DeviceId into a FrameSource
//   * FrameSource::read()   – blocking read of the next frame
//   * FrameSource::get/set  – device property access
// ------------------------------------------------------------
// Build notes
//   * HTTP Motion-JPEG sources are always available.
//   * Local v4l2 devices need `--features gstreamer`.
// ============================================================

//! argus – camera capture layer
//!
//! Everything the device loop needs from a camera lives behind two
//! traits: a [`SourceOpener`] that turns a [`DeviceId`] plus a
//! [`CaptureApi`] selector into an open [`FrameSource`], and the
//! source itself, which yields [`Frame`]s on demand and exposes
//! numeric [`Property`] get/set.  Sources are owned by exactly one
//! device loop and are never shared between threads.

use thiserror::Error;

mod convert;
mod frame;
mod identity;
mod mjpeg;
mod source;

#[cfg(feature = "gstreamer")]
mod gst_source;

pub use convert::{nv12_into_frame, nv12_to_image, nv12_to_rgb};
pub use frame::Frame;
pub use identity::{CaptureApi, DeviceId, Property, StreamParams};
pub use mjpeg::{JpegScanner, MjpegHttpSource};
pub use source::{FrameSource, SourceOpener, SystemOpener};

#[cfg(feature = "gstreamer")]
pub use gst_source::GstSource;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open {id}: {reason}")]
    Open { id: String, reason: String },
    #[error("capture API {api} cannot open {id}")]
    UnsupportedApi { api: CaptureApi, id: String },
    #[error("invalid device id: {0:?}")]
    InvalidId(String),
    #[error("unknown capture API: {0:?}")]
    InvalidApi(String),
    #[error("unknown property: {0:?}")]
    InvalidProperty(String),
    #[error("source is not open")]
    NotOpen,
    #[error("read failed: {0}")]
    Read(String),
    #[error("end of stream")]
    EndOfStream,
    #[error("property {0} is not supported by this source")]
    UnsupportedProperty(Property),
    #[error("cannot encode an empty frame")]
    EmptyFrame,
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "gstreamer")]
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[cfg(feature = "gstreamer")]
    #[error("Pipeline element missing: {0}")]
    MissingElement(&'static str),
    #[cfg(feature = "gstreamer")]
    #[error("Failed to change pipeline state: {0}")]
    StateChange(#[source] gst::StateChangeError),
}

pub type Result<T> = std::result::Result<T, CameraError>;
