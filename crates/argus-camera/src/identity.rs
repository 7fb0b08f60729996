// argus-camera/src/identity.rs
use crate::CameraError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which capture device to open.
///
/// Config files may spell the id as a bare number (local sensor
/// index) or a string (stream address); both are resolved into this
/// enum once, when the device list is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDeviceId", into = "RawDeviceId")]
pub enum DeviceId {
    Local(u32),
    Remote(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawDeviceId {
    Index(u32),
    Address(String),
}

impl TryFrom<RawDeviceId> for DeviceId {
    type Error = CameraError;

    fn try_from(raw: RawDeviceId) -> Result<Self, Self::Error> {
        match raw {
            RawDeviceId::Index(index) => Ok(DeviceId::Local(index)),
            RawDeviceId::Address(address) => address.parse(),
        }
    }
}

impl From<DeviceId> for RawDeviceId {
    fn from(id: DeviceId) -> Self {
        match id {
            DeviceId::Local(index) => RawDeviceId::Index(index),
            DeviceId::Remote(address) => RawDeviceId::Address(address),
        }
    }
}

impl FromStr for DeviceId {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CameraError::InvalidId(s.to_string()));
        }
        match s.parse::<u32>() {
            Ok(index) => Ok(DeviceId::Local(index)),
            Err(_) => Ok(DeviceId::Remote(s.to_string())),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Local(index) => write!(f, "{index}"),
            DeviceId::Remote(address) => f.write_str(address),
        }
    }
}

impl DeviceId {
    /// Name used when the config does not give one: `V4L-02` for a
    /// local index, the address itself for a stream.
    pub fn default_name(&self) -> String {
        match self {
            DeviceId::Local(index) => format!("V4L-{index:02}"),
            DeviceId::Remote(address) => address.clone(),
        }
    }

    pub fn is_http(&self) -> bool {
        match self {
            DeviceId::Remote(address) => {
                address.starts_with("http://") || address.starts_with("https://")
            }
            DeviceId::Local(_) => false,
        }
    }
}

/// Capture backend selector.  `Any` lets the opener pick and skips
/// pushing the requested geometry to the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureApi {
    #[default]
    Any,
    V4l2,
    Mjpeg,
}

impl CaptureApi {
    pub fn is_explicit(self) -> bool {
        self != CaptureApi::Any
    }
}

impl fmt::Display for CaptureApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureApi::Any => "any",
            CaptureApi::V4l2 => "v4l2",
            CaptureApi::Mjpeg => "mjpeg",
        })
    }
}

impl FromStr for CaptureApi {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" | "" => Ok(CaptureApi::Any),
            "v4l2" | "v4l" => Ok(CaptureApi::V4l2),
            "mjpeg" | "http" => Ok(CaptureApi::Mjpeg),
            _ => Err(CameraError::InvalidApi(s.to_string())),
        }
    }
}

/// Numeric device properties reachable through get/set commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    FrameWidth,
    FrameHeight,
    Fps,
    Brightness,
    Contrast,
    Saturation,
    Hue,
    Gain,
    Exposure,
}

impl Property {
    pub const ALL: [Property; 9] = [
        Property::FrameWidth,
        Property::FrameHeight,
        Property::Fps,
        Property::Brightness,
        Property::Contrast,
        Property::Saturation,
        Property::Hue,
        Property::Gain,
        Property::Exposure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Property::FrameWidth => "frame_width",
            Property::FrameHeight => "frame_height",
            Property::Fps => "fps",
            Property::Brightness => "brightness",
            Property::Contrast => "contrast",
            Property::Saturation => "saturation",
            Property::Hue => "hue",
            Property::Gain => "gain",
            Property::Exposure => "exposure",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Property::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CameraError::InvalidProperty(s.to_string()))
    }
}

/// Stream geometry.  Requested values are hints; the device loop
/// reads the negotiated ones back after every open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self { width: 1280, height: 720, fps: 20.0 }
    }
}

impl fmt::Display for StreamParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} FPS: {:.0}", self.width, self.height, self.fps)
    }
}
