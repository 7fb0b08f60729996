// argus-device/src/config.rs
use argus_camera::{CaptureApi, DeviceId, StreamParams};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tick pacing and backoff tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopTiming {
    /// Sleep between ticks while reads succeed.
    #[serde(rename = "normal_delay_ms", with = "millis")]
    pub normal_delay: Duration,
    /// Sleep after a failed read, up to `failure_threshold` failures.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
    /// Sleep once consecutive failures exceed `failure_threshold`.
    #[serde(rename = "hibernate_delay_ms", with = "millis")]
    pub hibernate_delay: Duration,
    pub failure_threshold: u32,
    /// Used when a start-recording command carries no usable duration.
    #[serde(rename = "record_seconds", with = "seconds")]
    pub record_duration: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            normal_delay: Duration::from_millis(20),
            retry_delay: Duration::from_secs(1),
            hibernate_delay: Duration::from_secs(30),
            failure_threshold: 10,
            record_duration: Duration::from_secs(5),
        }
    }
}

/// Everything needed to build one [`Device`](crate::Device).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    #[serde(default)]
    pub api: CaptureApi,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub request: StreamParams,
    #[serde(default = "default_recordings")]
    pub recordings: PathBuf,
    #[serde(default = "default_quality")]
    pub stream_quality: u8,
    #[serde(default = "default_quality")]
    pub record_quality: u8,
    #[serde(default)]
    pub timing: LoopTiming,
}

fn default_recordings() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_quality() -> u8 {
    80
}

impl DeviceConfig {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            api: CaptureApi::Any,
            name: None,
            request: StreamParams::default(),
            recordings: default_recordings(),
            stream_quality: default_quality(),
            record_quality: default_quality(),
            timing: LoopTiming::default(),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.default_name())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(serde::de::Error::custom("record_seconds must be positive"));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
