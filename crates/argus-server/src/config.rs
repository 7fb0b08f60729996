// argus-server/src/config.rs
use anyhow::{bail, Context, Result};
use argus_camera::{CaptureApi, DeviceId, StreamParams};
use argus_device::{DeviceConfig, LoopTiming};
use clap::Parser;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Command-line options.  Everything except `--config` overrides or
/// extends what the config file says.
#[derive(Parser, Debug)]
#[command(name = "argus", version, about = "Camera capture daemon with live MJPEG and record toggles")]
pub struct Cli {
    /// JSON config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// HTTP listen address (default 0.0.0.0:9000)
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Directory recordings are written to
    #[arg(long)]
    pub recordings: Option<PathBuf>,

    /// Extra camera: a local index (`0`) or a stream URL; repeatable
    #[arg(long = "camera", value_name = "ID")]
    pub cameras: Vec<DeviceId>,

    /// Mirror cameras added with `--camera`
    #[arg(long)]
    pub mirror: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

/// One entry of the `cameras` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: DeviceId,
    #[serde(default)]
    pub api: CaptureApi,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub mirror: bool,
    /// ONNX model; needs the `tract` feature.
    #[serde(default)]
    pub detector: Option<PathBuf>,
    #[serde(default = "default_detector_input")]
    pub detector_input: u32,
}

fn default_detector_input() -> u32 {
    640
}

impl CameraConfig {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            api: CaptureApi::Any,
            name: None,
            width: None,
            height: None,
            fps: None,
            mirror: false,
            detector: None,
            detector_input: default_detector_input(),
        }
    }

    pub fn request(&self) -> StreamParams {
        let base = StreamParams::default();
        StreamParams {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            fps: self.fps.unwrap_or(base.fps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub recordings: PathBuf,
    pub stream_quality: u8,
    pub record_quality: u8,
    pub timing: LoopTiming,
    pub cameras: Vec<CameraConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9000)),
            recordings: PathBuf::from("recordings"),
            stream_quality: 80,
            record_quality: 80,
            timing: LoopTiming::default(),
            cameras: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// File (if any) plus CLI overrides.  Fails if no camera is left.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.merge_cli(cli);
        if config.cameras.is_empty() {
            bail!("no cameras configured; pass --camera <ID> or list them in --config");
        }
        Ok(config)
    }

    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(listen) = cli.listen {
            self.listen = listen;
        }
        if let Some(dir) = &cli.recordings {
            self.recordings = dir.clone();
        }
        self.cameras.extend(cli.cameras.iter().cloned().map(|id| CameraConfig {
            mirror: cli.mirror,
            ..CameraConfig::new(id)
        }));
    }

    pub fn device_config(&self, camera: &CameraConfig) -> DeviceConfig {
        DeviceConfig {
            api: camera.api,
            name: camera.name.clone(),
            request: camera.request(),
            recordings: self.recordings.clone(),
            stream_quality: self.stream_quality,
            record_quality: self.record_quality,
            timing: self.timing,
            ..DeviceConfig::new(camera.id.clone())
        }
    }
}
