// argus-device/src/error.rs
use argus_camera::CameraError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: CameraError,
    },
    #[error("device loop for '{0}' is not running")]
    Gone(String),
    #[error("failed to create recording {path:?}: {source}")]
    RecordOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("frame encode failed: {0}")]
    Encode(#[from] CameraError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
