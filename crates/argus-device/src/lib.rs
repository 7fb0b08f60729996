// argus-device/src/lib.rs
// ============================================================
// Per-device acquisition and control loop for argus
// One OS thread per camera: sleep → poll {stop, command} →
// read → transform → publish → record, with backoff on failure.
// ------------------------------------------------------------
// Public API:
//   * Device::new(config, opener) – build a device and its handle
//   * Device::serve() / spawn()   – run the loop until stopped
//   * DeviceHandle                – command channel + observers
// ============================================================

//! argus – device loop
//!
//! A [`Device`] exclusively owns its frame source, its working frame
//! buffer and the active [`Recorder`] session.  Everything outside the
//! loop talks to it through a cloneable [`DeviceHandle`]: commands go
//! through a rendezvous channel (the sender blocks until the loop
//! takes the command, commands are never dropped), the stop signal
//! through a one-slot channel, and state is observed through atomics.
//!
//! Nothing inside the loop propagates an error to its caller except
//! failure to open the device at start.  Read failures back off and
//! reopen; writer and sink errors are logged and absorbed.

mod backoff;
mod command;
mod config;
mod device;
mod error;
mod recorder;
mod sink;
mod writer;

pub use backoff::Backoff;
pub use command::{Command, CommandKind, Value};
pub use config::{DeviceConfig, LoopTiming};
pub use device::{Device, DeviceHandle, DeviceStatus, RecordToggle};
pub use error::{DeviceError, Result};
pub use recorder::{recording_file_name, Recorder};
pub use sink::{MjpegStream, StreamSink};
pub use writer::{FrameWriter, MjpegFileFactory, MjpegFileWriter, WriterFactory};
