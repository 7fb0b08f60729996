// argus-server/src/lib.rs
// ============================================================
// argus daemon: config, device bootstrap and HTTP surface
// ------------------------------------------------------------
//   * config – CLI flags + JSON file → AppConfig
//   * web    – axum router over the running devices
// ============================================================

pub mod config;
pub mod web;

pub use config::{AppConfig, CameraConfig, Cli};
pub use web::{router, AppState, Camera};
