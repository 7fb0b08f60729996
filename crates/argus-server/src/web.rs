// argus-server/src/web.rs
//! HTTP surface: live MJPEG per camera, record toggles, JSON status.
//!
//! Camera 0 lives at `/` and `/record/`, camera *i* at `/{i}/` and
//! `/{i}/record/`.

use argus_camera::StreamParams;
use argus_device::{DeviceHandle, MjpegStream, RecordToggle};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use bytes::{Bytes, BytesMut};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

pub const DEFAULT_RECORD_SECONDS: u64 = 5;
/// One day; longer requests are clamped.
pub const MAX_RECORD_SECONDS: u64 = 24 * 60 * 60;
const BOUNDARY: &str = "frame";

/// A running device plus the live stream it publishes into.
pub struct Camera {
    pub handle: DeviceHandle,
    pub stream: Arc<MjpegStream>,
}

#[derive(Clone)]
pub struct AppState {
    cameras: Arc<[Camera]>,
}

impl AppState {
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self { cameras: cameras.into() }
    }

    fn camera(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(live_first))
        .route("/record/", get(record_first))
        .route("/status", get(status))
        .route("/:index/", get(live))
        .route("/:index/record/", get(record))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    duration: Option<String>,
}

/// Seconds from `?duration=`; anything that is not a positive
/// integer means the default.
pub fn parse_duration(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .map_or(DEFAULT_RECORD_SECONDS, |secs| secs.min(MAX_RECORD_SECONDS))
}

/// One part of a `multipart/x-mixed-replace` body.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

/// Indexed routes only serve cameras 1..n; camera 0 has the bare ones.
fn indexed(state: &AppState, index: usize) -> Option<&Camera> {
    if index == 0 {
        return None;
    }
    state.camera(index)
}

async fn live_first(State(state): State<AppState>) -> Response {
    match state.camera(0) {
        Some(camera) => live_response(camera),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn live(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    match indexed(&state, index) {
        Some(camera) => live_response(camera),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn live_response(camera: &Camera) -> Response {
    info!("viewer joined '{}' ({} watching)", camera.handle.name(), camera.stream.subscribers() + 1);
    let parts = WatchStream::new(camera.stream.subscribe())
        .filter_map(|jpeg| jpeg.map(|jpeg| Ok::<_, Infallible>(multipart_part(&jpeg))));

    (
        [
            (header::CONTENT_TYPE, format!("multipart/x-mixed-replace; boundary={BOUNDARY}")),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

async fn record_first(State(state): State<AppState>, Query(query): Query<RecordQuery>) -> Response {
    match state.camera(0) {
        Some(camera) => toggle(camera, &query).await,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn record(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<RecordQuery>,
) -> Response {
    match indexed(&state, index) {
        Some(camera) => toggle(camera, &query).await,
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn toggle(camera: &Camera, query: &RecordQuery) -> Response {
    if !camera.handle.is_busy() {
        return (StatusCode::SERVICE_UNAVAILABLE, "camera is idle").into_response();
    }
    let seconds = parse_duration(query.duration.as_deref());
    let handle = camera.handle.clone();

    // the command send waits for the device loop to take it
    let toggled =
        tokio::task::spawn_blocking(move || handle.record_toggle(Duration::from_secs(seconds))).await;
    match toggled {
        Ok(Ok(RecordToggle::Stopped)) => "stop".into_response(),
        Ok(Ok(RecordToggle::Started(d))) => format!("record for {} seconds", d.as_secs()).into_response(),
        Ok(Err(e)) => {
            warn!("record toggle on '{}': {e}", camera.handle.name());
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
        Err(e) => {
            error!("record toggle task: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CameraStatus {
    pub index: usize,
    pub name: String,
    pub id: String,
    pub busy: bool,
    pub recording: bool,
    pub hidden: bool,
    pub failures: u32,
    pub delay_ms: u64,
    pub frames: u64,
    pub viewers: usize,
    pub negotiated: Option<StreamParams>,
}

impl CameraStatus {
    fn of(index: usize, camera: &Camera) -> Self {
        let h = &camera.handle;
        Self {
            index,
            name: h.name().to_string(),
            id: h.id().to_string(),
            busy: h.is_busy(),
            recording: h.is_recording(),
            hidden: h.is_hidden(),
            failures: h.failures(),
            delay_ms: h.current_delay().as_millis() as u64,
            frames: h.status().frames(),
            viewers: camera.stream.subscribers(),
            negotiated: h.negotiated(),
        }
    }
}

async fn status(State(state): State<AppState>) -> Json<Vec<CameraStatus>> {
    Json(state.cameras.iter().enumerate().map(|(i, c)| CameraStatus::of(i, c)).collect())
}
