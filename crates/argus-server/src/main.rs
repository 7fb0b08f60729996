// argus-server/src/main.rs
//! `argus` – run every configured camera on its own thread and serve
//! them over HTTP until Ctrl-C.

use anyhow::{Context, Result};
use argus_camera::SystemOpener;
use argus_detect::{Mirror, Passthrough, Transform};
use argus_device::{Device, DeviceHandle, MjpegStream};
use argus_server::{router, AppConfig, AppState, Camera, CameraConfig, Cli};
use clap::Parser;
use log::{error, info, warn};
use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

type DeviceThread = (String, JoinHandle<argus_device::Result<()>>);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();

    let config = AppConfig::resolve(&cli)?;
    info!("argus: {} camera(s), recordings in {:?}", config.cameras.len(), config.recordings);

    let mut cameras = Vec::with_capacity(config.cameras.len());
    let mut handles = Vec::with_capacity(config.cameras.len());
    let mut threads = Vec::with_capacity(config.cameras.len());

    for (index, camera) in config.cameras.iter().enumerate() {
        let device_config = config.device_config(camera);
        let stream = Arc::new(MjpegStream::new(device_config.stream_quality));
        let mut device = Device::new(device_config, Box::new(SystemOpener)).with_sink(stream.clone());
        for transform in transforms_for(camera)? {
            device.add_transform(transform);
        }

        let handle = device.handle();
        info!("camera {index}: '{}' ({})", handle.name(), handle.id());
        let thread = device
            .spawn()
            .with_context(|| format!("spawning device thread for '{}'", handle.name()))?;

        threads.push((handle.name().to_string(), thread));
        handles.push(handle.clone());
        cameras.push(Camera { handle, stream });
    }

    let app = router(AppState::new(cameras));
    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            stop_devices(&handles, threads).await;
            return Err(e).with_context(|| format!("binding {}", config.listen));
        }
    };
    info!("listening on http://{}", config.listen);

    // live streams never finish on their own, so the server is dropped
    // rather than drained
    let served = tokio::select! {
        res = axum::serve(listener, app).into_future() => res.context("http server failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            Ok(())
        }
    };

    stop_devices(&handles, threads).await;
    served
}

/// Mirror first, then detection; a camera with neither passes frames
/// through untouched.
fn transforms_for(camera: &CameraConfig) -> Result<Vec<Box<dyn Transform>>> {
    let mut chain: Vec<Box<dyn Transform>> = Vec::new();
    if camera.mirror {
        chain.push(Box::new(Mirror));
    }
    if let Some(model) = &camera.detector {
        chain.push(detector(model, camera.detector_input)?);
    }
    if chain.is_empty() {
        chain.push(Box::new(Passthrough));
    }
    Ok(chain)
}

#[cfg(feature = "tract")]
fn detector(model: &Path, input_size: u32) -> Result<Box<dyn Transform>> {
    use argus_detect::{DetectAnnotate, TractYolo};

    let yolo = TractYolo::new(model, input_size)
        .with_context(|| format!("loading detector {}", model.display()))?;
    info!("detector {} loaded ({input_size}x{input_size})", model.display());
    Ok(Box::new(DetectAnnotate::new(yolo)))
}

#[cfg(not(feature = "tract"))]
fn detector(model: &Path, _input_size: u32) -> Result<Box<dyn Transform>> {
    warn!("detector {} ignored: built without the `tract` feature", model.display());
    Ok(Box::new(Passthrough))
}

async fn stop_devices(handles: &[DeviceHandle], threads: Vec<DeviceThread>) {
    for handle in handles {
        handle.stop();
    }

    let joined = tokio::task::spawn_blocking(move || {
        threads
            .into_iter()
            .map(|(name, thread)| (name, thread.join()))
            .collect::<Vec<_>>()
    })
    .await;

    let Ok(joined) = joined else {
        error!("device join task failed");
        return;
    };
    for (name, result) in joined {
        match result {
            Ok(Ok(())) => info!("'{name}' stopped"),
            Ok(Err(e)) => warn!("'{name}' never started: {e}"),
            Err(_) => error!("'{name}' device thread panicked"),
        }
    }
}
