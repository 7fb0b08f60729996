//! HTTP surface against real device threads fed by an in-memory source.

use argus_camera::{CameraError, CaptureApi, DeviceId, Frame, FrameSource, Property, SourceOpener};
use argus_device::{Device, DeviceConfig, DeviceHandle, LoopTiming, MjpegStream};
use argus_server::web::CameraStatus;
use argus_server::{router, AppState, Camera};
use image::{Rgb, RgbImage};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct StillSource {
    open: bool,
}

impl FrameSource for StillSource {
    fn read(&mut self, frame: &mut Frame) -> argus_camera::Result<()> {
        frame.replace(RgbImage::from_pixel(32, 24, Rgb([200, 100, 50])));
        Ok(())
    }

    fn get(&self, property: Property) -> Option<f64> {
        match property {
            Property::FrameWidth => Some(32.0),
            Property::FrameHeight => Some(24.0),
            Property::Fps => Some(25.0),
            _ => None,
        }
    }

    fn set(&mut self, property: Property, _value: f64) -> argus_camera::Result<()> {
        Err(CameraError::UnsupportedProperty(property))
    }

    fn is_opened(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

struct StillOpener {
    refuse: bool,
}

impl SourceOpener for StillOpener {
    fn open(&mut self, id: &DeviceId, _api: CaptureApi) -> argus_camera::Result<Box<dyn FrameSource>> {
        if self.refuse {
            return Err(CameraError::Open { id: id.to_string(), reason: "unplugged".into() });
        }
        Ok(Box::new(StillSource { open: true }))
    }
}

struct Rig {
    addr: SocketAddr,
    handles: Vec<DeviceHandle>,
    threads: Vec<JoinHandle<argus_device::Result<()>>>,
    _dir: tempfile::TempDir,
}

impl Rig {
    /// One device per entry; `true` means its opener refuses.
    async fn start(refusals: &[bool]) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let mut cameras = Vec::new();
        let mut handles = Vec::new();
        let mut threads = Vec::new();

        for (i, &refuse) in refusals.iter().enumerate() {
            let mut config = DeviceConfig::new(DeviceId::Local(i as u32));
            config.recordings = dir.path().to_path_buf();
            config.timing = LoopTiming { normal_delay: Duration::from_millis(2), ..LoopTiming::default() };

            let stream = Arc::new(MjpegStream::new(70));
            let device = Device::new(config, Box::new(StillOpener { refuse })).with_sink(stream.clone());
            let handle = device.handle();
            threads.push(device.spawn().unwrap());
            if !refuse {
                wait_for(|| handle.is_busy()).await;
            }
            handles.push(handle.clone());
            cameras.push(Camera { handle, stream });
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(AppState::new(cameras));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Rig { addr, handles, threads, _dir: dir }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn stop(self) {
        for h in &self.handles {
            h.stop();
        }
        for t in self.threads {
            let _ = t.join().unwrap();
        }
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

async fn get_text(url: &str) -> (u16, String) {
    let resp = client().get(url).send().await.unwrap();
    let code = resp.status().as_u16();
    (code, resp.text().await.unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn record_route_toggles() {
    let rig = Rig::start(&[false]).await;
    let handle = rig.handles[0].clone();

    assert_eq!(get_text(&rig.url("/record/?duration=7")).await, (200, "record for 7 seconds".into()));
    wait_for(|| handle.is_recording()).await;
    assert_eq!(get_text(&rig.url("/record/")).await, (200, "stop".into()));
    wait_for(|| !handle.is_recording()).await;

    assert_eq!(get_text(&rig.url("/record/?duration=soon")).await, (200, "record for 5 seconds".into()));
    wait_for(|| handle.is_recording()).await;

    rig.stop();
    assert!(!handle.is_recording());
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_duration_is_clamped_and_the_device_survives() {
    let rig = Rig::start(&[false]).await;
    let handle = rig.handles[0].clone();

    let (code, body) = get_text(&rig.url("/record/?duration=10000000000000000000")).await;
    assert_eq!((code, body.as_str()), (200, "record for 86400 seconds"));
    wait_for(|| handle.is_recording()).await;

    assert_eq!(get_text(&rig.url("/record/")).await, (200, "stop".into()));
    wait_for(|| !handle.is_recording()).await;
    assert!(handle.is_busy());
    rig.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_camera_answers_503() {
    let rig = Rig::start(&[false, true]).await;

    let (code, body) = get_text(&rig.url("/1/record/")).await;
    assert_eq!(code, 503);
    assert_eq!(body, "camera is idle");
    assert!(!rig.handles[1].is_recording());
    rig.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_cameras_are_404() {
    let rig = Rig::start(&[false]).await;

    assert_eq!(get_text(&rig.url("/3/")).await.0, 404);
    assert_eq!(get_text(&rig.url("/3/record/")).await.0, 404);
    // camera 0 only lives at the bare routes
    assert_eq!(get_text(&rig.url("/0/record/")).await.0, 404);
    rig.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn status_lists_every_camera() {
    let rig = Rig::start(&[false, true]).await;
    wait_for(|| rig.handles[0].status().frames() > 0).await;

    let body = client().get(rig.url("/status")).send().await.unwrap().bytes().await.unwrap();
    let status: Vec<CameraStatus> = serde_json::from_slice(&body).unwrap();

    assert_eq!(status.len(), 2);
    assert_eq!(status[0].name, "V4L-00");
    assert!(status[0].busy);
    assert_eq!(status[0].negotiated.map(|p| (p.width, p.height)), Some((32, 24)));
    assert_eq!(status[1].name, "V4L-01");
    assert!(!status[1].busy);
    assert_eq!(status[1].negotiated, None);
    rig.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn live_route_streams_multipart_jpegs() {
    let rig = Rig::start(&[false]).await;

    let mut resp = client().get(rig.url("/")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert_eq!(content_type, "multipart/x-mixed-replace; boundary=frame");

    let mut seen = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while !seen.windows(2).any(|w| w == [0xFF, 0xD9]) {
            match resp.chunk().await.unwrap() {
                Some(chunk) => seen.extend_from_slice(&chunk),
                None => break,
            }
        }
    })
    .await;
    assert!(read.is_ok(), "no frame within 5s");
    assert!(seen.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n"));
    assert!(seen.windows(2).any(|w| w == [0xFF, 0xD8]));

    drop(resp);
    rig.stop();
}
