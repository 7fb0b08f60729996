// argus-device/src/device.rs
use crate::{
    Backoff, Command, DeviceConfig, DeviceError, MjpegFileFactory, MjpegStream, Recorder, Result,
    StreamSink, Value, WriterFactory,
};
use argus_camera::{CameraError, DeviceId, Frame, FrameSource, Property, SourceOpener, StreamParams};
use argus_detect::Transform;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Observable device state.  Written only by the device loop.
#[derive(Debug, Default)]
pub struct DeviceStatus {
    busy: AtomicBool,
    recording: AtomicBool,
    hidden: AtomicBool,
    failures: AtomicU32,
    delay_us: AtomicU64,
    frames: AtomicU64,
    negotiated: Mutex<Option<StreamParams>>,
}

impl DeviceStatus {
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::Acquire)
    }

    /// Consecutive failed reads.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Delay the loop sleeps before its next tick.
    pub fn current_delay(&self) -> Duration {
        Duration::from_micros(self.delay_us.load(Ordering::Acquire))
    }

    /// Frames transformed and published since construction.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Stream parameters read back from the source at the last open,
    /// corrected by the size of the frames it actually delivers.
    pub fn negotiated(&self) -> Option<StreamParams> {
        *self.negotiated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_backoff(&self, backoff: &Backoff) {
        self.failures.store(backoff.failures(), Ordering::Release);
        self.delay_us.store(backoff.delay().as_micros() as u64, Ordering::Release);
    }

    fn set_negotiated(&self, params: StreamParams) {
        *self.negotiated.lock().unwrap_or_else(PoisonError::into_inner) = Some(params);
    }
}

/// What a record toggle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordToggle {
    Stopped,
    Started(Duration),
}

/// Cloneable remote control for one [`Device`].
#[derive(Clone)]
pub struct DeviceHandle {
    name: Arc<str>,
    id: DeviceId,
    commands: Sender<Command>,
    stop: Sender<()>,
    status: Arc<DeviceStatus>,
}

impl DeviceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn is_recording(&self) -> bool {
        self.status.is_recording()
    }

    pub fn is_hidden(&self) -> bool {
        self.status.is_hidden()
    }

    pub fn failures(&self) -> u32 {
        self.status.failures()
    }

    pub fn current_delay(&self) -> Duration {
        self.status.current_delay()
    }

    pub fn negotiated(&self) -> Option<StreamParams> {
        self.status.negotiated()
    }

    /// Hand a command to the loop, blocking until the loop takes it.
    pub fn command(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| DeviceError::Gone(self.name.to_string()))
    }

    pub fn get_property(&self, property: Property) -> Result<Option<f64>> {
        let (tx, rx) = bounded(1);
        self.command(Command::GetProperty { property, reply: Some(tx) })?;
        rx.recv().map_err(|_| DeviceError::Gone(self.name.to_string()))
    }

    pub fn set_property(&self, property: Property, value: impl Into<Value>) -> Result<()> {
        self.command(Command::SetProperty { property, value: value.into() })
    }

    pub fn hide_all(&self, hide: bool) -> Result<()> {
        self.command(Command::HideAll(Value::Bool(hide)))
    }

    pub fn start_recording(&self, duration: Duration) -> Result<()> {
        self.command(Command::StartRecording { duration: duration.into() })
    }

    pub fn stop_recording(&self) -> Result<()> {
        self.command(Command::StopRecording)
    }

    /// Stop if recording, otherwise start for `duration`.
    pub fn record_toggle(&self, duration: Duration) -> Result<RecordToggle> {
        if self.is_recording() {
            self.stop_recording()?;
            Ok(RecordToggle::Stopped)
        } else {
            self.start_recording(duration)?;
            Ok(RecordToggle::Started(duration))
        }
    }

    /// Ask the loop to exit at its next tick.  Never blocks.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }
}

/// State that only exists while the loop holds the device open.
struct Capture {
    source: Option<Box<dyn FrameSource>>,
    frame: Frame,
    backoff: Backoff,
}

/// One camera: its source opener, transform chain, live sink and
/// recorder, plus the receiving ends of its command and stop channels.
pub struct Device {
    config: DeviceConfig,
    opener: Box<dyn SourceOpener>,
    transforms: Vec<Box<dyn Transform>>,
    sink: Arc<dyn StreamSink>,
    recorder: Recorder,
    handle: DeviceHandle,
    commands: Receiver<Command>,
    stop: Receiver<()>,
}

impl Device {
    pub fn new(config: DeviceConfig, opener: Box<dyn SourceOpener>) -> Self {
        // rendezvous: senders wait for the loop, nothing is queued or dropped
        let (cmd_tx, cmd_rx) = bounded(0);
        let (stop_tx, stop_rx) = bounded(1);

        let handle = DeviceHandle {
            name: config.display_name().into(),
            id: config.id.clone(),
            commands: cmd_tx,
            stop: stop_tx,
            status: Arc::new(DeviceStatus::default()),
        };
        let sink = Arc::new(MjpegStream::new(config.stream_quality));
        let factory = MjpegFileFactory { quality: config.record_quality };
        let recorder = Recorder::new(config.recordings.clone(), Box::new(factory));

        Self {
            config,
            opener,
            transforms: Vec::new(),
            sink,
            recorder,
            handle,
            commands: cmd_rx,
            stop: stop_rx,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StreamSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_writer(mut self, factory: Box<dyn WriterFactory>) -> Self {
        self.recorder = Recorder::new(self.config.recordings.clone(), factory);
        self
    }

    pub fn with_transform(mut self, transform: Box<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn add_transform(&mut self, transform: Box<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle.clone()
    }

    /// Run the loop on a dedicated thread named after the device.
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<Result<()>>> {
        thread::Builder::new()
            .name(format!("device-{}", self.name()))
            .spawn(move || self.serve())
    }

    /// Open the device and run until a stop signal arrives.
    ///
    /// Returns `Ok(())` immediately if the device is already busy and
    /// `Err(DeviceError::Open)` if the first open fails; that is the
    /// only error this ever returns.
    pub fn serve(&mut self) -> Result<()> {
        let status = Arc::clone(&self.handle.status);
        if status.is_busy() {
            debug!("'{}' already running", self.name());
            return Ok(());
        }
        // a stop aimed at a previous run must not end this one
        while self.stop.try_recv().is_ok() {}

        let source = self.open_source()?;
        status.busy.store(true, Ordering::Release);

        let backoff = Backoff::new(self.config.timing);
        status.set_backoff(&backoff);
        let mut capture = Capture { source: Some(source), frame: Frame::empty(), backoff };

        self.run(&mut capture);
        self.shutdown(capture);

        status.busy.store(false, Ordering::Release);
        Ok(())
    }

    fn run(&mut self, capture: &mut Capture) {
        loop {
            thread::sleep(capture.backoff.delay());

            // stop wins over a command that is ready in the same tick
            if self.stop.try_recv().is_ok() {
                info!("stopping '{}'", self.name());
                return;
            }
            if let Ok(cmd) = self.commands.try_recv() {
                self.apply(cmd, &mut capture.source);
                continue;
            }

            self.tick(capture);
        }
    }

    fn tick(&mut self, capture: &mut Capture) {
        let status = Arc::clone(&self.handle.status);

        let read = match capture.source.as_mut() {
            Some(source) => source.read(&mut capture.frame),
            None => Err(CameraError::NotOpen),
        };

        if let Err(e) = read {
            let delay = capture.backoff.fail();
            status.set_backoff(&capture.backoff);
            warn!(
                "{} is unavailable ({e}), attempts={} next in {:.0} seconds",
                self.config.id,
                capture.backoff.failures(),
                delay.as_secs_f64()
            );
            self.reopen(capture);
            return;
        }

        if capture.backoff.is_degraded() {
            info!("'{}' recovered after {} failed reads", self.name(), capture.backoff.failures());
        }
        capture.backoff.succeed();
        status.set_backoff(&capture.backoff);

        if capture.frame.is_empty() {
            return;
        }
        self.track_geometry(capture);
        if status.is_hidden() {
            return;
        }

        for transform in self.transforms.iter_mut() {
            transform.apply(&mut capture.frame);
        }
        self.sink.publish(&capture.frame);
        status.frames.fetch_add(1, Ordering::AcqRel);

        if self.recorder.is_recording() {
            self.recorder.write(&capture.frame);
            if self.recorder.expired(Instant::now()) {
                self.apply(Command::StopRecording, &mut capture.source);
            }
        }
    }

    fn apply(&mut self, command: Command, source: &mut Option<Box<dyn FrameSource>>) {
        debug!("'{}' <- {}", self.name(), command.kind());
        let status = Arc::clone(&self.handle.status);

        match command {
            Command::GetProperty { property, reply } => {
                let value = source.as_deref().and_then(|s| s.get(property));
                debug!("'{}' {property} = {value:?}", self.name());
                if let Some(reply) = reply {
                    let _ = reply.try_send(value);
                }
            }
            Command::SetProperty { property, value } => {
                let value = value.as_f64();
                match source.as_deref_mut() {
                    Some(source) => {
                        if let Err(e) = source.set(property, value) {
                            warn!("'{}' set {property}={value}: {e}", self.name());
                        }
                    }
                    None => warn!("'{}' set {property}: source is not open", self.name()),
                }
            }
            Command::HideAll(value) => {
                status.hidden.store(value.as_bool(), Ordering::Release);
            }
            Command::StartRecording { duration } => {
                let duration = duration.as_duration().unwrap_or(self.config.timing.record_duration);
                let params = status.negotiated().unwrap_or(self.config.request);
                if let Err(e) = self.recorder.start(duration, &params) {
                    error!("'{}' start recording failed: {e}", self.name());
                }
                status.recording.store(self.recorder.is_recording(), Ordering::Release);
            }
            Command::StopRecording => {
                if self.recorder.stop() {
                    info!("'{}' recording stopped", self.name());
                }
                status.recording.store(false, Ordering::Release);
            }
        }
    }

    /// Open through the opener, push the requested geometry when an
    /// explicit API is selected, and read the negotiated values back.
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>> {
        let mut source = self
            .opener
            .open(&self.config.id, self.config.api)
            .map_err(|source| {
                error!("open '{}' ({}): {source}", self.name(), self.config.id);
                DeviceError::Open { name: self.name().to_string(), source }
            })?;

        let request = self.config.request;
        if self.config.api.is_explicit() {
            for (property, value) in [
                (Property::Fps, request.fps),
                (Property::FrameHeight, request.height as f64),
                (Property::FrameWidth, request.width as f64),
            ] {
                if let Err(e) = source.set(property, value) {
                    debug!("'{}' ignores requested {property}: {e}", self.name());
                }
            }
        }

        let negotiated = StreamParams {
            width: source.get(Property::FrameWidth).map_or(request.width, |v| v as u32),
            height: source.get(Property::FrameHeight).map_or(request.height, |v| v as u32),
            fps: source.get(Property::Fps).unwrap_or(request.fps),
        };
        self.handle.status.set_negotiated(negotiated);
        info!("Opened '{}' Size: {negotiated}", self.name());
        Ok(source)
    }

    /// Sources may only settle on a size once frames flow, so the
    /// stored parameters follow what is actually delivered.
    fn track_geometry(&self, capture: &Capture) {
        let (width, height) = (capture.frame.width(), capture.frame.height());
        let current = self.handle.status.negotiated();
        if current.is_some_and(|p| p.width == width && p.height == height) {
            return;
        }

        let fps = capture
            .source
            .as_deref()
            .and_then(|s| s.get(Property::Fps))
            .or(current.map(|p| p.fps))
            .unwrap_or(self.config.request.fps);
        let delivered = StreamParams { width, height, fps };
        info!("'{}' delivers {delivered}", self.name());
        self.handle.status.set_negotiated(delivered);
    }

    /// Close the failed handle and try once to open a fresh one; a
    /// failure here just means the next tick fails and retries.
    fn reopen(&mut self, capture: &mut Capture) {
        if let Some(mut old) = capture.source.take() {
            if old.is_opened() {
                old.close();
            }
        }
        match self.open_source() {
            Ok(source) => capture.source = Some(source),
            Err(e) => debug!("reopen failed: {e}"),
        }
    }

    fn shutdown(&mut self, mut capture: Capture) {
        if self.recorder.stop() {
            info!("'{}' recording closed on shutdown", self.name());
        }
        self.handle.status.recording.store(false, Ordering::Release);

        for transform in self.transforms.iter_mut() {
            transform.shutdown();
        }
        self.sink.close();

        if let Some(mut source) = capture.source.take() {
            source.close();
        }
        capture.frame.clear();
        info!("Closed '{}'", self.name());
    }
}
