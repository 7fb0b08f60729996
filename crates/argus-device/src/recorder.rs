// argus-device/src/recorder.rs
use crate::{DeviceError, FrameWriter, Result, WriterFactory};
use argus_camera::{Frame, StreamParams};
use chrono::{DateTime, Datelike, Local, Timelike};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// `record_<year>_<month>_<day>_<hour>_<minute>_<second>.<ext>`
pub fn recording_file_name(stamp: &DateTime<Local>, ext: &str) -> String {
    format!(
        "record_{}_{}_{}_{}_{}_{}.{}",
        stamp.year(),
        stamp.month(),
        stamp.day(),
        stamp.hour(),
        stamp.minute(),
        stamp.second(),
        ext
    )
}

struct Session {
    writer: Box<dyn FrameWriter>,
    path: PathBuf,
    /// `None` when the duration runs past what `Instant` can hold.
    deadline: Option<Instant>,
    frames: u64,
}

/// Owns at most one open writer and its auto-stop deadline.
pub struct Recorder {
    dir: PathBuf,
    factory: Box<dyn WriterFactory>,
    session: Option<Session>,
}

impl Recorder {
    pub fn new(dir: impl Into<PathBuf>, factory: Box<dyn WriterFactory>) -> Self {
        Self { dir: dir.into(), factory, session: None }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.deadline)
    }

    pub fn start(&mut self, duration: Duration, params: &StreamParams) -> Result<&Path> {
        self.start_at(Instant::now(), Local::now(), duration, params)
    }

    /// Open a new session, closing any active one first.  On error
    /// the recorder is left idle.
    pub fn start_at(
        &mut self,
        now: Instant,
        stamp: DateTime<Local>,
        duration: Duration,
        params: &StreamParams,
    ) -> Result<&Path> {
        if self.is_recording() {
            info!("already recording, closing previous session");
            self.stop();
        }

        std::fs::create_dir_all(&self.dir)
            .map_err(|source| DeviceError::RecordOutput { path: self.dir.clone(), source })?;
        let path = self.unique_path(&stamp);
        let writer = self.factory.create(&path, params)?;

        let deadline = now.checked_add(duration);
        match deadline {
            Some(_) => info!("recording to {:?} for {:.1}s", path, duration.as_secs_f64()),
            None => warn!("recording to {:?} until stopped: {duration:?} is out of range", path),
        }
        let session = self.session.insert(Session { writer, path, deadline, frames: 0 });
        Ok(session.path.as_path())
    }

    fn unique_path(&self, stamp: &DateTime<Local>) -> PathBuf {
        let ext = self.factory.extension();
        let path = self.dir.join(recording_file_name(stamp, ext));
        if !path.exists() {
            return path;
        }
        let stem = recording_file_name(stamp, "");
        let stem = stem.trim_end_matches('.');
        (1u32..)
            .map(|n| self.dir.join(format!("{stem}_{n}.{ext}")))
            .find(|p| !p.exists())
            .unwrap_or(path)
    }

    /// Append one frame; write errors are logged and the session
    /// keeps going.
    pub fn write(&mut self, frame: &Frame) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.writer.write(frame) {
            Ok(()) => session.frames += 1,
            Err(e) => warn!("write to {:?} failed: {e}", session.path),
        }
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.session.as_ref().and_then(|s| s.deadline).is_some_and(|deadline| now >= deadline)
    }

    /// Close the active session.  Returns `false` if there was none.
    pub fn stop(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        let Session { writer, path, frames, .. } = session;
        match writer.finish() {
            Ok(()) => info!("recorder closed {:?} ({frames} frames)", path),
            Err(e) => error!("stop recording {:?}: {e}", path),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::RgbImage;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        created: Vec<PathBuf>,
        open: usize,
        max_open: usize,
        writes: usize,
        finished: usize,
    }

    struct FakeFactory {
        log: Arc<Mutex<Log>>,
        fail_create: bool,
        fail_write: bool,
        fail_finish: bool,
    }

    struct FakeWriter {
        log: Arc<Mutex<Log>>,
        fail_write: bool,
        fail_finish: bool,
    }

    impl WriterFactory for FakeFactory {
        fn extension(&self) -> &str {
            "mp4"
        }

        fn create(&mut self, path: &Path, _params: &StreamParams) -> Result<Box<dyn FrameWriter>> {
            if self.fail_create {
                return Err(DeviceError::Io(std::io::Error::other("disk full")));
            }
            std::fs::write(path, b"")?;
            let mut log = self.log.lock().unwrap();
            log.created.push(path.to_path_buf());
            log.open += 1;
            log.max_open = log.max_open.max(log.open);
            Ok(Box::new(FakeWriter {
                log: self.log.clone(),
                fail_write: self.fail_write,
                fail_finish: self.fail_finish,
            }))
        }
    }

    impl FrameWriter for FakeWriter {
        fn write(&mut self, _frame: &Frame) -> Result<()> {
            self.log.lock().unwrap().writes += 1;
            if self.fail_write {
                return Err(DeviceError::Io(std::io::Error::other("short write")));
            }
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            log.open -= 1;
            log.finished += 1;
            if self.fail_finish {
                return Err(DeviceError::Io(std::io::Error::other("close failed")));
            }
            Ok(())
        }
    }

    fn recorder(dir: &Path) -> (Recorder, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = FakeFactory { log: log.clone(), fail_create: false, fail_write: false, fail_finish: false };
        (Recorder::new(dir, Box::new(factory)), log)
    }

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).single().unwrap()
    }

    #[test]
    fn file_name_pattern() {
        assert_eq!(recording_file_name(&stamp(), "mp4"), "record_2024_3_5_7_8_9.mp4");
    }

    #[test]
    fn same_second_sessions_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mut rec, log) = recorder(dir.path());
        let now = Instant::now();
        let params = StreamParams::default();

        rec.start_at(now, stamp(), Duration::from_secs(5), &params).unwrap();
        rec.start_at(now, stamp(), Duration::from_secs(5), &params).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.created[0].file_name().unwrap(), "record_2024_3_5_7_8_9.mp4");
        assert_eq!(log.created[1].file_name().unwrap(), "record_2024_3_5_7_8_9_1.mp4");
    }

    #[test]
    fn start_while_recording_closes_previous_writer_first() {
        let dir = tempfile::tempdir().unwrap();
        let (mut rec, log) = recorder(dir.path());
        let params = StreamParams::default();

        rec.start(Duration::from_secs(5), &params).unwrap();
        rec.start(Duration::from_secs(5), &params).unwrap();
        assert!(rec.is_recording());

        let log = log.lock().unwrap();
        assert_eq!(log.created.len(), 2);
        assert_eq!(log.finished, 1);
        assert_eq!(log.max_open, 1);
    }

    #[test]
    fn stop_without_session_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (mut rec, log) = recorder(dir.path());
        assert!(!rec.stop());
        assert!(!rec.is_recording());
        rec.write(&Frame::empty());

        let log = log.lock().unwrap();
        assert!(log.created.is_empty());
        assert_eq!(log.writes, 0);
    }

    #[test]
    fn deadline_is_measured_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let (mut rec, _log) = recorder(dir.path());
        let t0 = Instant::now();
        rec.start_at(t0, stamp(), Duration::from_secs(2), &StreamParams::default()).unwrap();

        assert!(!rec.expired(t0));
        assert!(!rec.expired(t0 + Duration::from_millis(1999)));
        assert!(rec.expired(t0 + Duration::from_secs(2)));
        assert!(rec.expired(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn failed_open_leaves_recorder_idle() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = FakeFactory { log, fail_create: true, fail_write: false, fail_finish: false };
        let mut rec = Recorder::new(dir.path(), Box::new(factory));

        assert!(rec.start(Duration::from_secs(1), &StreamParams::default()).is_err());
        assert!(!rec.is_recording());
    }

    #[test]
    fn close_error_still_clears_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = FakeFactory { log: log.clone(), fail_create: false, fail_write: false, fail_finish: true };
        let mut rec = Recorder::new(dir.path(), Box::new(factory));

        rec.start(Duration::from_secs(1), &StreamParams::default()).unwrap();
        rec.write(&Frame::from_image(RgbImage::new(2, 2)));
        assert!(rec.stop());
        assert!(!rec.is_recording());
        assert!(!rec.stop());
        assert_eq!(log.lock().unwrap().finished, 1);
    }

    #[test]
    fn failed_writes_keep_the_session_open() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Mutex::new(Log::default()));
        let factory = FakeFactory { log: log.clone(), fail_create: false, fail_write: true, fail_finish: false };
        let mut rec = Recorder::new(dir.path(), Box::new(factory));
        let t0 = Instant::now();

        rec.start_at(t0, stamp(), Duration::from_secs(1), &StreamParams::default()).unwrap();
        rec.write(&Frame::from_image(RgbImage::new(2, 2)));
        rec.write(&Frame::from_image(RgbImage::new(2, 2)));
        assert!(rec.is_recording());
        assert!(rec.expired(t0 + Duration::from_secs(1)));
        assert!(rec.stop());

        let log = log.lock().unwrap();
        assert_eq!(log.writes, 2);
        assert_eq!(log.finished, 1);
    }

    #[test]
    fn out_of_range_duration_records_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut rec, log) = recorder(dir.path());
        let t0 = Instant::now();

        rec.start_at(t0, stamp(), Duration::MAX, &StreamParams::default()).unwrap();
        assert!(rec.is_recording());
        assert_eq!(rec.deadline(), None);
        assert!(!rec.expired(t0 + Duration::from_secs(86_400 * 365)));

        assert!(rec.stop());
        assert_eq!(log.lock().unwrap().finished, 1);
    }
}
