// argus-detect/src/transform.rs
use crate::{draw_detections, Detector};
use argus_camera::Frame;
use image::imageops::flip_horizontal_in_place;
use image::Rgb;
use log::warn;

/// A stateful frame filter in a device's transform chain.
///
/// `apply` runs synchronously inside the device tick, so it must
/// return in bounded time: a slow transform throttles the device.
pub trait Transform: Send {
    fn apply(&mut self, frame: &mut Frame);

    /// Called once per device-loop exit, in chain order.  May run
    /// more than once over the transform's lifetime.
    fn shutdown(&mut self) {}

    fn name(&self) -> &str;
}

/// Leaves the frame untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn apply(&mut self, _frame: &mut Frame) {}

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Horizontal flip, for front-facing webcams.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mirror;

impl Transform for Mirror {
    fn apply(&mut self, frame: &mut Frame) {
        flip_horizontal_in_place(frame.image_mut());
    }

    fn name(&self) -> &str {
        "mirror"
    }
}

/// Runs a [`Detector`] and draws its boxes onto the frame.
pub struct DetectAnnotate<D> {
    detector: D,
    color: Rgb<u8>,
    thickness: u32,
    min_score: f32,
    closed: bool,
}

impl<D: Detector> DetectAnnotate<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            color: Rgb([0, 128, 255]),
            thickness: 2,
            min_score: 0.0,
            closed: false,
        }
    }

    pub fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

impl<D: Detector> Transform for DetectAnnotate<D> {
    fn apply(&mut self, frame: &mut Frame) {
        let dets = match self.detector.detect(frame.image()) {
            Ok(dets) => dets,
            Err(e) => {
                warn!("detector failed: {e}");
                return;
            }
        };
        let min_score = self.min_score;
        let kept: Vec<_> = dets.into_iter().filter(|d| d.score >= min_score).collect();
        draw_detections(frame.image_mut(), &kept, self.color, self.thickness);
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.detector.close();
            self.closed = true;
        }
    }

    fn name(&self) -> &str {
        "detect"
    }
}
