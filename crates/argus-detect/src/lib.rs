// argus-detect/src/lib.rs
// ============================================================
// argus-detect  –  Frame transform stage for the argus daemon
// Every transform gets exclusive mutable access to the frame of
// the current tick and may draw on it in place.
// ------------------------------------------------------------
// Pipeline: Frame → [Transform; N] → (annotated) Frame
// ------------------------------------------------------------
// Public API
//   * Transform::apply(frame)     – mutate one frame in place
//   * Transform::shutdown()       – idempotent close hook
//   * Detector::detect(image)     – returns Vec<Detection>
//   * DetectAnnotate<D>           – detector + box drawing
// ------------------------------------------------------------
//   Build notes
//     * `--features tract` adds TractYolo (pure-Rust ONNX).
// ============================================================

//! argus – transform layer
//!
//! The chain is an ordered `Vec<Box<dyn Transform>>` fixed for the
//! lifetime of a device.  Transforms compose through the shared
//! frame: whatever one draws is what the next one sees.  Detection
//! backends plug in through the [`Detector`] trait; the outer API is
//! identical whichever engine runs underneath.

use thiserror::Error;

mod boxes;
mod transform;

#[cfg(feature = "tract")]
mod yolo;

pub use boxes::{draw_detections, iou, non_max_suppression, Detection};
pub use transform::{DetectAnnotate, Mirror, Passthrough, Transform};

#[cfg(feature = "tract")]
pub use yolo::TractYolo;

#[derive(Debug, Error)]
pub enum DetectError {
    #[cfg(feature = "tract")]
    #[error("Model load or inference error: {0}")]
    Tract(#[from] tract_onnx::prelude::TractError),
    #[error("Invalid output shape: expected [1, 4 + classes, anchors], got {0:?}")]
    InvalidOutputShape(Vec<usize>),
    #[error("Detector failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, DetectError>;

/// Trait for object detectors.
pub trait Detector: Send {
    /// Detections in pixel coordinates of `image`.
    fn detect(&mut self, image: &image::RgbImage) -> Result<Vec<Detection>>;

    /// Release backend resources.
    fn close(&mut self) {}
}
