// argus-detect/src/boxes.rs
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::cmp::Ordering;

/// A single detection: bounding box [x1,y1,x2,y2] in pixels plus score.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: [f32; 4],
    pub score: f32,
    pub class: usize,
}

impl Detection {
    pub fn new(bbox: [f32; 4], score: f32, class: usize) -> Self {
        Self { bbox, score, class }
    }

    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Greedy NMS: keep the best-scoring box, drop everything overlapping it.
pub fn non_max_suppression(mut dets: Vec<Detection>, iou_thr: f32) -> Vec<Detection> {
    dets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<Detection> = Vec::with_capacity(dets.len());
    'outer: for d in dets {
        for k in &keep {
            if iou(&d.bbox, &k.bbox) > iou_thr {
                continue 'outer;
            }
        }
        keep.push(d);
        if keep.len() >= 300 {
            break;
        }
    }
    keep
}

/// Draw a hollow box per detection, `thickness` pixels wide (inwards).
pub fn draw_detections(image: &mut RgbImage, dets: &[Detection], color: Rgb<u8>, thickness: u32) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    for det in dets {
        let x1 = det.bbox[0].clamp(0.0, w) as i32;
        let y1 = det.bbox[1].clamp(0.0, h) as i32;
        let x2 = det.bbox[2].clamp(0.0, w) as i32;
        let y2 = det.bbox[3].clamp(0.0, h) as i32;

        for t in 0..thickness as i32 {
            let width = x2 - x1 - 2 * t;
            let height = y2 - y1 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(x1 + t, y1 + t).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(image, rect, color);
        }
    }
}
