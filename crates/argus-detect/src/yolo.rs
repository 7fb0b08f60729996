// argus-detect/src/yolo.rs
// ------------------------------------------------------------
// Tract-powered YOLOv8/11 detector (single-class filter optional)
// Output layout: [1, 4 + classes, anchors], boxes as cx,cy,w,h in
// model-input pixels.
// ------------------------------------------------------------
use crate::{non_max_suppression, DetectError, Detection, Detector, Result};
use image::imageops::{resize, FilterType};
use image::RgbImage;
use std::path::Path;
use tract_onnx::prelude::*;

const CONF_THR: f32 = 0.5;
const IOU_THR: f32 = 0.45;

pub struct TractYolo {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_size: u32,
    class_filter: Option<usize>,
}

impl TractYolo {
    /// Load and optimize the ONNX model, preparing it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let s = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec![1, 3, s, s]))?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { model, input_size, class_filter: None })
    }

    /// Only report detections of `class` (0 = person on COCO).
    pub fn only_class(mut self, class: usize) -> Self {
        self.class_filter = Some(class);
        self
    }
}

impl Detector for TractYolo {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let size = self.input_size;
        let resized = resize(image, size, size, FilterType::Triangle);
        let input: Tensor = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, c, y, x)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
        )
        .into();

        let outputs = self.model.run(tvec![input.into()])?;
        let view = outputs[0].to_array_view::<f32>()?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(DetectError::InvalidOutputShape(shape));
        }
        let view = view
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|_| DetectError::InvalidOutputShape(shape.clone()))?;
        let (rows, anchors) = (shape[1], shape[2]);

        // map model-input pixels back onto the source frame
        let sx = image.width() as f32 / size as f32;
        let sy = image.height() as f32 / size as f32;

        let mut dets = Vec::new();
        for a in 0..anchors {
            let (class, score) = (4..rows)
                .map(|r| (r - 4, view[[0, r, a]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
            if score < CONF_THR || self.class_filter.is_some_and(|c| c != class) {
                continue;
            }
            let (cx, cy) = (view[[0, 0, a]], view[[0, 1, a]]);
            let (w, h) = (view[[0, 2, a]], view[[0, 3, a]]);
            dets.push(Detection::new(
                [(cx - w / 2.0) * sx, (cy - h / 2.0) * sy, (cx + w / 2.0) * sx, (cy + h / 2.0) * sy],
                score,
                class,
            ));
        }

        Ok(non_max_suppression(dets, IOU_THR))
    }
}
