// argus-camera/src/gst_source.rs
// ------------------------------------------------------------
// GStreamer capture: <src> → videoconvert → NV12 caps → appsink
// Samples are pulled synchronously and converted to RGB on the
// device thread.
// ------------------------------------------------------------
use crate::{nv12_into_frame, CameraError, Frame, FrameSource, Property, Result, StreamParams};
use gst::prelude::*;
use log::debug;

// a sensor that produces nothing for this long counts as a failed read
const PULL_TIMEOUT_SECS: u64 = 5;

/// Source handle – owns the pipeline and *appsink*.
pub struct GstSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    src: gst::Element,
    caps: gst::Element,
    request: StreamParams,
    negotiated: Option<StreamParams>,
    playing: bool,
}

impl GstSource {
    /// Open `/dev/video<index>` through v4l2src.
    pub fn open_v4l2(index: u32) -> Result<Self> {
        Self::launch(&format!("v4l2src name=src device=/dev/video{index}"))
    }

    /// Open any URI GStreamer can decode (rtsp://, file://, ...).
    pub fn open_uri(uri: &str) -> Result<Self> {
        Self::launch(&format!("uridecodebin name=src uri={uri}"))
    }

    fn launch(src: &str) -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;

        let pipe_str = format!(
            "{src} ! videoconvert ! capsfilter name=caps caps=video/x-raw,format=NV12 \
            ! queue leaky=2 max-size-buffers=8 ! appsink name=sink sync=false max-buffers=1 drop=true"
        );

        let pipeline = gst::parse::launch(&pipe_str)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::MissingElement("pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(CameraError::MissingElement("sink"))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::MissingElement("appsink"))?;
        let src = pipeline.by_name("src").ok_or(CameraError::MissingElement("src"))?;
        let caps = pipeline.by_name("caps").ok_or(CameraError::MissingElement("caps"))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(CameraError::StateChange)?;

        Ok(Self {
            pipeline,
            appsink,
            src,
            caps,
            request: StreamParams::default(),
            negotiated: None,
            playing: true,
        })
    }

    /// Push the requested geometry into the capsfilter; the pipeline
    /// renegotiates on the next buffer if the device can comply.
    fn apply_request(&self) {
        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "NV12")
            .field("width", self.request.width as i32)
            .field("height", self.request.height as i32)
            .field("framerate", gst::Fraction::approximate_f64(self.request.fps).unwrap_or(gst::Fraction::new(20, 1)))
            .build();
        self.caps.set_property("caps", &caps);
    }

    fn sample_to_frame(&mut self, sample: gst::Sample, frame: &mut Frame) -> Result<()> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::Read("sample has no buffer".into()))?;
        let caps = sample.caps().ok_or_else(|| CameraError::Read("sample has no caps".into()))?;
        let params = self.caps_params(caps)?;
        self.negotiated = Some(params);

        let map = buffer.map_readable().map_err(|e| CameraError::Read(e.to_string()))?;
        nv12_into_frame(map.as_slice(), params.width, params.height, frame)
    }

    fn caps_params(&self, caps: &gst::CapsRef) -> Result<StreamParams> {
        let s = caps.structure(0).ok_or_else(|| CameraError::Read("caps missing struct".into()))?;
        let width = s.get::<i32>("width").map_err(|e| CameraError::Read(e.to_string()))? as u32;
        let height = s.get::<i32>("height").map_err(|e| CameraError::Read(e.to_string()))? as u32;
        let fps = s
            .get::<gst::Fraction>("framerate")
            .ok()
            .filter(|f| f.denom() != 0)
            .map(|f| f.numer() as f64 / f.denom() as f64)
            .unwrap_or(self.request.fps);
        Ok(StreamParams { width, height, fps })
    }

    /// What the appsink settled on: the last sample's caps, else the
    /// pad's current caps once the pipeline has negotiated.
    fn settled(&self) -> Option<StreamParams> {
        self.negotiated.or_else(|| {
            let caps = self.appsink.static_pad("sink")?.current_caps()?;
            self.caps_params(&caps).ok()
        })
    }

    fn colour_property(property: Property) -> Option<&'static str> {
        match property {
            Property::Brightness => Some("brightness"),
            Property::Contrast => Some("contrast"),
            Property::Saturation => Some("saturation"),
            Property::Hue => Some("hue"),
            _ => None,
        }
    }
}

impl FrameSource for GstSource {
    fn read(&mut self, frame: &mut Frame) -> Result<()> {
        if !self.playing {
            return Err(CameraError::NotOpen);
        }
        match self.appsink.try_pull_sample(gst::ClockTime::from_seconds(PULL_TIMEOUT_SECS)) {
            Some(sample) => self.sample_to_frame(sample, frame),
            None if self.appsink.is_eos() => Err(CameraError::EndOfStream),
            None => Err(CameraError::Read("timed out waiting for sample".into())),
        }
    }

    fn get(&self, property: Property) -> Option<f64> {
        match property {
            Property::FrameWidth => self.settled().map(|p| p.width as f64),
            Property::FrameHeight => self.settled().map(|p| p.height as f64),
            Property::Fps => self.settled().map(|p| p.fps),
            other => {
                let name = Self::colour_property(other)?;
                self.src.find_property(name)?;
                Some(self.src.property::<i32>(name) as f64)
            }
        }
    }

    fn set(&mut self, property: Property, value: f64) -> Result<()> {
        match property {
            Property::FrameWidth => self.request.width = value.max(0.0) as u32,
            Property::FrameHeight => self.request.height = value.max(0.0) as u32,
            Property::Fps => self.request.fps = value,
            other => {
                let name = Self::colour_property(other)
                    .filter(|name| self.src.find_property(name).is_some())
                    .ok_or(CameraError::UnsupportedProperty(other))?;
                self.src.set_property(name, value as i32);
                return Ok(());
            }
        }
        debug!("requesting {}", self.request);
        self.apply_request();
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.playing
    }

    fn close(&mut self) {
        if self.playing {
            let _ = self.pipeline.set_state(gst::State::Null);
            self.playing = false;
        }
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.close();
    }
}
