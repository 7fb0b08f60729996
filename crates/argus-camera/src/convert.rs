// argus-camera/src/convert.rs
use crate::{CameraError, Frame, Result};
use image::RgbImage;

/// Naive NV12 4:2:0 → RGB24 conversion (BT.601, full range).
///
/// `y` holds `w*h` luma bytes, `uv` the interleaved chroma plane at
/// half resolution in both directions.  `out` must be `w*h*3` long.
pub fn nv12_to_rgb(y: &[u8], uv: &[u8], w: usize, h: usize, out: &mut [u8]) {
    for j in 0..h {
        for i in 0..w {
            let y_val = y[j * w + i] as f32;
            let uv_idx = (j / 2) * w + (i & !1);
            let u = uv[uv_idx] as f32 - 128.0;
            let v = uv[uv_idx + 1] as f32 - 128.0;

            let r = (y_val + 1.402 * v).clamp(0.0, 255.0);
            let g = (y_val - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
            let b = (y_val + 1.772 * u).clamp(0.0, 255.0);

            let base = (j * w + i) * 3;
            out[base] = r as u8;
            out[base + 1] = g as u8;
            out[base + 2] = b as u8;
        }
    }
}

/// Convert a tightly packed NV12 buffer into an [`RgbImage`].
/// Returns `None` when the buffer is too short for `w`x`h`.
pub fn nv12_to_image(nv12: &[u8], w: u32, h: u32) -> Option<RgbImage> {
    let (wu, hu) = (w as usize, h as usize);
    let luma = wu * hu;
    if wu == 0 || hu == 0 || wu % 2 != 0 || nv12.len() < luma + luma / 2 {
        return None;
    }
    let (y_plane, uv_plane) = nv12.split_at(luma);
    let mut rgb = vec![0u8; luma * 3];
    nv12_to_rgb(y_plane, uv_plane, wu, hu, &mut rgb);
    RgbImage::from_raw(w, h, rgb)
}

/// Decode one NV12 sample into `frame`.  A buffer that cannot hold
/// `w`x`h` is a read error and leaves `frame` as it was.
pub fn nv12_into_frame(nv12: &[u8], w: u32, h: u32, frame: &mut Frame) -> Result<()> {
    let rgb = nv12_to_image(nv12, w, h).ok_or_else(|| {
        CameraError::Read(format!("NV12 sample of {} bytes does not fit {w}x{h}", nv12.len()))
    })?;
    frame.replace(rgb);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_is_grey() {
        // Fake 8×4 NV12: Y = 255 (white), UV = 128 (no colour)
        let (w, h) = (8u32, 4u32);
        let mut bytes = vec![128u8; (w * h * 3 / 2) as usize];
        bytes[..(w * h) as usize].fill(255);

        let img = nv12_to_image(&bytes, w, h).unwrap();
        assert_eq!(img.dimensions(), (8, 4));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(nv12_to_image(&[0u8; 10], 8, 4).is_none());
        assert!(nv12_to_image(&[], 0, 0).is_none());
    }

    #[test]
    fn short_sample_is_a_read_error() {
        let mut frame = Frame::from_image(RgbImage::new(2, 2));
        let err = nv12_into_frame(&[0u8; 10], 8, 4, &mut frame).unwrap_err();
        assert!(matches!(err, CameraError::Read(_)), "{err}");
        assert_eq!((frame.width(), frame.height()), (2, 2));

        nv12_into_frame(&[128u8; 48], 8, 4, &mut frame).unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 4));
    }
}
