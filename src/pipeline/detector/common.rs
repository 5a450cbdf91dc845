use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Landmark, POSE_LANDMARK_COUNT};

pub const INPUT_SIZE: u32 = 256;

// The landmarker emits x, y, z in input pixels plus visibility and presence
// logits per landmark.
pub const VALUES_PER_LANDMARK: usize = 5;

#[derive(Clone, Debug)]
pub struct PoseDetection {
    pub landmarks: Vec<Landmark>,
    pub projected: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl LetterboxInfo {
    /// Map a model-input coordinate back onto the source frame, clamped to
    /// its bounds.
    pub fn to_frame_px(&self, x: f32, y: f32) -> (f32, f32) {
        let px = (x - self.pad_x) / self.scale;
        let py = (y - self.pad_y) / self.scale;
        (
            px.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            py.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
        )
    }
}

pub fn prepare_frame(frame: &Frame) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let scale = INPUT_SIZE as f32 / (frame.width.max(frame.height) as f32);
    let new_w = (frame.width as f32 * scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((INPUT_SIZE as i64 - new_w as i64) / 2).max(0) as usize;
    let pad_y = ((INPUT_SIZE as i64 - new_h as i64) / 2).max(0) as usize;
    let mut canvas = vec![0u8; (INPUT_SIZE as usize) * (INPUT_SIZE as usize) * 4];
    for px in canvas.chunks_mut(4) {
        px[3] = 255;
    }
    let dst_stride = INPUT_SIZE as usize * 4;
    let src_stride = new_w as usize * 4;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 4;
        let src_offset = row * src_stride;
        let dst_slice = &mut canvas[dst_offset..dst_offset + src_stride];
        let src_slice = &resized[src_offset..src_offset + src_stride];
        dst_slice.copy_from_slice(src_slice);
    }

    let normalized: Vec<f32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();
    let input = Array4::<f32>::from_shape_vec(
        (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

pub fn decode_raw_landmarks(flat: &[f32]) -> Result<Vec<[f32; VALUES_PER_LANDMARK]>> {
    if flat.len() < POSE_LANDMARK_COUNT * VALUES_PER_LANDMARK {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            POSE_LANDMARK_COUNT * VALUES_PER_LANDMARK
        ));
    }

    let mut landmarks = Vec::with_capacity(POSE_LANDMARK_COUNT);
    for chunk in flat
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(POSE_LANDMARK_COUNT)
    {
        landmarks.push([chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]]);
    }
    Ok(landmarks)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn letterbox_projection_undoes_scale_and_padding() {
        let letterbox = LetterboxInfo {
            scale: 0.2,
            pad_x: 0.0,
            pad_y: 56.0,
            orig_w: 1280,
            orig_h: 720,
        };

        let (px, py) = letterbox.to_frame_px(128.0, 128.0);
        assert!((px - 640.0).abs() < 1e-3);
        assert!((py - 360.0).abs() < 1e-3);

        // Out-of-frame coordinates clamp instead of escaping the buffer.
        let (cx, cy) = letterbox.to_frame_px(10_000.0, -10_000.0);
        assert_eq!(cx, 1279.0);
        assert_eq!(cy, 0.0);
    }

    #[test]
    fn decode_rejects_short_output() {
        let flat = vec![0.0; POSE_LANDMARK_COUNT * VALUES_PER_LANDMARK - 1];
        assert!(decode_raw_landmarks(&flat).is_err());
    }

    #[test]
    fn decode_keeps_landmark_order() {
        let mut flat = Vec::new();
        for i in 0..POSE_LANDMARK_COUNT {
            flat.extend_from_slice(&[i as f32, 0.0, 0.0, 0.0, 0.0]);
        }

        let decoded = decode_raw_landmarks(&flat).unwrap();
        assert_eq!(decoded.len(), POSE_LANDMARK_COUNT);
        assert_eq!(decoded[32][0], 32.0);
    }

    #[test]
    fn prepare_frame_letterboxes_landscape_input() {
        let frame = Frame {
            rgba: vec![255u8; 64 * 32 * 4],
            width: 64,
            height: 32,
            timestamp: Instant::now(),
        };

        let (input, letterbox) = prepare_frame(&frame).unwrap();
        assert_eq!(
            input.shape(),
            &[1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3]
        );
        assert_eq!(letterbox.pad_x, 0.0);
        assert!(letterbox.pad_y > 0.0);

        // Letterbox bands stay black, the image area is white.
        let pad = letterbox.pad_y as usize;
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_eq!(input[[0, pad + 1, 0, 0]], 1.0);
    }
}
