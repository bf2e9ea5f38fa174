//! Frame preprocessing shared by capture and prediction.
//!
//! Every frame handed to the classifier is resized to a fixed 50x50 RGB
//! square and flattened into a channel-planar `f32` tensor with raw 0..255
//! channel values.

use image::{RgbImage, imageops};

/// Width and height of classifier input frames.
pub const FRAME_DIM: usize = 50;
/// Color channels per pixel.
pub const FRAME_CHANNELS: usize = 3;
/// Flat length of one input tensor.
pub const FRAME_TENSOR_LEN: usize = FRAME_DIM * FRAME_DIM * FRAME_CHANNELS;

/// Resize a captured frame and flatten it into a classifier input tensor.
///
/// Layout is channel-planar: `tensor[c * 50 * 50 + y * 50 + x]`.
pub fn to_input_tensor(frame: &RgbImage) -> Vec<f32> {
    let resized = if frame.width() as usize == FRAME_DIM && frame.height() as usize == FRAME_DIM {
        frame.clone()
    } else {
        imageops::resize(
            frame,
            FRAME_DIM as u32,
            FRAME_DIM as u32,
            imageops::FilterType::Triangle,
        )
    };

    let plane = FRAME_DIM * FRAME_DIM;
    let mut tensor = vec![0.0f32; FRAME_TENSOR_LEN];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * FRAME_DIM + x as usize;
        for c in 0..FRAME_CHANNELS {
            tensor[c * plane + offset] = f32::from(pixel.0[c]);
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn tensor_has_fixed_length_and_planar_layout() {
        let mut frame = RgbImage::new(50, 50);
        frame.put_pixel(0, 0, Rgb([10, 20, 30]));
        let tensor = to_input_tensor(&frame);
        assert_eq!(tensor.len(), FRAME_TENSOR_LEN);
        assert_eq!(tensor[0], 10.0);
        assert_eq!(tensor[FRAME_DIM * FRAME_DIM], 20.0);
        assert_eq!(tensor[2 * FRAME_DIM * FRAME_DIM], 30.0);
    }

    #[test]
    fn larger_frames_are_resized() {
        let frame = RgbImage::from_pixel(160, 120, Rgb([200, 200, 200]));
        let tensor = to_input_tensor(&frame);
        assert_eq!(tensor.len(), FRAME_TENSOR_LEN);
        assert!(tensor.iter().all(|&v| (v - 200.0).abs() < 1.0));
    }
}
