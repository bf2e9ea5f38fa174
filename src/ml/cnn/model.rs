use serde::{Deserialize, Serialize};

use crate::frame::{FRAME_CHANNELS, FRAME_DIM, FRAME_TENSOR_LEN};

/// Output classes of the posture model.
pub const N_CLASSES: usize = 2;

pub(crate) const CONV1_FILTERS: usize = 24;
pub(crate) const CONV1_KERNEL: usize = 3;
pub(crate) const CONV2_FILTERS: usize = 8;
pub(crate) const CONV2_KERNEL: usize = 5;

pub(crate) const CONV1_OUT_DIM: usize = FRAME_DIM - CONV1_KERNEL + 1;
pub(crate) const POOL1_OUT_DIM: usize = CONV1_OUT_DIM / 2;
pub(crate) const CONV2_OUT_DIM: usize = POOL1_OUT_DIM - CONV2_KERNEL + 1;
pub(crate) const POOL2_OUT_DIM: usize = CONV2_OUT_DIM / 2;

/// Flat length of the pooled activations fed to the output layer.
pub const FLATTEN_LEN: usize = CONV2_FILTERS * POOL2_OUT_DIM * POOL2_OUT_DIM;

pub(crate) const CONV1_WEIGHTS_LEN: usize =
    CONV1_FILTERS * FRAME_CHANNELS * CONV1_KERNEL * CONV1_KERNEL;
pub(crate) const CONV2_WEIGHTS_LEN: usize =
    CONV2_FILTERS * CONV1_FILTERS * CONV2_KERNEL * CONV2_KERNEL;

/// Trained convolutional classifier over 50x50 RGB frame tensors.
///
/// Two valid-padding convolution + 2x2 max-pool stages feed a flatten and a
/// two-way softmax output. Weight layouts are flat and row-major:
/// convolutions as `[filter][in_channel][ky][kx]`, the output layer as
/// `[class][feature]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CnnModel {
    pub model_version: i64,
    pub classes: Vec<String>,
    pub conv1_weights: Vec<f32>,
    pub conv1_bias: Vec<f32>,
    pub conv2_weights: Vec<f32>,
    pub conv2_bias: Vec<f32>,
    pub dense_weights: Vec<f32>,
    pub dense_bias: Vec<f32>,
}

impl CnnModel {
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.len() != N_CLASSES {
            return Err(format!(
                "Unsupported class count {} (expected {N_CLASSES})",
                self.classes.len()
            ));
        }
        if self.conv1_weights.len() != CONV1_WEIGHTS_LEN {
            return Err("conv1_weights length mismatch".to_string());
        }
        if self.conv1_bias.len() != CONV1_FILTERS {
            return Err("conv1_bias length mismatch".to_string());
        }
        if self.conv2_weights.len() != CONV2_WEIGHTS_LEN {
            return Err("conv2_weights length mismatch".to_string());
        }
        if self.conv2_bias.len() != CONV2_FILTERS {
            return Err("conv2_bias length mismatch".to_string());
        }
        if self.dense_weights.len() != N_CLASSES * FLATTEN_LEN {
            return Err("dense_weights length mismatch".to_string());
        }
        if self.dense_bias.len() != N_CLASSES {
            return Err("dense_bias length mismatch".to_string());
        }
        Ok(())
    }

    /// Class probabilities for one input tensor, or empty on a length mismatch.
    pub fn predict_proba(&self, input: &[f32]) -> Vec<f32> {
        if input.len() != FRAME_TENSOR_LEN {
            return Vec::new();
        }
        let mut scratch = ForwardScratch::new();
        self.forward(input, &mut scratch);
        softmax(&scratch.logits)
    }

    /// Index of the highest-scoring class; ties resolve to the lowest index.
    pub fn predict_class_index(&self, input: &[f32]) -> usize {
        let proba = self.predict_proba(input);
        let mut best = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (idx, &p) in proba.iter().enumerate() {
            if p > best_val {
                best_val = p;
                best = idx;
            }
        }
        best
    }

    /// Run the network up to the logits, keeping every intermediate needed
    /// for backpropagation in `scratch`.
    pub(crate) fn forward(&self, input: &[f32], scratch: &mut ForwardScratch) {
        conv_valid(
            input,
            FRAME_CHANNELS,
            FRAME_DIM,
            &self.conv1_weights,
            &self.conv1_bias,
            CONV1_FILTERS,
            CONV1_KERNEL,
            &mut scratch.conv1_pre,
        );
        max_pool2_relu(
            &scratch.conv1_pre,
            CONV1_FILTERS,
            CONV1_OUT_DIM,
            &mut scratch.pool1_out,
            &mut scratch.pool1_src,
        );
        conv_valid(
            &scratch.pool1_out,
            CONV1_FILTERS,
            POOL1_OUT_DIM,
            &self.conv2_weights,
            &self.conv2_bias,
            CONV2_FILTERS,
            CONV2_KERNEL,
            &mut scratch.conv2_pre,
        );
        max_pool2_relu(
            &scratch.conv2_pre,
            CONV2_FILTERS,
            CONV2_OUT_DIM,
            &mut scratch.pool2_out,
            &mut scratch.pool2_src,
        );
        for class in 0..N_CLASSES {
            let mut sum = self.dense_bias[class];
            let base = class * FLATTEN_LEN;
            for i in 0..FLATTEN_LEN {
                sum += self.dense_weights[base + i] * scratch.pool2_out[i];
            }
            scratch.logits[class] = sum;
        }
    }
}

/// Reusable per-sample activation buffers.
pub(crate) struct ForwardScratch {
    pub conv1_pre: Vec<f32>,
    pub pool1_out: Vec<f32>,
    pub pool1_src: Vec<usize>,
    pub conv2_pre: Vec<f32>,
    pub pool2_out: Vec<f32>,
    pub pool2_src: Vec<usize>,
    pub logits: Vec<f32>,
}

impl ForwardScratch {
    pub(crate) fn new() -> Self {
        Self {
            conv1_pre: vec![0.0; CONV1_FILTERS * CONV1_OUT_DIM * CONV1_OUT_DIM],
            pool1_out: vec![0.0; CONV1_FILTERS * POOL1_OUT_DIM * POOL1_OUT_DIM],
            pool1_src: vec![0; CONV1_FILTERS * POOL1_OUT_DIM * POOL1_OUT_DIM],
            conv2_pre: vec![0.0; CONV2_FILTERS * CONV2_OUT_DIM * CONV2_OUT_DIM],
            pool2_out: vec![0.0; FLATTEN_LEN],
            pool2_src: vec![0; FLATTEN_LEN],
            logits: vec![0.0; N_CLASSES],
        }
    }
}

/// Valid-padding convolution over channel-planar input.
fn conv_valid(
    input: &[f32],
    in_channels: usize,
    in_dim: usize,
    weights: &[f32],
    bias: &[f32],
    filters: usize,
    kernel: usize,
    out: &mut [f32],
) {
    let out_dim = in_dim - kernel + 1;
    let in_plane = in_dim * in_dim;
    for f in 0..filters {
        let out_base = f * out_dim * out_dim;
        for oy in 0..out_dim {
            for ox in 0..out_dim {
                let mut sum = bias[f];
                for c in 0..in_channels {
                    let w_base = ((f * in_channels + c) * kernel) * kernel;
                    let in_base = c * in_plane;
                    for ky in 0..kernel {
                        let row = in_base + (oy + ky) * in_dim + ox;
                        let w_row = w_base + ky * kernel;
                        for kx in 0..kernel {
                            sum += weights[w_row + kx] * input[row + kx];
                        }
                    }
                }
                out[out_base + oy * out_dim + ox] = sum;
            }
        }
    }
}

/// 2x2 max pooling over ReLU-activated values, recording for each pooled
/// cell the flat index of the winning pre-activation (ties pick the first).
fn max_pool2_relu(
    pre: &[f32],
    channels: usize,
    in_dim: usize,
    out: &mut [f32],
    src: &mut [usize],
) {
    let out_dim = in_dim / 2;
    let in_plane = in_dim * in_dim;
    for c in 0..channels {
        let in_base = c * in_plane;
        let out_base = c * out_dim * out_dim;
        for oy in 0..out_dim {
            for ox in 0..out_dim {
                let mut best_val = f32::NEG_INFINITY;
                let mut best_idx = 0usize;
                for dy in 0..2 {
                    for dx in 0..2 {
                        let idx = in_base + (oy * 2 + dy) * in_dim + (ox * 2 + dx);
                        let v = pre[idx].max(0.0);
                        if v > best_val {
                            best_val = v;
                            best_idx = idx;
                        }
                    }
                }
                out[out_base + oy * out_dim + ox] = best_val;
                src[out_base + oy * out_dim + ox] = best_idx;
            }
        }
    }
}

/// Numerically stable softmax; a zero-sum input yields a uniform output.
pub(crate) fn softmax(raw: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f32; raw.len()];
    softmax_inplace(raw, &mut out);
    out
}

pub(crate) fn softmax_inplace(raw: &[f32], out: &mut [f32]) {
    if raw.is_empty() || out.is_empty() {
        return;
    }
    let max = raw
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |a, b| a.max(b));
    let mut sum = 0.0f32;
    for (i, &v) in raw.iter().enumerate() {
        let e = (v - max).exp();
        out[i] = e;
        sum += e;
    }
    if sum == 0.0 {
        let uniform = 1.0 / (raw.len() as f32);
        for v in out.iter_mut() {
            *v = uniform;
        }
        return;
    }
    for v in out.iter_mut() {
        *v /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_model() -> CnnModel {
        CnnModel {
            model_version: 1,
            classes: vec!["upright".into(), "slouched".into()],
            conv1_weights: vec![0.0; CONV1_WEIGHTS_LEN],
            conv1_bias: vec![0.0; CONV1_FILTERS],
            conv2_weights: vec![0.0; CONV2_WEIGHTS_LEN],
            conv2_bias: vec![0.0; CONV2_FILTERS],
            dense_weights: vec![0.0; N_CLASSES * FLATTEN_LEN],
            dense_bias: vec![0.0; N_CLASSES],
        }
    }

    #[test]
    fn architecture_dimensions_line_up() {
        assert_eq!(CONV1_OUT_DIM, 48);
        assert_eq!(POOL1_OUT_DIM, 24);
        assert_eq!(CONV2_OUT_DIM, 20);
        assert_eq!(POOL2_OUT_DIM, 10);
        assert_eq!(FLATTEN_LEN, 800);
    }

    #[test]
    fn validate_flags_buffer_mismatches() {
        let mut model = zeroed_model();
        assert!(model.validate().is_ok());
        model.dense_bias.pop();
        assert!(model.validate().is_err());
    }

    #[test]
    fn softmax_output_sums_to_one() {
        let model = zeroed_model();
        let out = model.predict_proba(&vec![0.0; FRAME_TENSOR_LEN]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_input_length_yields_empty_scores() {
        let model = zeroed_model();
        assert!(model.predict_proba(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn tied_scores_pick_the_lowest_index() {
        let model = zeroed_model();
        assert_eq!(model.predict_class_index(&vec![7.0; FRAME_TENSOR_LEN]), 0);
    }

    #[test]
    fn bias_alone_shifts_the_argmax() {
        let mut model = zeroed_model();
        model.dense_bias[1] = 1.0;
        assert_eq!(model.predict_class_index(&vec![0.0; FRAME_TENSOR_LEN]), 1);
    }
}
