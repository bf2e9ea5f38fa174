use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};

use crate::frame::FRAME_TENSOR_LEN;
use crate::ml::metrics::{self, ConfusionMatrix};
use crate::ml::TrainDataset;

use super::model::{
    CONV1_FILTERS, CONV1_KERNEL, CONV1_OUT_DIM, CONV1_WEIGHTS_LEN, CONV2_FILTERS, CONV2_KERNEL,
    CONV2_OUT_DIM, CONV2_WEIGHTS_LEN, CnnModel, FLATTEN_LEN, ForwardScratch, N_CLASSES,
    POOL1_OUT_DIM, softmax_inplace,
};
use crate::frame::{FRAME_CHANNELS, FRAME_DIM};

/// Trainer tunables.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 15,
            learning_rate: 0.00001,
            seed: 42,
        }
    }
}

/// Progress events emitted during one training run.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainEvent {
    /// Emitted once before the first epoch.
    Began,
    /// Emitted after each epoch with the accuracy measured over that pass.
    EpochEnd { epoch: usize, accuracy: f32 },
}

/// Train a fresh classifier over the full dataset.
///
/// The paired (input, label) sequences are co-shuffled with one consistent
/// permutation up front. Each epoch runs the whole set as a single batch:
/// gradients are averaged over every sample and applied in one SGD step.
pub fn train_cnn(
    dataset: &TrainDataset,
    options: &TrainOptions,
    mut on_event: impl FnMut(TrainEvent),
) -> Result<CnnModel, String> {
    if dataset.x.len() != dataset.y.len() {
        return Err("Mismatched X/Y lengths".to_string());
    }
    if dataset.x.is_empty() {
        return Err("Empty dataset".to_string());
    }
    if dataset.classes.len() != N_CLASSES {
        return Err(format!(
            "Need exactly {N_CLASSES} classes, got {}",
            dataset.classes.len()
        ));
    }
    for (idx, row) in dataset.x.iter().enumerate() {
        if row.len() != FRAME_TENSOR_LEN {
            return Err(format!(
                "Sample {idx} has wrong length: expected {FRAME_TENSOR_LEN}, got {}",
                row.len()
            ));
        }
    }
    if let Some(&bad) = dataset.y.iter().find(|&&y| y >= N_CLASSES) {
        return Err(format!("Label {bad} out of range for {N_CLASSES} classes"));
    }

    let n = dataset.x.len();
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut model = init_model(&mut rng, dataset.classes.clone());

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    let targets = one_hot(&dataset.y);

    let mut scratch = ForwardScratch::new();
    let mut grads = Gradients::new();
    let mut probs = vec![0.0f32; N_CLASSES];
    let mut d_flat = vec![0.0f32; FLATTEN_LEN];
    let mut d_conv2_pre = vec![0.0f32; CONV2_FILTERS * CONV2_OUT_DIM * CONV2_OUT_DIM];
    let mut d_pool1 = vec![0.0f32; CONV1_FILTERS * POOL1_OUT_DIM * POOL1_OUT_DIM];
    let mut d_conv1_pre = vec![0.0f32; CONV1_FILTERS * CONV1_OUT_DIM * CONV1_OUT_DIM];

    on_event(TrainEvent::Began);
    for epoch in 0..options.epochs {
        grads.zero();
        let mut cm = ConfusionMatrix::new(N_CLASSES);
        for &idx in &indices {
            let input = &dataset.x[idx];
            model.forward(input, &mut scratch);
            softmax_inplace(&scratch.logits, &mut probs);
            cm.add(dataset.y[idx], argmax(&probs));

            let target = &targets[idx];
            let mut dlogits = [0.0f32; N_CLASSES];
            for class in 0..N_CLASSES {
                dlogits[class] = probs[class] - target[class];
            }

            // Output layer.
            for class in 0..N_CLASSES {
                let g = dlogits[class];
                grads.dense_bias[class] += g;
                let base = class * FLATTEN_LEN;
                for i in 0..FLATTEN_LEN {
                    grads.dense_weights[base + i] += g * scratch.pool2_out[i];
                }
            }
            for i in 0..FLATTEN_LEN {
                let mut sum = 0.0f32;
                for class in 0..N_CLASSES {
                    sum += dlogits[class] * model.dense_weights[class * FLATTEN_LEN + i];
                }
                d_flat[i] = sum;
            }

            // Unpool through the second stage, gating on the ReLU.
            d_conv2_pre.fill(0.0);
            for i in 0..FLATTEN_LEN {
                let src = scratch.pool2_src[i];
                if scratch.conv2_pre[src] > 0.0 {
                    d_conv2_pre[src] += d_flat[i];
                }
            }
            d_pool1.fill(0.0);
            conv_backward(
                &d_conv2_pre,
                &scratch.pool1_out,
                &model.conv2_weights,
                CONV1_FILTERS,
                POOL1_OUT_DIM,
                CONV2_FILTERS,
                CONV2_KERNEL,
                &mut grads.conv2_weights,
                &mut grads.conv2_bias,
                Some(&mut d_pool1),
            );

            // Unpool through the first stage.
            d_conv1_pre.fill(0.0);
            for i in 0..d_pool1.len() {
                let src = scratch.pool1_src[i];
                if scratch.conv1_pre[src] > 0.0 {
                    d_conv1_pre[src] += d_pool1[i];
                }
            }
            conv_backward(
                &d_conv1_pre,
                input,
                &model.conv1_weights,
                FRAME_CHANNELS,
                FRAME_DIM,
                CONV1_FILTERS,
                CONV1_KERNEL,
                &mut grads.conv1_weights,
                &mut grads.conv1_bias,
                None,
            );
        }

        let scale = options.learning_rate / n as f32;
        grads.apply(&mut model, scale);
        on_event(TrainEvent::EpochEnd {
            epoch,
            accuracy: metrics::accuracy(&cm),
        });
    }

    Ok(model)
}

fn init_model(rng: &mut StdRng, classes: Vec<String>) -> CnnModel {
    let mut conv1_weights = vec![0.0f32; CONV1_WEIGHTS_LEN];
    let mut conv2_weights = vec![0.0f32; CONV2_WEIGHTS_LEN];
    let mut dense_weights = vec![0.0f32; N_CLASSES * FLATTEN_LEN];
    for w in &mut conv1_weights {
        *w = (rng.random::<f32>() - 0.5) * 0.1;
    }
    for w in &mut conv2_weights {
        *w = (rng.random::<f32>() - 0.5) * 0.1;
    }
    for w in &mut dense_weights {
        *w = (rng.random::<f32>() - 0.5) * 0.1;
    }
    CnnModel {
        model_version: 1,
        classes,
        conv1_weights,
        conv1_bias: vec![0.0; CONV1_FILTERS],
        conv2_weights,
        conv2_bias: vec![0.0; CONV2_FILTERS],
        dense_weights,
        dense_bias: vec![0.0; N_CLASSES],
    }
}

fn one_hot(labels: &[usize]) -> Vec<[f32; N_CLASSES]> {
    labels
        .iter()
        .map(|&y| {
            let mut row = [0.0f32; N_CLASSES];
            row[y] = 1.0;
            row
        })
        .collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in values.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = idx;
        }
    }
    best
}

/// Accumulated gradients matching the model's buffers.
struct Gradients {
    conv1_weights: Vec<f32>,
    conv1_bias: Vec<f32>,
    conv2_weights: Vec<f32>,
    conv2_bias: Vec<f32>,
    dense_weights: Vec<f32>,
    dense_bias: Vec<f32>,
}

impl Gradients {
    fn new() -> Self {
        Self {
            conv1_weights: vec![0.0; CONV1_WEIGHTS_LEN],
            conv1_bias: vec![0.0; CONV1_FILTERS],
            conv2_weights: vec![0.0; CONV2_WEIGHTS_LEN],
            conv2_bias: vec![0.0; CONV2_FILTERS],
            dense_weights: vec![0.0; N_CLASSES * FLATTEN_LEN],
            dense_bias: vec![0.0; N_CLASSES],
        }
    }

    fn zero(&mut self) {
        self.conv1_weights.fill(0.0);
        self.conv1_bias.fill(0.0);
        self.conv2_weights.fill(0.0);
        self.conv2_bias.fill(0.0);
        self.dense_weights.fill(0.0);
        self.dense_bias.fill(0.0);
    }

    fn apply(&self, model: &mut CnnModel, scale: f32) {
        for (w, d) in model.conv1_weights.iter_mut().zip(&self.conv1_weights) {
            *w -= scale * d;
        }
        for (b, d) in model.conv1_bias.iter_mut().zip(&self.conv1_bias) {
            *b -= scale * d;
        }
        for (w, d) in model.conv2_weights.iter_mut().zip(&self.conv2_weights) {
            *w -= scale * d;
        }
        for (b, d) in model.conv2_bias.iter_mut().zip(&self.conv2_bias) {
            *b -= scale * d;
        }
        for (w, d) in model.dense_weights.iter_mut().zip(&self.dense_weights) {
            *w -= scale * d;
        }
        for (b, d) in model.dense_bias.iter_mut().zip(&self.dense_bias) {
            *b -= scale * d;
        }
    }
}

/// Backpropagate through one valid-padding convolution: accumulate weight and
/// bias gradients and, when requested, the gradient w.r.t. the layer input.
fn conv_backward(
    d_out: &[f32],
    input: &[f32],
    weights: &[f32],
    in_channels: usize,
    in_dim: usize,
    filters: usize,
    kernel: usize,
    d_weights: &mut [f32],
    d_bias: &mut [f32],
    mut d_input: Option<&mut [f32]>,
) {
    let out_dim = in_dim - kernel + 1;
    let in_plane = in_dim * in_dim;
    for f in 0..filters {
        let out_base = f * out_dim * out_dim;
        for oy in 0..out_dim {
            for ox in 0..out_dim {
                let g = d_out[out_base + oy * out_dim + ox];
                if g == 0.0 {
                    continue;
                }
                d_bias[f] += g;
                for c in 0..in_channels {
                    let w_base = ((f * in_channels + c) * kernel) * kernel;
                    let in_base = c * in_plane;
                    for ky in 0..kernel {
                        let row = in_base + (oy + ky) * in_dim + ox;
                        let w_row = w_base + ky * kernel;
                        for kx in 0..kernel {
                            d_weights[w_row + kx] += g * input[row + kx];
                            if let Some(di) = d_input.as_deref_mut() {
                                di[row + kx] += g * weights[w_row + kx];
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_frame(value: f32) -> Vec<f32> {
        vec![value; FRAME_TENSOR_LEN]
    }

    fn classes() -> Vec<String> {
        vec!["upright".into(), "slouched".into()]
    }

    #[test]
    fn rejects_empty_dataset() {
        let dataset = TrainDataset {
            x: Vec::new(),
            y: Vec::new(),
            classes: classes(),
        };
        let err = train_cnn(&dataset, &TrainOptions::default(), |_| {}).unwrap_err();
        assert!(err.contains("Empty"));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let dataset = TrainDataset {
            x: vec![flat_frame(0.0)],
            y: vec![0, 1],
            classes: classes(),
        };
        assert!(train_cnn(&dataset, &TrainOptions::default(), |_| {}).is_err());
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let dataset = TrainDataset {
            x: vec![flat_frame(0.0)],
            y: vec![2],
            classes: classes(),
        };
        let err = train_cnn(&dataset, &TrainOptions::default(), |_| {}).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn rejects_ragged_samples() {
        let dataset = TrainDataset {
            x: vec![vec![0.0; 5]],
            y: vec![0],
            classes: classes(),
        };
        let err = train_cnn(&dataset, &TrainOptions::default(), |_| {}).unwrap_err();
        assert!(err.contains("wrong length"));
    }

    #[test]
    fn emits_began_then_one_event_per_epoch() {
        let dataset = TrainDataset {
            x: vec![flat_frame(10.0), flat_frame(240.0)],
            y: vec![0, 1],
            classes: classes(),
        };
        let options = TrainOptions {
            epochs: 3,
            ..TrainOptions::default()
        };
        let mut events = Vec::new();
        let model = train_cnn(&dataset, &options, |event| events.push(event)).unwrap();
        assert!(model.validate().is_ok());
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], TrainEvent::Began);
        for (i, event) in events[1..].iter().enumerate() {
            match event {
                TrainEvent::EpochEnd { epoch, accuracy } => {
                    assert_eq!(*epoch, i);
                    assert!(accuracy.is_finite());
                    assert!((0.0..=1.0).contains(accuracy));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    /// Frame whose top half has one brightness and bottom half another.
    fn split_frame(top: f32, bottom: f32) -> Vec<f32> {
        let mut tensor = vec![0.0f32; FRAME_TENSOR_LEN];
        let plane = FRAME_DIM * FRAME_DIM;
        for c in 0..FRAME_CHANNELS {
            for y in 0..FRAME_DIM {
                let value = if y < FRAME_DIM / 2 { top } else { bottom };
                for x in 0..FRAME_DIM {
                    tensor[c * plane + y * FRAME_DIM + x] = value;
                }
            }
        }
        tensor
    }

    #[test]
    fn learns_a_pattern_separable_dataset() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..4 {
            let jitter = i as f32 * 2.0;
            x.push(split_frame(220.0 - jitter, 30.0 + jitter));
            y.push(0);
            x.push(split_frame(30.0 + jitter, 220.0 - jitter));
            y.push(1);
        }
        let dataset = TrainDataset {
            x,
            y,
            classes: classes(),
        };
        let options = TrainOptions {
            epochs: 20,
            learning_rate: 0.0001,
            seed: 7,
        };
        let mut last_accuracy = 0.0;
        let model = train_cnn(&dataset, &options, |event| {
            if let TrainEvent::EpochEnd { accuracy, .. } = event {
                last_accuracy = accuracy;
            }
        })
        .unwrap();
        assert!(last_accuracy >= 0.9, "final accuracy {last_accuracy}");
        assert_eq!(model.predict_class_index(&split_frame(210.0, 40.0)), 0);
        assert_eq!(model.predict_class_index(&split_frame(40.0, 210.0)), 1);
    }
}
