//! End-to-end session flow against the synthetic camera.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use posturepal::alert::AlertSink;
use posturepal::camera::SyntheticCamera;
use posturepal::ml::cnn::TrainOptions;
use posturepal::session::{Prediction, SessionConfig, SessionController};

#[derive(Clone, Default)]
struct AlertProbe {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl AlertProbe {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

struct ProbeSink(AlertProbe);

impl AlertSink for ProbeSink {
    fn play(&mut self) {
        self.0.calls.lock().unwrap().push("play");
    }

    fn pause(&mut self) {
        self.0.calls.lock().unwrap().push("pause");
    }

    fn reset(&mut self) {
        self.0.calls.lock().unwrap().push("reset");
    }
}

/// Shrunk cadences and a training setup that converges quickly on the
/// synthetic camera's facing patterns.
fn fast_config() -> SessionConfig {
    SessionConfig {
        burst_len: 4,
        capture_interval: Duration::from_millis(10),
        predict_interval: Duration::from_millis(100),
        train: TrainOptions {
            epochs: 12,
            learning_rate: 0.0001,
            seed: 7,
        },
        front_camera: true,
    }
}

fn new_session(config: SessionConfig) -> (SessionController, AlertProbe) {
    let probe = AlertProbe::default();
    let controller = SessionController::new(
        Box::new(SyntheticCamera::new(2)),
        Box::new(ProbeSink(probe.clone())),
        config,
    );
    (controller, probe)
}

fn run_full_burst(controller: &mut SessionController) {
    let start = Instant::now();
    controller.tick(start + Duration::from_millis(10) * 60);
}

fn wait_trained(controller: &mut SessionController) {
    let deadline = Instant::now() + Duration::from_secs(120);
    while Instant::now() < deadline {
        controller.tick(Instant::now());
        if controller.state().is_trained {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("training did not finish in time");
}

#[test]
fn capture_train_predict_end_to_end() {
    let (mut controller, probe) = new_session(fast_config());
    assert!(controller.state().can_switch_camera);

    // Upright burst with the front camera in view.
    controller.label_upright(Instant::now());
    run_full_burst(&mut controller);
    assert_eq!(controller.samples(), 4);

    // Slouched burst with the back camera in view.
    controller.switch_camera();
    assert!(!controller.state().front_camera);
    controller.label_slouched(Instant::now());
    run_full_burst(&mut controller);
    assert_eq!(controller.samples(), 8);
    assert_eq!(&controller.sample_labels()[..4], &[0, 0, 0, 0]);
    assert_eq!(&controller.sample_labels()[4..], &[1, 1, 1, 1]);

    controller.start_training();
    wait_trained(&mut controller);
    let state = controller.state();
    assert!(state.is_trained);
    assert!(!state.is_training);
    assert_eq!(state.epoch, Some(11));
    let accuracy = state.accuracy.expect("accuracy reported");
    assert!(accuracy.is_finite());
    assert!((0.0..=1.0).contains(&accuracy));

    // Predicting with the back camera in view flags slouching and starts the
    // alert exactly once across consecutive polls.
    let predict_start = Instant::now();
    let period = Duration::from_millis(100);
    controller.toggle_predicting(predict_start);
    for k in 1..=3 {
        controller.tick(predict_start + period * k);
    }
    assert_eq!(controller.state().prediction, Prediction::Slouched);
    assert!(controller.state().audio_playing);
    assert_eq!(probe.calls(), vec!["play"]);

    // Switching back to the front camera flips the prediction and stops it.
    controller.switch_camera();
    controller.tick(predict_start + period * 4);
    assert_eq!(controller.state().prediction, Prediction::Upright);
    assert!(!controller.state().audio_playing);
    assert_eq!(probe.calls(), vec!["play", "pause", "reset"]);

    // Stopping clears the prediction and the poll without touching audio.
    controller.toggle_predicting(predict_start + period * 5);
    assert!(!controller.state().is_predicting);
    assert!(!controller.predict_active());
    assert_eq!(controller.state().prediction, Prediction::None);
    assert_eq!(controller.snapshot().prediction_label, "");
}

#[test]
fn clear_control_follows_the_sample_count() {
    let (mut controller, _) = new_session(fast_config());
    assert!(!controller.snapshot().clear_visible);

    controller.label_slouched(Instant::now());
    run_full_burst(&mut controller);
    assert_eq!(controller.samples(), 4);
    assert!(controller.snapshot().clear_visible);

    controller.clear_samples();
    assert_eq!(controller.samples(), 0);
    assert!(!controller.snapshot().clear_visible);
    assert_eq!(controller.snapshot().samples_label, "0");
}
