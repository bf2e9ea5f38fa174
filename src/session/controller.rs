//! Session controller: owns the state record, the training set, and the
//! capability handles, and transitions them from user actions and ticks.

use std::time::{Duration, Instant};

use image::RgbImage;

use crate::alert::AlertSink;
use crate::camera::{CameraSource, Facing};
use crate::config::AppConfig;
use crate::dataset::TrainingSet;
use crate::frame;
use crate::ml::cnn::{CnnModel, TrainOptions};

use super::render::UiSnapshot;
use super::state::{PostureLabel, Prediction, SessionState};
use super::timer::PeriodicTask;
use super::training::{TrainingEvent, TrainingRun};

/// Tunables the controller is constructed with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Frames appended per labeling action.
    pub burst_len: u32,
    /// Cadence of captures within a burst.
    pub capture_interval: Duration,
    /// Cadence of inference polls while predicting.
    pub predict_interval: Duration,
    pub train: TrainOptions,
    /// Facing preference at startup.
    pub front_camera: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            burst_len: 100,
            capture_interval: Duration::from_millis(60),
            predict_interval: Duration::from_millis(500),
            train: TrainOptions::default(),
            front_camera: true,
        }
    }
}

impl SessionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            burst_len: config.capture.burst_len,
            capture_interval: Duration::from_millis(config.capture.interval_ms),
            predict_interval: Duration::from_millis(config.prediction.interval_ms),
            train: TrainOptions {
                epochs: config.training.epochs,
                learning_rate: config.training.learning_rate,
                seed: config.training.seed,
            },
            front_camera: config.camera.front_camera,
        }
    }
}

struct CaptureBurst {
    label: PostureLabel,
    task: PeriodicTask,
}

/// Orchestrates the capture, train, and predict sub-machines.
///
/// All state lives here; the UI shell forwards clicks and pumps `tick`, and
/// renders whatever `snapshot` returns.
pub struct SessionController {
    state: SessionState,
    dataset: TrainingSet,
    camera: Box<dyn CameraSource>,
    alert: Box<dyn AlertSink>,
    model: Option<CnnModel>,
    capture: Option<CaptureBurst>,
    predict_task: Option<PeriodicTask>,
    training: Option<TrainingRun>,
    next_run_id: u64,
    config: SessionConfig,
}

impl SessionController {
    /// Enumerate devices and open the initial stream; failures land on the
    /// status line rather than aborting construction.
    pub fn new(
        mut camera: Box<dyn CameraSource>,
        alert: Box<dyn AlertSink>,
        config: SessionConfig,
    ) -> Self {
        let mut state = SessionState {
            front_camera: config.front_camera,
            ..SessionState::default()
        };

        match camera.list_devices() {
            Ok(devices) => state.can_switch_camera = devices.len() > 1,
            Err(err) => {
                tracing::warn!("device enumeration failed: {err}");
                push_status(&mut state.status, &err.to_string());
            }
        }

        let facing = facing_for(state.front_camera);
        if let Err(err) = camera.open(facing) {
            tracing::error!("failed to open the {facing} camera stream: {err}");
            push_status(&mut state.status, &err.to_string());
        }

        Self {
            state,
            dataset: TrainingSet::new(),
            camera,
            alert,
            model: None,
            capture: None,
            predict_task: None,
            training: None,
            next_run_id: 0,
            config,
        }
    }

    /// Start (or restart) a capture burst labeled "upright".
    pub fn label_upright(&mut self, now: Instant) {
        self.start_burst(PostureLabel::Upright, now);
    }

    /// Start (or restart) a capture burst labeled "slouched".
    pub fn label_slouched(&mut self, now: Instant) {
        self.start_burst(PostureLabel::Slouched, now);
    }

    fn start_burst(&mut self, label: PostureLabel, now: Instant) {
        if self.capture.is_some() {
            tracing::debug!("restarting capture burst with label {}", label.name());
        }
        self.capture = Some(CaptureBurst {
            label,
            task: PeriodicTask::with_limit(now, self.config.capture_interval, self.config.burst_len),
        });
    }

    /// Drop every captured sample.
    pub fn clear_samples(&mut self) {
        self.dataset.clear();
    }

    /// Kick off a training run over a snapshot of the current samples.
    ///
    /// Re-triggering is allowed at any time; the superseded run keeps
    /// computing but its events are discarded with its channel.
    pub fn start_training(&mut self) {
        if self.training.is_some() {
            tracing::warn!("superseding an in-flight training run");
        }
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let dataset = self.dataset.snapshot();
        tracing::info!(run_id, samples = dataset.x.len(), "starting training run");
        self.training = Some(TrainingRun::spawn(run_id, dataset, self.config.train.clone()));
    }

    /// Toggle the prediction poll; a no-op until a model has been trained.
    pub fn toggle_predicting(&mut self, now: Instant) {
        if !self.state.is_trained {
            return;
        }
        if self.state.is_predicting {
            self.predict_task = None;
            self.state.is_predicting = false;
            self.state.prediction = Prediction::None;
        } else {
            self.state.is_predicting = true;
            self.predict_task = Some(PeriodicTask::new(now, self.config.predict_interval));
        }
    }

    /// Toggle the facing preference and reopen the stream.
    ///
    /// Teardown is best-effort and the toggled preference is kept even when
    /// reopening fails; errors surface on the status line only.
    pub fn switch_camera(&mut self) {
        self.state.front_camera = !self.state.front_camera;
        if let Err(err) = self.camera.close() {
            tracing::warn!("camera teardown failed: {err}");
            push_status(&mut self.state.status, &err.to_string());
        }
        let facing = facing_for(self.state.front_camera);
        if let Err(err) = self.camera.open(facing) {
            tracing::error!("failed to open the {facing} camera stream: {err}");
            push_status(&mut self.state.status, &err.to_string());
        }
    }

    /// Pump pending work: training events, the capture burst, and the
    /// prediction poll.
    pub fn tick(&mut self, now: Instant) {
        self.drain_training_events();
        self.pump_capture(now);
        self.pump_prediction(now);
        debug_assert_eq!(self.predict_task.is_some(), self.state.is_predicting);
    }

    /// Project the current state for rendering.
    pub fn snapshot(&self) -> UiSnapshot {
        UiSnapshot::project(&self.state, self.dataset.len())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current training-set size.
    pub fn samples(&self) -> usize {
        self.dataset.len()
    }

    /// Labels captured so far, in insertion order.
    pub fn sample_labels(&self) -> &[usize] {
        self.dataset.labels()
    }

    pub fn capture_active(&self) -> bool {
        self.capture.is_some()
    }

    pub fn predict_active(&self) -> bool {
        self.predict_task.is_some()
    }

    pub fn training_active(&self) -> bool {
        self.training.is_some()
    }

    /// Grab a frame for the live preview; failures only log.
    pub fn preview_frame(&mut self) -> Option<RgbImage> {
        match self.camera.capture() {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::trace!("preview capture failed: {err}");
                None
            }
        }
    }

    fn drain_training_events(&mut self) {
        let (run_id, events) = match &self.training {
            Some(run) => (run.run_id(), run.drain()),
            None => return,
        };
        let mut finished = false;
        for event in events {
            match event {
                TrainingEvent::Began => {
                    self.state.is_training = true;
                    tracing::info!(run_id, "training started");
                }
                TrainingEvent::EpochEnd { epoch, accuracy } => {
                    self.state.epoch = Some(epoch);
                    self.state.accuracy = Some(accuracy);
                    tracing::debug!(run_id, epoch, accuracy, "epoch finished");
                }
                TrainingEvent::Finished(Ok(model)) => {
                    tracing::info!(run_id, "training complete");
                    self.model = Some(model);
                    self.state.is_training = false;
                    self.state.is_trained = true;
                    finished = true;
                }
                TrainingEvent::Finished(Err(err)) => {
                    tracing::error!(run_id, "training failed: {err}");
                    self.state.is_training = false;
                    finished = true;
                }
            }
        }
        if finished {
            self.training = None;
        }
    }

    fn pump_capture(&mut self, now: Instant) {
        let (ticks, label) = match self.capture.as_mut() {
            Some(burst) => (burst.task.poll(now), burst.label),
            None => return,
        };
        for _ in 0..ticks {
            match self.camera.capture() {
                Ok(image) => {
                    let tensor = frame::to_input_tensor(&image);
                    if let Err(err) = self.dataset.append(tensor, label) {
                        tracing::warn!("dropping captured frame: {err}");
                    }
                }
                Err(err) => {
                    tracing::warn!("frame capture failed: {err}");
                    push_status(&mut self.state.status, &err.to_string());
                }
            }
        }
        if self
            .capture
            .as_ref()
            .is_some_and(|burst| burst.task.is_finished())
        {
            tracing::debug!(samples = self.dataset.len(), "capture burst complete");
            self.capture = None;
        }
    }

    fn pump_prediction(&mut self, now: Instant) {
        let due = match self.predict_task.as_mut() {
            Some(task) => task.poll(now) > 0,
            None => return,
        };
        if !due {
            return;
        }
        let image = match self.camera.capture() {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("prediction capture failed: {err}");
                push_status(&mut self.state.status, &err.to_string());
                return;
            }
        };
        let tensor = frame::to_input_tensor(&image);
        let class = match &self.model {
            Some(model) => model.predict_class_index(&tensor),
            None => return,
        };
        self.apply_prediction(Prediction::from_class_index(class));
    }

    fn apply_prediction(&mut self, prediction: Prediction) {
        match prediction {
            Prediction::Upright => {
                self.state.prediction = Prediction::Upright;
                if self.state.audio_playing {
                    self.state.audio_playing = false;
                    self.alert.pause();
                    self.alert.reset();
                }
            }
            Prediction::Slouched => {
                self.state.prediction = Prediction::Slouched;
                if !self.state.audio_playing {
                    self.state.audio_playing = true;
                    self.alert.play();
                }
            }
            Prediction::None => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn install_model(&mut self, model: CnnModel) {
        self.model = Some(model);
        self.state.is_trained = true;
    }
}

fn facing_for(front_camera: bool) -> Facing {
    if front_camera {
        Facing::Front
    } else {
        Facing::Back
    }
}

fn push_status(status: &mut String, message: &str) {
    if !status.is_empty() {
        status.push_str("; ");
    }
    status.push_str(message);
}
