//! Background training runs and their progress events.

use std::sync::mpsc::{self, Receiver};
use std::thread;

use crate::ml::TrainDataset;
use crate::ml::cnn::{self, CnnModel, TrainOptions};

/// Progress stream of one training run, terminated by `Finished`.
#[derive(Debug)]
pub enum TrainingEvent {
    Began,
    EpochEnd { epoch: usize, accuracy: f32 },
    Finished(Result<CnnModel, String>),
}

/// Handle to an in-flight training run.
///
/// Training is not cancelable; superseding a run drops this handle and with
/// it the receiving end of the channel, so a stale run's results are
/// discarded instead of overwriting newer state.
pub struct TrainingRun {
    run_id: u64,
    rx: Receiver<TrainingEvent>,
}

impl TrainingRun {
    /// Spawn a worker thread that trains over an owned dataset snapshot.
    pub fn spawn(run_id: u64, dataset: TrainDataset, options: TrainOptions) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = cnn::train_cnn(&dataset, &options, |event| {
                let mapped = match event {
                    cnn::TrainEvent::Began => TrainingEvent::Began,
                    cnn::TrainEvent::EpochEnd { epoch, accuracy } => {
                        TrainingEvent::EpochEnd { epoch, accuracy }
                    }
                };
                let _ = tx.send(mapped);
            });
            let _ = tx.send(TrainingEvent::Finished(result));
        });
        Self { run_id, rx }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Collect every event the worker has produced so far.
    pub fn drain(&self) -> Vec<TrainingEvent> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FRAME_TENSOR_LEN;
    use crate::session::PostureLabel;
    use std::time::{Duration, Instant};

    fn tiny_dataset() -> TrainDataset {
        TrainDataset {
            x: vec![vec![0.0; FRAME_TENSOR_LEN], vec![255.0; FRAME_TENSOR_LEN]],
            y: vec![0, 1],
            classes: PostureLabel::class_names(),
        }
    }

    fn drain_until_finished(run: &TrainingRun) -> Vec<TrainingEvent> {
        let deadline = Instant::now() + Duration::from_secs(60);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            events.extend(run.drain());
            if events
                .iter()
                .any(|event| matches!(event, TrainingEvent::Finished(_)))
            {
                return events;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("training run did not finish in time");
    }

    #[test]
    fn run_reports_progress_then_finishes() {
        let options = TrainOptions {
            epochs: 2,
            ..TrainOptions::default()
        };
        let run = TrainingRun::spawn(1, tiny_dataset(), options);
        let events = drain_until_finished(&run);
        assert!(matches!(events.first(), Some(TrainingEvent::Began)));
        let epochs: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                TrainingEvent::EpochEnd { epoch, .. } => Some(*epoch),
                _ => None,
            })
            .collect();
        assert_eq!(epochs, vec![0, 1]);
        match events.last() {
            Some(TrainingEvent::Finished(Ok(model))) => assert!(model.validate().is_ok()),
            other => panic!("expected successful finish, got {other:?}"),
        }
    }

    #[test]
    fn failed_run_reports_the_error() {
        let empty = TrainDataset {
            x: Vec::new(),
            y: Vec::new(),
            classes: PostureLabel::class_names(),
        };
        let run = TrainingRun::spawn(2, empty, TrainOptions::default());
        let events = drain_until_finished(&run);
        assert!(matches!(
            events.last(),
            Some(TrainingEvent::Finished(Err(_)))
        ));
    }
}
