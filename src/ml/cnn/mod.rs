//! Small convolutional posture classifier.

mod model;
mod train;

pub use model::{CnnModel, FLATTEN_LEN, N_CLASSES};
pub use train::{TrainEvent, TrainOptions, train_cnn};
