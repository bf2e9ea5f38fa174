//! Library exports for reuse in the binary and integration tests.
/// Alert playback boundary.
pub mod alert;
/// Application directory helpers.
pub mod app_dirs;
/// Camera capture boundary.
pub mod camera;
/// TOML configuration.
pub mod config;
pub mod dataset;
/// egui UI shell.
pub mod egui_app;
/// Frame preprocessing shared by capture and prediction.
pub mod frame;
/// Logging setup.
pub mod logging;
/// Classifier training and inference.
pub mod ml;
/// Capture/train/predict session orchestration.
pub mod session;
