//! Capture/train/predict session orchestration.
//!
//! The controller owns all mutable session state and transitions it in
//! response to user actions and events drained from background work; the
//! render projection turns that state into UI labels and visibility flags.

pub mod controller;
pub mod render;
pub mod state;
pub mod timer;
pub mod training;

pub use controller::{SessionConfig, SessionController};
pub use render::UiSnapshot;
pub use state::{PostureLabel, Prediction, SessionState};
