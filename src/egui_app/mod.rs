//! egui shell around the session controller.

mod app;

pub use app::PostureApp;
