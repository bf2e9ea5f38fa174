#![deny(missing_docs)]

//! Entry point for the PosturePal demo UI.

use eframe::egui;
use posturepal::alert::{AlertSink, NullAlert, ToneAlert};
use posturepal::camera::{CameraSource, SyntheticCamera};
use posturepal::config::{self, AppConfig};
use posturepal::egui_app::PostureApp;
use posturepal::logging;
use posturepal::session::{SessionConfig, SessionController};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let app_config = config::load_or_default()?;
    let camera = build_camera();
    let alert = build_alert(&app_config);
    let controller =
        SessionController::new(camera, alert, SessionConfig::from_app_config(&app_config));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 620.0])
            .with_min_inner_size([480.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "PosturePal",
        native_options,
        Box::new(move |_cc| Ok(Box::new(PostureApp::new(controller)))),
    )?;
    Ok(())
}

/// Prefer a real webcam when the backend is compiled in, falling back to
/// synthesized frames so the demo always starts.
fn build_camera() -> Box<dyn CameraSource> {
    #[cfg(feature = "camera-opencv")]
    {
        use posturepal::camera::OpenCvCamera;
        match OpenCvCamera::probe() {
            Ok(camera) => return Box::new(camera),
            Err(err) => tracing::warn!("webcam unavailable, using synthetic frames: {err}"),
        }
    }
    Box::new(SyntheticCamera::new(2))
}

/// Audio-backed alert, degrading to a silent sink when no output exists.
fn build_alert(config: &AppConfig) -> Box<dyn AlertSink> {
    let settings = &config.alert;
    let result = match &settings.sound_path {
        Some(path) => ToneAlert::from_file(path, settings.volume),
        None => ToneAlert::tone(settings.volume),
    };
    match result {
        Ok(alert) => Box::new(alert),
        Err(err) => {
            tracing::warn!("audio alert unavailable: {err}");
            Box::new(NullAlert)
        }
    }
}
