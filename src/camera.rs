//! Camera capture boundary.
//!
//! The session controller only ever talks to the `CameraSource` trait:
//! enumerate devices, open a stream for a facing preference, capture frames,
//! close the stream. The default backend synthesizes deterministic frames so
//! the demo and the test suite run without camera hardware; a real webcam
//! backend is available behind the `camera-opencv` feature.

use std::fmt;

use image::RgbImage;
use thiserror::Error;

mod synthetic;
#[cfg(feature = "camera-opencv")]
mod webcam;

pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-opencv")]
pub use webcam::OpenCvCamera;

/// Camera-selection preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Back => write!(f, "back"),
        }
    }
}

/// Identifier of one video input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised at the camera boundary.
///
/// `TrackStop` is best-effort teardown noise and never fatal; the rest are
/// surfaced to the status line and leave the session running.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Failed to enumerate video devices: {0}")]
    Enumerate(String),
    #[error("No video input device for the {facing} camera")]
    NoDevice { facing: Facing },
    #[error("Failed to open the {facing} camera stream: {reason}")]
    Open { facing: Facing, reason: String },
    #[error("Failed to stop a stream track: {0}")]
    TrackStop(String),
    #[error("Failed to capture a frame: {0}")]
    Capture(String),
    #[error("No open camera stream")]
    NotOpen,
}

/// Capability interface the session controller consumes.
pub trait CameraSource {
    /// Enumerate attached video input devices.
    fn list_devices(&mut self) -> Result<Vec<DeviceId>, CameraError>;
    /// Tear down any open stream and open one for the given facing.
    fn open(&mut self, facing: Facing) -> Result<(), CameraError>;
    /// Stop the open stream, if any. Failures are non-fatal.
    fn close(&mut self) -> Result<(), CameraError>;
    /// Grab the current frame from the open stream.
    fn capture(&mut self) -> Result<RgbImage, CameraError>;
}
