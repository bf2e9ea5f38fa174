use image::{Rgb, RgbImage};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::{CameraError, CameraSource, DeviceId, Facing};

const MAX_PROBED_DEVICES: i32 = 4;

/// Webcam capture backed by OpenCV's `VideoCapture`.
///
/// Facings map onto probe order: the front camera is index 0 and the back
/// camera is index 1 when a second device exists.
pub struct OpenCvCamera {
    capture: Option<VideoCapture>,
    device_count: usize,
}

impl OpenCvCamera {
    /// Probe attached capture devices and return a closed camera handle.
    pub fn probe() -> Result<Self, CameraError> {
        let device_count = count_devices()?;
        if device_count == 0 {
            return Err(CameraError::NoDevice {
                facing: Facing::Front,
            });
        }
        Ok(Self {
            capture: None,
            device_count,
        })
    }

    fn device_index(&self, facing: Facing) -> i32 {
        match facing {
            Facing::Front => 0,
            Facing::Back => {
                if self.device_count > 1 {
                    1
                } else {
                    0
                }
            }
        }
    }
}

fn count_devices() -> Result<usize, CameraError> {
    let mut count = 0usize;
    for index in 0..MAX_PROBED_DEVICES {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|err| CameraError::Enumerate(err.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|err| CameraError::Enumerate(err.to_string()))?;
        if !opened {
            break;
        }
        count += 1;
    }
    Ok(count)
}

impl CameraSource for OpenCvCamera {
    fn list_devices(&mut self) -> Result<Vec<DeviceId>, CameraError> {
        Ok((0..self.device_count)
            .map(|i| DeviceId(format!("video{i}")))
            .collect())
    }

    fn open(&mut self, facing: Facing) -> Result<(), CameraError> {
        self.capture = None;
        let index = self.device_index(facing);
        let capture = VideoCapture::new(index, videoio::CAP_ANY).map_err(|err| {
            CameraError::Open {
                facing,
                reason: err.to_string(),
            }
        })?;
        let opened = capture.is_opened().map_err(|err| CameraError::Open {
            facing,
            reason: err.to_string(),
        })?;
        if !opened {
            return Err(CameraError::Open {
                facing,
                reason: format!("device {index} did not open"),
            });
        }
        self.capture = Some(capture);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        match self.capture.take() {
            Some(mut capture) => capture
                .release()
                .map_err(|err| CameraError::TrackStop(err.to_string())),
            None => Ok(()),
        }
    }

    fn capture(&mut self) -> Result<RgbImage, CameraError> {
        let capture = self.capture.as_mut().ok_or(CameraError::NotOpen)?;
        let mut frame = Mat::default();
        let grabbed = capture
            .read(&mut frame)
            .map_err(|err| CameraError::Capture(err.to_string()))?;
        if !grabbed {
            return Err(CameraError::Capture("no frame available".into()));
        }
        mat_to_rgb(&frame)
    }
}

/// Convert a BGR `Mat` into an `RgbImage`.
fn mat_to_rgb(frame: &Mat) -> Result<RgbImage, CameraError> {
    let rows = frame.rows();
    let cols = frame.cols();
    if rows <= 0 || cols <= 0 {
        return Err(CameraError::Capture("empty frame".into()));
    }
    let data = frame
        .data_bytes()
        .map_err(|err| CameraError::Capture(err.to_string()))?;
    let (width, height) = (cols as usize, rows as usize);
    if data.len() < width * height * 3 {
        return Err(CameraError::Capture(format!(
            "unexpected frame buffer size {} for {width}x{height}",
            data.len()
        )));
    }
    let mut image = RgbImage::new(cols as u32, rows as u32);
    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * 3;
            image.put_pixel(
                x as u32,
                y as u32,
                Rgb([data[idx + 2], data[idx + 1], data[idx]]),
            );
        }
    }
    Ok(image)
}
