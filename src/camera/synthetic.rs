use image::{Rgb, RgbImage};

use super::{CameraError, CameraSource, DeviceId, Facing};

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

/// Deterministic frame generator standing in for real camera hardware.
///
/// Each facing produces a distinct half-bright/half-dark pattern with a small
/// per-frame wobble, so captured bursts from different facings are cleanly
/// separable by the classifier. Failure knobs let tests exercise the error
/// paths of the session controller.
pub struct SyntheticCamera {
    device_count: usize,
    open_facing: Option<Facing>,
    frames_served: u64,
    opens_attempted: u32,
    fail_enumerate: bool,
    fail_open_attempt: Option<u32>,
    fail_close: bool,
}

impl SyntheticCamera {
    pub fn new(device_count: usize) -> Self {
        Self {
            device_count,
            open_facing: None,
            frames_served: 0,
            opens_attempted: 0,
            fail_enumerate: false,
            fail_open_attempt: None,
            fail_close: false,
        }
    }

    /// Make `list_devices` fail.
    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumerate = true;
        self
    }

    /// Make the n-th `open` call (1-based) fail.
    pub fn failing_open_attempt(mut self, attempt: u32) -> Self {
        self.fail_open_attempt = Some(attempt);
        self
    }

    /// Make every `close` call report a track-stop failure.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Facing of the currently open stream, if any.
    pub fn open_facing(&self) -> Option<Facing> {
        self.open_facing
    }

    fn render_frame(&self, facing: Facing) -> RgbImage {
        let wobble = (self.frames_served % 7) as u8;
        let (top, bottom) = match facing {
            Facing::Front => (230 - wobble, 25 + wobble),
            Facing::Back => (25 + wobble, 230 - wobble),
        };
        let mut frame = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);
        for (_, y, pixel) in frame.enumerate_pixels_mut() {
            let value = if y < FRAME_HEIGHT / 2 { top } else { bottom };
            *pixel = Rgb([value, value, value]);
        }
        frame
    }
}

impl CameraSource for SyntheticCamera {
    fn list_devices(&mut self) -> Result<Vec<DeviceId>, CameraError> {
        if self.fail_enumerate {
            return Err(CameraError::Enumerate("synthetic enumeration failure".into()));
        }
        Ok((0..self.device_count)
            .map(|i| DeviceId(format!("synthetic-{i}")))
            .collect())
    }

    fn open(&mut self, facing: Facing) -> Result<(), CameraError> {
        self.opens_attempted += 1;
        if self.fail_open_attempt == Some(self.opens_attempted) {
            return Err(CameraError::Open {
                facing,
                reason: "synthetic open failure".into(),
            });
        }
        if self.device_count == 0 {
            return Err(CameraError::NoDevice { facing });
        }
        self.open_facing = Some(facing);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CameraError> {
        self.open_facing = None;
        if self.fail_close {
            return Err(CameraError::TrackStop("synthetic stop failure".into()));
        }
        Ok(())
    }

    fn capture(&mut self) -> Result<RgbImage, CameraError> {
        let facing = self.open_facing.ok_or(CameraError::NotOpen)?;
        let frame = self.render_frame(facing);
        self.frames_served += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_one_id_per_device() {
        let mut camera = SyntheticCamera::new(3);
        assert_eq!(camera.list_devices().unwrap().len(), 3);
    }

    #[test]
    fn capture_requires_an_open_stream() {
        let mut camera = SyntheticCamera::new(1);
        assert!(matches!(camera.capture(), Err(CameraError::NotOpen)));
        camera.open(Facing::Front).unwrap();
        assert!(camera.capture().is_ok());
        camera.close().unwrap();
        assert!(matches!(camera.capture(), Err(CameraError::NotOpen)));
    }

    #[test]
    fn facings_render_opposite_patterns() {
        let mut camera = SyntheticCamera::new(2);
        camera.open(Facing::Front).unwrap();
        let front = camera.capture().unwrap();
        camera.open(Facing::Back).unwrap();
        let back = camera.capture().unwrap();
        let top = (FRAME_WIDTH / 2, 2);
        assert!(front.get_pixel(top.0, top.1).0[0] > 128);
        assert!(back.get_pixel(top.0, top.1).0[0] < 128);
    }

    #[test]
    fn close_failure_still_drops_the_stream() {
        let mut camera = SyntheticCamera::new(1).failing_close();
        camera.open(Facing::Front).unwrap();
        assert!(matches!(camera.close(), Err(CameraError::TrackStop(_))));
        assert_eq!(camera.open_facing(), None);
    }
}
