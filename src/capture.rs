// src/capture.rs - Camera capture behind a small device/factory seam
use image::{imageops, RgbImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera {index} unavailable: {reason}")]
    Unavailable { index: u32, reason: String },
    #[error("failed to capture frame: {0}")]
    Read(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Mirror frames so the preview behaves like a mirror.
    pub mirror: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 15,
            mirror: true,
        }
    }
}

/// An open capture session. Owned by the thread that reads from it.
pub trait CaptureDevice {
    /// `Ok(None)` is a miss that may succeed on the next call.
    fn read(&mut self) -> Result<Option<RgbImage>, CaptureError>;

    fn release(&mut self);
}

pub trait CaptureFactory: Send + Sync {
    fn open(
        &self,
        index: u32,
        settings: &CameraSettings,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError>;
}

#[derive(Debug, Clone)]
pub struct CameraDescriptor {
    pub index: u32,
    pub name: String,
}

pub fn list_cameras() -> Vec<CameraDescriptor> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .iter()
            .enumerate()
            .map(|(i, camera)| CameraDescriptor {
                index: match camera.index() {
                    CameraIndex::Index(idx) => *idx,
                    CameraIndex::String(_) => i as u32,
                },
                name: camera.human_name(),
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to query cameras");
            Vec::new()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NokhwaFactory;

impl CaptureFactory for NokhwaFactory {
    fn open(
        &self,
        index: u32,
        settings: &CameraSettings,
    ) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        Ok(Box::new(NokhwaCamera::open(index, settings)?))
    }
}

pub struct NokhwaCamera {
    camera: Option<Camera>,
    index: u32,
    mirror: bool,
}

impl NokhwaCamera {
    pub fn open(index: u32, settings: &CameraSettings) -> Result<Self, CaptureError> {
        debug!(index, "opening camera");
        let camera_index = CameraIndex::Index(index);

        let format = CameraFormat::new(
            Resolution::new(settings.width, settings.height),
            FrameFormat::MJPEG,
            settings.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        // Format negotiation is best-effort: fall back to whatever the driver offers
        let mut camera = match Camera::new(camera_index.clone(), requested) {
            Ok(camera) => camera,
            Err(e) => {
                warn!(index, error = %e, "requested camera format rejected, using driver default");
                let fallback = RequestedFormat::new::<RgbFormat>(
                    RequestedFormatType::AbsoluteHighestFrameRate,
                );
                Camera::new(camera_index, fallback).map_err(|e| CaptureError::Unavailable {
                    index,
                    reason: e.to_string(),
                })?
            }
        };

        camera.open_stream().map_err(|e| CaptureError::Unavailable {
            index,
            reason: format!("failed to open stream: {e}"),
        })?;

        let resolution = camera.resolution();
        info!(
            index,
            width = resolution.width(),
            height = resolution.height(),
            fps = camera.frame_rate(),
            "camera opened"
        );

        Ok(Self {
            camera: Some(camera),
            index,
            mirror: settings.mirror,
        })
    }
}

impl CaptureDevice for NokhwaCamera {
    fn read(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let Some(camera) = self.camera.as_mut() else {
            return Err(CaptureError::Read(format!("camera {} released", self.index)));
        };

        let frame = match camera.frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(index = self.index, error = %e, "frame read missed");
                return Ok(None);
            }
        };

        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;

        let width = decoded.width();
        let height = decoded.height();
        let img = RgbImage::from_raw(width, height, decoded.into_vec())
            .ok_or_else(|| CaptureError::Decode("frame buffer size mismatch".to_string()))?;

        if self.mirror {
            Ok(Some(imageops::flip_horizontal(&img)))
        } else {
            Ok(Some(img))
        }
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                warn!(index = self.index, error = %e, "failed to stop camera stream");
            }
            info!(index = self.index, "camera released");
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.release();
    }
}
