//! # Camera Capture Handle
//!
//! Scoped ownership of a capture device for face enrollment and verification.
//!
//! The device is opened lazily on the first [`Camera::capture`] and released
//! exactly once: after [`Camera::enroll`] or [`Camera::verification_frame`]
//! finishes (success or error), on
//! [`Camera::cancel`], or when the `Camera` is dropped. A
//! [`CancelHandle`] lets another thread or task abort a capture in flight; the
//! frame is discarded and the device released before the error is returned.

use image::DynamicImage;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::common::error::StegoError;
use crate::factors::face::{extract_features, FeatureVector};

/// A source of still frames (webcam, uploaded photo, test fixture).
pub trait CaptureDevice {
    /// Acquire the underlying hardware or stream.
    fn open(&mut self) -> Result<(), StegoError>;
    /// Block until a frame is available.
    fn grab(&mut self) -> Result<DynamicImage, StegoError>;
    /// Stop the stream. Called at most once per successful `open`.
    fn release(&mut self);
}

/// Aborts a capture owned by a [`Camera`] from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns a [`CaptureDevice`] and guarantees it is released.
pub struct Camera<D: CaptureDevice> {
    device: D,
    is_open: bool,
    cancel: CancelHandle,
}

impl<D: CaptureDevice> Camera<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            is_open: false,
            cancel: CancelHandle::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Grab one frame, opening the device first if needed.
    ///
    /// The device is released before any error is returned.
    pub fn capture(&mut self) -> Result<DynamicImage, StegoError> {
        self.check_cancelled()?;

        if !self.is_open {
            debug!("📷 Opening capture device");
            self.device.open()?;
            self.is_open = true;
        }

        let frame = match self.device.grab() {
            Ok(frame) => frame,
            Err(e) => {
                self.release();
                return Err(e);
            }
        };

        self.check_cancelled()?;
        Ok(frame)
    }

    /// Capture a frame, build its feature vector, release the device.
    pub fn enroll(mut self) -> Result<FeatureVector, StegoError> {
        let frame = self.capture();
        self.release();
        Ok(extract_features(&frame?))
    }

    /// Capture the frame a decode compares against the stored template,
    /// then release the device.
    pub fn verification_frame(mut self) -> Result<DynamicImage, StegoError> {
        let frame = self.capture();
        self.release();
        frame
    }

    /// Abandon the capture and release the device now.
    pub fn cancel(mut self) {
        self.cancel.cancel();
        self.release();
    }

    fn check_cancelled(&mut self) -> Result<(), StegoError> {
        if self.cancel.is_cancelled() {
            self.release();
            return Err(StegoError::Camera("capture cancelled".to_string()));
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.is_open {
            debug!("📷 Releasing capture device");
            self.device.release();
            self.is_open = false;
        }
    }
}

impl<D: CaptureDevice> Drop for Camera<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A "camera" that yields an already-decoded photo.
///
/// Front ends without hardware access (CLI, HTTP upload) use this.
pub struct StillFrameDevice {
    frame: DynamicImage,
}

impl StillFrameDevice {
    pub fn new(frame: DynamicImage) -> Self {
        Self { frame }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StegoError> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    pub fn open_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, StegoError> {
        Ok(Self::new(image::open(path)?))
    }
}

impl CaptureDevice for StillFrameDevice {
    fn open(&mut self) -> Result<(), StegoError> {
        Ok(())
    }

    fn grab(&mut self) -> Result<DynamicImage, StegoError> {
        Ok(self.frame.clone())
    }

    fn release(&mut self) {}
}
