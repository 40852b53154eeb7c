//! Camera session: owns at most one live media stream.
//!
//! The hardware side sits behind [`MediaSource`] / [`MediaStream`] so the
//! session logic runs against mocks in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::normalizer::{prepare_or_original, ImageNormalizer, NormalizeProfile, PreparedImage, JPEG_MIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
    #[error("Camera not started")]
    NotStarted,
    #[error("Frame capture failed: {0}")]
    Capture(String),
}

impl CameraError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => {
                "Camera access was denied. Allow camera access or upload a photo instead."
            }
            CameraError::Unavailable(_) => "No camera is available on this device.",
            CameraError::NotStarted => "Start the camera before taking a photo.",
            CameraError::Capture(_) => "Could not take the photo. Please try again.",
        }
    }
}

/// A live camera stream.
pub trait MediaStream: Send {
    /// Grab the current frame as encoded image bytes (JPEG).
    fn capture_frame(&mut self) -> Result<Vec<u8>, CameraError>;
    /// Release the hardware. Called exactly once per stream by [`CameraSession`].
    fn stop(&mut self);
}

/// Opens camera streams.
pub trait MediaSource: Send + Sync {
    fn open(&self, facing: CameraFacing) -> Result<Box<dyn MediaStream>, CameraError>;
}

pub struct CameraSession {
    source: Box<dyn MediaSource>,
    facing: CameraFacing,
    stream: Option<Box<dyn MediaStream>>,
}

impl CameraSession {
    pub fn new(source: Box<dyn MediaSource>) -> Self {
        Self {
            source,
            facing: CameraFacing::default(),
            stream: None,
        }
    }

    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Open a stream, stopping any previous one first.
    pub fn start(&mut self) -> Result<(), CameraError> {
        self.release();
        let stream = self.source.open(self.facing)?;
        self.stream = Some(stream);
        info!(facing = ?self.facing, "Camera stream started");
        Ok(())
    }

    /// Stop the live stream, if any.
    pub fn cancel(&mut self) {
        if self.release() {
            info!("Camera capture cancelled");
        }
    }

    /// Take one frame, release the stream, then run the capture profile.
    ///
    /// Normalization failures fall back to the raw frame.
    pub fn capture(&mut self, normalizer: &dyn ImageNormalizer) -> Result<PreparedImage, CameraError> {
        let mut stream = self.stream.take().ok_or(CameraError::NotStarted)?;
        let frame = stream.capture_frame();
        stream.stop();
        let frame = frame?;

        debug!(size = frame.len(), "Camera frame captured");
        Ok(prepare_or_original(normalizer, &frame, JPEG_MIME, NormalizeProfile::Capture))
    }

    fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                debug!("Camera stream stopped");
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}

// ═══════════════════════════════════════════════════════════
// Mock implementations (testing)
// ═══════════════════════════════════════════════════════════

/// In-memory camera that serves a fixed frame and counts opens/stops.
pub struct MockMediaSource {
    frame: Vec<u8>,
    deny: bool,
    counters: Arc<MockCounters>,
}

#[derive(Debug, Default)]
pub struct MockCounters {
    pub opened: AtomicUsize,
    pub stopped: AtomicUsize,
}

impl MockCounters {
    pub fn live(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }
}

impl MockMediaSource {
    pub fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            deny: false,
            counters: Default::default(),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn counters(&self) -> Arc<MockCounters> {
        self.counters.clone()
    }
}

struct MockStream {
    frame: Vec<u8>,
    counters: Arc<MockCounters>,
}

impl MediaStream for MockStream {
    fn capture_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        if self.frame.is_empty() {
            return Err(CameraError::Capture("empty frame".into()));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.counters
            .stopped
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl MediaSource for MockMediaSource {
    fn open(&self, _facing: CameraFacing) -> Result<Box<dyn MediaStream>, CameraError> {
        if self.deny {
            return Err(CameraError::PermissionDenied);
        }
        self.counters
            .opened
            .fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            frame: self.frame.clone(),
            counters: self.counters.clone(),
        }))
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
