//! Client-side detection lifecycle.
//!
//! `idle → loading → {success, error}`; `error → idle` via dismiss;
//! `success | error → idle` via reset.

pub mod camera;
pub mod client;

use serde::Serialize;
use tracing::{info, warn};

use crate::normalizer::{prepare_or_original, ImageNormalizer, NormalizeProfile, PreparedImage};
use crate::prediction::NormalizedPrediction;

pub use camera::{CameraError, CameraFacing, CameraSession, MediaSource, MediaStream};
pub use client::{ClientError, DetectClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionState {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A detection is already in progress")]
    Busy,
    #[error("No image selected")]
    NoImageSelected,
    #[error("Cannot {action} while {state:?}")]
    Invalid {
        action: &'static str,
        state: DetectionState,
    },
}

/// Where the selected photo came from.
#[derive(Debug, Clone)]
pub enum SelectedImage {
    /// Picked from disk; normalized with the general profile at submit time.
    File { bytes: Vec<u8>, mime_type: String },
    /// Captured by [`CameraSession`]; already normalized.
    Captured(PreparedImage),
}

impl SelectedImage {
    pub fn file(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::File {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    fn prepare(&self, normalizer: &dyn ImageNormalizer) -> PreparedImage {
        match self {
            Self::File { bytes, mime_type } => {
                prepare_or_original(normalizer, bytes, mime_type, NormalizeProfile::General)
            }
            Self::Captured(prepared) => prepared.clone(),
        }
    }
}

/// One user's detection flow: selected image, lifecycle state, last outcome.
#[derive(Debug)]
pub struct DetectionSession {
    state: DetectionState,
    selected: Option<SelectedImage>,
    result: Option<NormalizedPrediction>,
    error: Option<String>,
}

impl Default for DetectionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionSession {
    pub fn new() -> Self {
        Self {
            state: DetectionState::Idle,
            selected: None,
            result: None,
            error: None,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    pub fn result(&self) -> Option<&NormalizedPrediction> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the selected image. Clears any previous outcome.
    pub fn select(&mut self, image: SelectedImage) -> Result<(), TransitionError> {
        if self.state == DetectionState::Loading {
            return Err(TransitionError::Busy);
        }
        self.selected = Some(image);
        self.result = None;
        self.error = None;
        self.state = DetectionState::Idle;
        Ok(())
    }

    /// Enter `Loading`. Returns the image to upload.
    pub fn begin(&mut self) -> Result<SelectedImage, TransitionError> {
        if self.state == DetectionState::Loading {
            return Err(TransitionError::Busy);
        }
        let image = self.selected.clone().ok_or(TransitionError::NoImageSelected)?;
        self.result = None;
        self.error = None;
        self.state = DetectionState::Loading;
        Ok(image)
    }

    /// Leave `Loading` with the request outcome.
    pub fn complete(&mut self, outcome: Result<NormalizedPrediction, String>) -> Result<(), TransitionError> {
        if self.state != DetectionState::Loading {
            return Err(TransitionError::Invalid {
                action: "complete",
                state: self.state,
            });
        }
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.state = DetectionState::Success;
            }
            Err(message) => {
                self.error = Some(message);
                self.state = DetectionState::Error;
            }
        }
        Ok(())
    }

    /// Clear the error banner. Keeps the selected image for a retry.
    pub fn dismiss(&mut self) -> Result<(), TransitionError> {
        if self.state != DetectionState::Error {
            return Err(TransitionError::Invalid {
                action: "dismiss",
                state: self.state,
            });
        }
        self.error = None;
        self.state = DetectionState::Idle;
        Ok(())
    }

    /// Discard image, result and error.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        if self.state == DetectionState::Loading {
            return Err(TransitionError::Busy);
        }
        self.selected = None;
        self.result = None;
        self.error = None;
        self.state = DetectionState::Idle;
        Ok(())
    }

    /// Normalize the selected image, upload it and record the outcome.
    ///
    /// Request failures land in `Error` state; only lifecycle misuse is returned.
    /// Dropping the future mid-request returns the session to `Idle` with the
    /// selected image kept.
    pub async fn submit(
        &mut self,
        client: &DetectClient,
        normalizer: &dyn ImageNormalizer,
    ) -> Result<DetectionState, TransitionError> {
        let image = self.begin()?;
        let guard = LoadingGuard { session: self };
        let prepared = image.prepare(normalizer);

        let outcome = match client.detect(&prepared).await {
            Ok(result) => {
                info!(age = result.age, age_range = %result.age_range, "Detection succeeded");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "Detection failed");
                Err(e.user_message())
            }
        };

        guard.session.complete(outcome)?;
        Ok(guard.session.state)
    }
}

/// Reverts an abandoned `Loading` state to `Idle` when dropped.
struct LoadingGuard<'a> {
    session: &'a mut DetectionSession,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.session.state == DetectionState::Loading {
            warn!("Detection request abandoned, returning to idle");
            self.session.state = DetectionState::Idle;
        }
    }
}
