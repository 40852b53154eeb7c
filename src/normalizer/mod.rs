//! Client-side image normalization before upload.
//!
//! Pure bytes-to-bytes transform: no I/O, fully testable.
//!
//! Pipeline flow:
//! 1. Decode (with EXIF orientation correction)
//! 2. Resize: longest edge to 512 (general) or centered square to 512×512 (capture)
//! 3. Measure mean luminance, pick a brightness tier
//! 4. Brightness/contrast pass on the RGBA buffer
//! 5. Re-encode as JPEG
//!
//! Any failure falls back to the original bytes via [`prepare_or_original`].

pub mod geometry;
pub mod pixels;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use crate::forwarder::validation::detect_mime_from_bytes;

pub use geometry::{center_square, compute_fit_dimensions};
pub use pixels::{Adjustment, BrightnessTier, PixelBuffer};

/// Longest output edge for both profiles.
pub const TARGET_EDGE: u32 = 512;

pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Image data is empty")]
    Empty,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("{0}")]
    Encode(String),
}

/// Which source the image came from. Selects geometry and JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeProfile {
    /// Picked from disk: fit inside 512 px, never upscale.
    General,
    /// Camera frame: centered square scaled to exactly 512×512.
    Capture,
}

impl NormalizeProfile {
    pub fn jpeg_quality(self) -> u8 {
        match self {
            Self::General => 92,
            Self::Capture => 95,
        }
    }
}

/// The bytes that will actually be uploaded, plus what happened to them.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Output dimensions. `None` when the original bytes were kept undecoded.
    pub dimensions: Option<(u32, u32)>,
    pub mean_luminance: Option<f64>,
    pub tier: Option<BrightnessTier>,
    pub enhanced: bool,
}

impl PreparedImage {
    /// Wrap unmodified bytes. Used when normalization fails.
    pub fn original(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            dimensions: None,
            mean_luminance: None,
            tier: None,
            enhanced: false,
        }
    }

    /// File name to send with the multipart part.
    pub fn file_name(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "image.png",
            "image/webp" => "image.webp",
            _ => "image.jpg",
        }
    }
}

/// Turns a selected or captured photo into upload bytes.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8], profile: NormalizeProfile) -> Result<PreparedImage, NormalizeError>;
}

/// Run the normalizer, keeping the original bytes on any failure.
///
/// Failures are logged and never surfaced.
pub fn prepare_or_original(
    normalizer: &dyn ImageNormalizer,
    bytes: &[u8],
    mime_type: &str,
    profile: NormalizeProfile,
) -> PreparedImage {
    match normalizer.normalize(bytes, profile) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!(error = %e, ?profile, size = bytes.len(), "Image normalization failed, sending original");
            let mime = if mime_type.is_empty() {
                detect_mime_from_bytes(bytes).to_string()
            } else {
                mime_type.to_string()
            };
            PreparedImage::original(bytes.to_vec(), mime)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Production implementation
// ═══════════════════════════════════════════════════════════

/// Orientation fix, resize, luminance-tiered enhancement, JPEG.
#[derive(Debug, Clone)]
pub struct EnhancingNormalizer {
    enhance: bool,
}

impl Default for EnhancingNormalizer {
    fn default() -> Self {
        Self { enhance: true }
    }
}

impl EnhancingNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize and re-encode only; skip the brightness/contrast pass.
    pub fn without_enhancement() -> Self {
        Self { enhance: false }
    }

    fn decode(bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
        if bytes.is_empty() {
            return Err(NormalizeError::Empty);
        }
        let img = image::load_from_memory(bytes).map_err(|e| NormalizeError::Decode(e.to_string()))?;
        Ok(geometry::apply_orientation(img, geometry::read_exif_orientation(bytes)))
    }

    fn resize(img: &DynamicImage, profile: NormalizeProfile) -> PixelBuffer {
        let (w, h) = img.dimensions();
        let resized = match profile {
            NormalizeProfile::General => {
                let (tw, th) = compute_fit_dimensions(w, h, TARGET_EDGE);
                image::imageops::resize(&img.to_rgba8(), tw, th, FilterType::CatmullRom)
            }
            NormalizeProfile::Capture => {
                let (x, y, side) = center_square(w, h);
                let square = img.crop_imm(x, y, side.max(1), side.max(1)).to_rgba8();
                image::imageops::resize(&square, TARGET_EDGE, TARGET_EDGE, FilterType::CatmullRom)
            }
        };
        PixelBuffer::new(resized)
    }
}

impl ImageNormalizer for EnhancingNormalizer {
    fn normalize(&self, bytes: &[u8], profile: NormalizeProfile) -> Result<PreparedImage, NormalizeError> {
        let img = Self::decode(bytes)?;
        let (orig_w, orig_h) = img.dimensions();

        let mut buffer = Self::resize(&img, profile);
        let dimensions = (buffer.width(), buffer.height());

        let mean = buffer.mean_luminance();
        let tier = BrightnessTier::classify(mean);
        if self.enhance {
            buffer.apply(tier.adjustment());
        }

        let out = buffer.encode_jpeg(profile.jpeg_quality())?;

        debug!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{}x{}", dimensions.0, dimensions.1),
            mean_luminance = mean,
            ?tier,
            enhanced = self.enhance,
            in_size = bytes.len(),
            out_size = out.len(),
            "Image normalized for upload"
        );

        Ok(PreparedImage {
            bytes: out,
            mime_type: JPEG_MIME.to_string(),
            dimensions: Some(dimensions),
            mean_luminance: Some(mean),
            tier: Some(tier),
            enhanced: self.enhance,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Mock implementations (testing)
// ═══════════════════════════════════════════════════════════

/// Mock normalizer: passes bytes through as JPEG, or always fails.
pub struct MockImageNormalizer {
    fail: bool,
}

impl MockImageNormalizer {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageNormalizer for MockImageNormalizer {
    fn normalize(&self, bytes: &[u8], _profile: NormalizeProfile) -> Result<PreparedImage, NormalizeError> {
        if self.fail {
            return Err(NormalizeError::Decode("Mock normalization failure".into()));
        }
        Ok(PreparedImage {
            bytes: bytes.to_vec(),
            mime_type: JPEG_MIME.to_string(),
            dimensions: Some((TARGET_EDGE, TARGET_EDGE)),
            mean_luminance: Some(128.0),
            tier: Some(BrightnessTier::Mid),
            enhanced: false,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
