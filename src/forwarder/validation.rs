//! Upload validation: MIME allow-list, size cap, MIME inference for untyped parts.

use crate::config::ForwarderConfig;

use super::ForwardError;

const OCTET_STREAM: &str = "application/octet-stream";

/// One image upload, alive for the duration of a single request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl UploadRequest {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Strip parameters and lowercase: `"Image/JPEG; q=1"` -> `"image/jpeg"`.
pub fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Resolve the MIME type to validate against.
///
/// Browsers sometimes send camera blobs untyped. In that case the file name
/// extension is consulted, then the magic bytes.
pub fn effective_mime(declared: Option<&str>, file_name: Option<&str>, bytes: &[u8]) -> String {
    let declared = declared.map(essence).filter(|m| !m.is_empty() && m != OCTET_STREAM);
    if let Some(mime) = declared {
        return mime;
    }

    if let Some(guess) = file_name.and_then(|name| mime_guess::from_path(name).first()) {
        return guess.essence_str().to_string();
    }

    detect_mime_from_bytes(bytes).to_string()
}

/// Detect MIME type from file magic bytes.
pub fn detect_mime_from_bytes(bytes: &[u8]) -> &'static str {
    if bytes.len() < 4 {
        return OCTET_STREAM;
    }

    // JPEG: FF D8 FF
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    // PNG: 89 50 4E 47
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }
    // WebP: RIFF....WEBP
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return "image/webp";
    }
    // GIF: recognized so it can be rejected by name
    if bytes.starts_with(b"GIF8") {
        return "image/gif";
    }

    OCTET_STREAM
}

/// Check an upload against the forwarder's allow-list and size cap.
///
/// Runs before any network activity.
pub fn validate(upload: &UploadRequest, config: &ForwarderConfig) -> Result<(), ForwardError> {
    if upload.is_empty() {
        return Err(ForwardError::Validation("No image provided".into()));
    }

    let mime = essence(&upload.mime_type);
    if !config.is_allowed_mime(&mime) {
        return Err(ForwardError::Validation(format!(
            "Unsupported file type '{mime}'. Please upload a JPEG, PNG or WebP image."
        )));
    }

    if upload.len() > config.max_upload_bytes {
        return Err(ForwardError::Validation(format!(
            "File too large. Maximum {}MB.",
            config.max_upload_bytes / (1024 * 1024)
        )));
    }

    Ok(())
}
