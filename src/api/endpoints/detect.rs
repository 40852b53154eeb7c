//! `POST /api/detect-age`: receive a photo, forward it, return the canonical result.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::forwarder::{effective_mime, UploadRequest};
use crate::prediction::DetectResponse;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BadRequest("File too large. Maximum 10MB.".into())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Pull the first `image` part out of the form. Other fields are skipped.
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<UploadRequest>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let declared = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let mime = effective_mime(declared.as_deref(), file_name.as_deref(), &bytes);
        let mut upload = UploadRequest::new(bytes.to_vec(), mime);
        if let Some(name) = file_name {
            upload = upload.with_file_name(name);
        }
        return Ok(Some(upload));
    }

    Ok(None)
}

pub async fn detect_age(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let upload = read_image_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No image provided".into()))?;

    tracing::debug!(
        size = upload.len(),
        mime = %upload.mime_type,
        "Received detect-age upload"
    );

    let prediction = ctx.forwarder.submit(upload).await?;
    Ok(Json(DetectResponse::ok(prediction)))
}
