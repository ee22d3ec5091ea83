use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use tracing::warn;

use clothshare_types::api::ImageUploadResponse;

use crate::AppState;
use crate::error::ApiError;
use crate::storage::{IMAGE_EXTENSIONS, image_extension};

/// 10 MB limit for images
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// POST /upload/image. Multipart form with one `file` field.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let Some(ext) = image_extension(&original) else {
            warn!("Rejected upload with filename {:?}", original);
            return Err(ApiError::validation(format!(
                "Unsupported file type. Allowed: {}",
                IMAGE_EXTENSIONS.join(", ")
            )));
        };

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > MAX_IMAGE_SIZE {
            return Err(ApiError::PayloadTooLarge);
        }
        if bytes.is_empty() {
            return Err(ApiError::validation("Empty file"));
        }

        let filename = state.storage.save_image(&ext, &bytes).await?;
        return Ok(Json(ImageUploadResponse {
            image_url: format!("/uploads/{}", filename),
            filename,
        }));
    }

    Err(ApiError::validation("Missing file field"))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::validation(format!("Invalid multipart body: {}", e.body_text()))
    }
}
