use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::invalid_form;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    forms::FieldErrors,
    models::{PresignedUrlRequest, PresignedUrlResponse},
    storage::post_image_key,
};

/// get_presigned_url
///
/// [Authenticated Route] Issues a short-lived URL for uploading a post image
/// directly to object storage. The returned `resource_key` goes into the post
/// form's `image` field.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image type")
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Response> {
    if !payload.file_type.starts_with("image/") {
        let errors = FieldErrors::from([(
            "file_type".to_string(),
            vec!["Upload a valid image.".to_string()],
        )]);
        return Ok(invalid_form(payload, errors));
    }

    let object_key = post_image_key(user.id, &payload.filename, Uuid::new_v4());
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(AppError::Storage)?;

    tracing::debug!(user = %user.id, key = %object_key, "issued image upload url");
    let response = PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}
