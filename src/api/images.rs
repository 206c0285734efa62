//! Portfolio image upload

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, header::CONTENT_TYPE},
};

use super::reply::ApiReply;
use crate::AppState;
use crate::auth::RequestSession;
use crate::error::AppError;
use crate::service::{ImageKind, MAX_IMAGE_BYTES};

/// POST /api/upload_image
///
/// The body is the raw image; `Content-Type` names its format. Replies with
/// `{"url": ...}` pointing at the stored copy.
pub async fn upload_image(
    State(state): State<AppState>,
    RequestSession(mut session): RequestSession,
    headers: HeaderMap,
    body: Body,
) -> Result<ApiReply, AppError> {
    let id = state.auth.current_login(&mut session).await?;

    let kind = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(ImageKind::from_content_type)
        .ok_or_else(|| {
            AppError::Validation("wrong image format (only PNG and JPEG are supported)".to_string())
        })?;

    let data = axum::body::to_bytes(body, MAX_IMAGE_BYTES)
        .await
        .map_err(|_| AppError::Validation("image too large (5MB max)".to_string()))?;

    tracing::debug!(
        identity_id = %id,
        format = kind.extension(),
        size = data.len(),
        "Image upload received"
    );
    let url = state.images.upload(kind, data.to_vec()).await?;
    Ok(ApiReply::Json(serde_json::json!({ "url": url })))
}
