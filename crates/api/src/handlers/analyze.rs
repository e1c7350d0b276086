//! Handler for the scan analysis proxy.
//!
//! Gate order: identity, then eligibility, then the image itself. Only a
//! successful oracle answer consumes a free scan.

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use image::ImageFormat;

use crate::error::{AppError, AppResult};
use crate::handlers::load_entitlement;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";

/// Formats the oracle accepts.
const ACCEPTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// POST /api/v1/analyze
///
/// Accepts `multipart/form-data` with an `image` field or a raw
/// `image/jpeg` body and returns the oracle's JSON unchanged.
pub async fn analyze(
    user: AuthUser,
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Json<serde_json::Value>> {
    let now = Utc::now();
    let entitlement = load_entitlement(&state, &user, now).await?;

    if let Err(denied) = entitlement.authorize_scan(now) {
        tracing::info!(user_id = %user.user_id, reason = %denied, "Scan denied");
        return Err(denied.into());
    }

    let image = read_image(&state, request).await?;
    check_image_format(&image)?;

    tracing::info!(
        user_id = %user.user_id,
        bytes = image.len(),
        premium = entitlement.subscription_tier.is_premium(),
        "Forwarding image to scoring oracle",
    );
    let report = state.oracle.score(image).await?;

    // The analysis already succeeded; a failed counter update is logged
    // rather than turned into an error for the caller.
    match state.entitlements.record_scan(user.user_id, Utc::now()).await {
        Ok(updated) => tracing::info!(
            user_id = %user.user_id,
            free_scans_remaining = updated.free_scans_remaining,
            total_scans = updated.total_scans,
            "Scan recorded",
        ),
        Err(e) => tracing::error!(
            user_id = %user.user_id,
            error = %e,
            "Failed to record completed scan",
        ),
    }

    Ok(Json(report))
}

/// Pull the image bytes out of either accepted body shape.
async fn read_image(state: &AppState, request: Request) -> AppResult<Vec<u8>> {
    let limit = state.config.scans.max_image_bytes;
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let image = if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut image = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            if field.name() == Some(IMAGE_FIELD) {
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                image = Some(bytes.to_vec());
                break;
            }
        }
        image.ok_or_else(|| AppError::BadRequest("No image file found in request".into()))?
    } else if content_type.starts_with("image/jpeg") {
        axum::body::to_bytes(request.into_body(), limit)
            .await
            .map_err(|_| AppError::PayloadTooLarge { limit })?
            .to_vec()
    } else {
        return Err(AppError::BadRequest(
            "Invalid content type. Expected multipart/form-data or image/jpeg".into(),
        ));
    };

    if image.is_empty() {
        return Err(AppError::BadRequest("Image is empty".into()));
    }
    if image.len() > limit {
        return Err(AppError::PayloadTooLarge { limit });
    }
    Ok(image)
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Reject bodies whose magic bytes are not a supported image format.
fn check_image_format(bytes: &[u8]) -> AppResult<()> {
    match image::guess_format(bytes) {
        Ok(format) if ACCEPTED_FORMATS.contains(&format) => Ok(()),
        _ => Err(AppError::BadRequest(
            "Unsupported image format. Expected JPEG, PNG or WebP".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_known_magic_bytes() {
        assert!(check_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]).is_ok());
        assert!(check_image_format(b"\x89PNG\r\n\x1a\n\0\0").is_ok());
    }

    #[test]
    fn rejects_other_bytes() {
        assert_matches!(check_image_format(b"GIF89a...."), Err(AppError::BadRequest(_)));
        assert_matches!(check_image_format(b"hello world"), Err(AppError::BadRequest(_)));
    }
}
