use crate::api::error::AppError;
use crate::utils::auth::Claims;
use axum::{
    Extension,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

/// Content type guessed from the stored extension; the classification set
/// mirrors the upload-side video extensions.
fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[utoipa::path(
    get,
    path = "/media/{path}",
    params(("path" = String, Path, description = "Stored media locator")),
    responses(
        (status = 200, description = "Media file bytes"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such media file")
    ),
    security(("jwt" = [])),
    tag = "returns"
)]
pub async fn get_media(
    State(state): State<crate::AppState>,
    Extension(_claims): Extension<Claims>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if path.split('/').any(|part| part == "..") {
        return Err(AppError::BadRequest("Invalid media path".to_string()));
    }

    let data = state
        .storage
        .get_file(&path)
        .await
        .map_err(|_| AppError::NotFound("Media file not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for("return_media/2026/01/02/a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("b.mp4"), "video/mp4");
        assert_eq!(content_type_for("c.unknown"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
