/**
 * Upload Routes
 * Admin image uploads and public retrieval by reference
 */
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;

use crate::{
    auth::RequireAdmin,
    error::{AppError, AppResult},
    uploads::{AssetError, AssetInfo, AssetStore, FetchedAsset, IncomingFile, MAX_FILES_PER_BATCH},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_path: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiUploadResponse {
    pub success: bool,
    pub file_paths: Vec<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadListing {
    pub strategy: String,
    pub count: usize,
    pub files: Vec<AssetInfo>,
}

/// Policy for stored uploads; scripts in uploaded SVG or mislabelled files never run.
pub(crate) const UPLOAD_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'";

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Validation("File too large. Maximum size is 5MB.".to_string())
    } else {
        AppError::Validation("Invalid multipart data".to_string())
    }
}

async fn read_file(field: Field<'_>) -> AppResult<IncomingFile> {
    let original_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(IncomingFile {
        original_name,
        content_type,
        bytes,
    })
}

fn log_store_failure(err: &AssetError, op: &'static str) {
    if matches!(err, AssetError::Backend(_)) {
        tracing::error!(op, error = %err, "upload backend failure");
    }
}

/// POST /api/upload - single `image` field
pub async fn upload_image(
    RequireAdmin(_session): RequireAdmin,
    State(assets): State<AssetStore>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") && file.is_none() {
            file = Some(read_file(field).await?);
        }
    }

    let file = file.ok_or_else(|| {
        AppError::Validation("No file uploaded or invalid file type".to_string())
    })?;

    let file_path = assets.save_file(file).await.inspect_err(|e| log_store_failure(e, "save"))?;

    Ok(Json(UploadResponse {
        success: true,
        file_path,
        message: "File uploaded successfully!".to_string(),
    }))
}

/// POST /api/upload/multiple - up to ten `images` fields
pub async fn upload_images(
    RequireAdmin(_session): RequireAdmin,
    State(assets): State<AssetStore>,
    mut multipart: Multipart,
) -> AppResult<Json<MultiUploadResponse>> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("images") {
            continue;
        }
        if files.len() == MAX_FILES_PER_BATCH {
            return Err(AppError::Validation(format!(
                "Too many files. Maximum is {} per upload.",
                MAX_FILES_PER_BATCH
            )));
        }
        files.push(read_file(field).await?);
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "No files uploaded or invalid file types".to_string(),
        ));
    }

    let file_paths = assets
        .save_files(files)
        .await
        .inspect_err(|e| log_store_failure(e, "save_batch"))?;

    Ok(Json(MultiUploadResponse {
        success: true,
        file_paths,
        message: "Files uploaded successfully!".to_string(),
    }))
}

/// GET /api/uploads/{reference}
pub async fn serve_upload(
    State(assets): State<AssetStore>,
    Path(reference): Path<String>,
) -> AppResult<Response> {
    let asset = assets
        .fetch(&reference)
        .await
        .inspect_err(|e| log_store_failure(e, "fetch"))?;

    match asset {
        FetchedAsset::Redirect(url) => Ok(Redirect::temporary(&url).into_response()),
        FetchedAsset::Inline { mime_type, bytes } => {
            let content_type = HeaderValue::from_str(&mime_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_LENGTH, HeaderValue::from(bytes.len())),
                    (
                        header::CACHE_CONTROL,
                        HeaderValue::from_static("public, max-age=31536000, immutable"),
                    ),
                    (
                        header::CONTENT_SECURITY_POLICY,
                        HeaderValue::from_static(UPLOAD_CSP),
                    ),
                ],
                bytes,
            )
                .into_response())
        }
    }
}

/// GET /api/debug/uploads
pub async fn list_uploads(
    RequireAdmin(_session): RequireAdmin,
    State(assets): State<AssetStore>,
) -> AppResult<Json<UploadListing>> {
    let files = assets
        .list()
        .await
        .inspect_err(|e| log_store_failure(e, "list"))?;

    Ok(Json(UploadListing {
        strategy: assets.strategy().as_str().to_string(),
        count: files.len(),
        files,
    }))
}
