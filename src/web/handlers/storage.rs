//! Upload, retrieval and delete handlers.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::service::{
    delete_node, DeleteOutcome, Retrieval, RetrievalService, UploadRequest, UploadService,
    UploadedFile,
};
use crate::tree::DirectoryNode;
use crate::web::dto::{ApiResponse, DeleteResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::middleware::UserIdentifier;

use super::AppState;

/// Multipart part carrying one uploaded file.
pub const FILES_FIELD: &str = "files";
/// Multipart part carrying the declared tree as JSON text.
pub const STRUCTURE_FIELD: &str = "directoryStructure";

/// Build a Content-Disposition header value with proper escaping.
///
/// Control characters are dropped, quotes and backslashes replaced. Names
/// that are not plain ASCII also get an RFC 5987 `filename*` parameter.
pub fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let encoded = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

/// Name offered for a retrieved file: `name.ext`, unless `name` already ends
/// with that extension.
pub fn download_name(name: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => {
            let suffix = format!(".{}", ext.to_ascii_lowercase());
            if name.to_ascii_lowercase().ends_with(&suffix) {
                name.to_string()
            } else {
                format!("{}.{}", name, ext)
            }
        }
        _ => name.to_string(),
    }
}

/// Content type for a recovered extension. Compound extensions use their
/// last segment.
pub fn content_type_for(extension: Option<&str>) -> String {
    extension
        .and_then(|ext| ext.rsplit('.').next())
        .and_then(|ext| mime_guess::from_ext(ext).first())
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("Upload exceeds the maximum request size")
    } else {
        ApiError::bad_request("Invalid multipart data")
    }
}

/// POST /upload - Store files and merge their declared tree.
///
/// Request body: multipart/form-data with one `files` part per file and a
/// `directoryStructure` part holding the declared tree as JSON.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    UserIdentifier(user): UserIdentifier,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let mut files = Vec::new();
    let mut structure: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            FILES_FIELD => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("File part without a file name"))?;
                let content = field.bytes().await.map_err(multipart_error)?;
                files.push(UploadedFile::new(file_name, content));
            }
            STRUCTURE_FIELD => {
                structure = Some(field.text().await.map_err(multipart_error)?);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let structure = structure
        .ok_or_else(|| ApiError::unprocessable("Directory structure is missing"))?;
    let structure: DirectoryNode = serde_json::from_str(&structure).map_err(|e| {
        tracing::warn!("Malformed directory structure: {}", e);
        ApiError::unprocessable(format!("Malformed directory structure: {e}"))
    })?;

    let outcome = UploadService::new(&state.db, &state.store)
        .upload(&user, UploadRequest { structure, files })
        .await?;

    Ok(Json(ApiResponse::new(outcome.into())))
}

/// GET /retrieve/:identifier - Download a file or a directory archive.
pub async fn retrieve_resource(
    State(state): State<Arc<AppState>>,
    UserIdentifier(user): UserIdentifier,
    Path(identifier): Path<String>,
) -> Result<Response, ApiError> {
    let retrieval = RetrievalService::new(&state.db, &state.store)
        .retrieve(&user, &identifier)
        .await?;

    let response = match retrieval {
        Retrieval::File {
            name,
            extension,
            content,
        } => Response::builder()
            .header(header::CONTENT_TYPE, content_type_for(extension.as_deref()))
            .header(
                header::CONTENT_DISPOSITION,
                content_disposition_header(&download_name(&name, extension.as_deref())),
            )
            .header(header::CONTENT_LENGTH, content.len())
            .body(Body::from(content)),
        Retrieval::Archive { name, stream } => Response::builder()
            .header(header::CONTENT_TYPE, "application/zip")
            .header(
                header::CONTENT_DISPOSITION,
                content_disposition_header(&format!("{}.zip", name)),
            )
            .body(Body::from_stream(stream)),
    };

    response.map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::internal("Failed to build response")
    })
}

/// DELETE /delete/:identifier - Remove a node and its subtree.
///
/// Deleting an id that is not in the tree succeeds without changes.
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    UserIdentifier(user): UserIdentifier,
    Path(identifier): Path<String>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    let response = match delete_node(&state.db, &user, &identifier).await? {
        DeleteOutcome::Deleted(root) => DeleteResponse {
            message: "Resource deleted".to_string(),
            deleted: true,
            directory: Some(root),
        },
        DeleteOutcome::NotFound => DeleteResponse {
            message: "Resource not found, nothing deleted".to_string(),
            deleted: false,
            directory: None,
        },
    };

    Ok(Json(ApiResponse::new(response)))
}
