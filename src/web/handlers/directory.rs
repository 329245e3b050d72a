//! Directory listing and service description handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::service::get_directory;
use crate::tree::DirectoryNode;
use crate::web::dto::{ApiResponse, EndpointInfo, ServiceInfo};
use crate::web::error::ApiError;
use crate::web::middleware::UserIdentifier;

use super::AppState;

/// GET / - Describe the API.
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "dspace",
        version: env!("CARGO_PKG_VERSION"),
        description: "Per-user file storage backed by chunked message attachments",
        endpoints: vec![
            EndpointInfo {
                method: "POST",
                path: "/upload",
                description: "Upload files (multipart `files`) placed by a `directoryStructure` JSON tree",
            },
            EndpointInfo {
                method: "GET",
                path: "/retrieve/{id}",
                description: "Download a file, or a directory as a zip archive",
            },
            EndpointInfo {
                method: "DELETE",
                path: "/delete/{id}",
                description: "Remove a file or directory from the tree",
            },
            EndpointInfo {
                method: "GET",
                path: "/directory",
                description: "Return the caller's directory tree",
            },
            EndpointInfo {
                method: "GET",
                path: "/health",
                description: "Liveness probe",
            },
        ],
    })
}

/// GET /directory - Return the acting user's tree.
pub async fn get_user_directory(
    State(state): State<Arc<AppState>>,
    UserIdentifier(user): UserIdentifier,
) -> Result<Json<ApiResponse<DirectoryNode>>, ApiError> {
    let root = get_directory(&state.db, &user).await?;
    Ok(Json(ApiResponse::new(root)))
}
