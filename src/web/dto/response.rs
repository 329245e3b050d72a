//! Response DTOs.

use serde::Serialize;

use crate::service::UploadOutcome;
use crate::tree::DirectoryNode;

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ============================================================================
// Storage Responses
// ============================================================================

/// Result of `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Wall time of the whole upload, in milliseconds.
    pub upload_time_ms: u64,
    /// Files stored.
    pub files: usize,
    /// Chunks sent to the platform.
    pub chunks: usize,
    /// The user's tree after the merge.
    pub directory: DirectoryNode,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            message: "Files uploaded successfully".to_string(),
            upload_time_ms: outcome.elapsed.as_millis() as u64,
            files: outcome.files,
            chunks: outcome.chunks,
            directory: outcome.directory,
        }
    }
}

/// Result of `DELETE /delete/{id}`.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    /// Whether a node was removed.
    pub deleted: bool,
    /// The stored tree, when it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<DirectoryNode>,
}

// ============================================================================
// Service Description
// ============================================================================

/// One route in the service description.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}
