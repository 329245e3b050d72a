//! Web server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::predicate::{DefaultPredicate, NotForContentType, Predicate};
use tower_http::compression::CompressionLayer;

use crate::config::ServerConfig;
use crate::storage::ChunkStore;
use crate::{DspaceError, Result};

use super::handlers::{AppState, SharedDatabase};
use super::router::{create_health_router, create_router};

/// HTTP server exposing the storage API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, db: SharedDatabase, store: Arc<ChunkStore>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| DspaceError::Config(format!("invalid server address: {e}")))?;

        let max_upload_size = config.max_upload_size_bytes()?;
        let app_state = AppState::new(db, store, &config.default_user, max_upload_size);

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            cors_origins: config.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn router(self) -> Router {
        // Archives are already deflated.
        let predicate = DefaultPredicate::new().and(NotForContentType::const_new("application/zip"));

        create_router(self.app_state, &self.cors_origins)
            .merge(create_health_router())
            .layer(CompressionLayer::new().compress_when(predicate))
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, self.router()).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        let router = self.router();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryPlatform, RetryPolicy};
    use crate::Database;
    use std::time::Duration;

    fn create_test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Use random port
            ..ServerConfig::default()
        }
    }

    async fn create_test_server(config: &ServerConfig) -> Result<WebServer> {
        let db = Database::open_in_memory().await?;
        let store = ChunkStore::connect(
            Arc::new(MemoryPlatform::new(2)),
            &RetryPolicy::fixed(Duration::from_millis(1)),
            RetryPolicy::fixed(Duration::from_millis(1)),
            1024,
        )
        .await?;
        WebServer::new(config, Arc::new(db), Arc::new(store))
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let server = create_test_server(&create_test_config()).await.unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_invalid_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..create_test_config()
        };
        let result = create_test_server(&config).await;
        assert!(matches!(result, Err(DspaceError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_rejects_oversized_upload_limit() {
        let config = ServerConfig {
            max_upload_size_mb: u64::MAX,
            ..create_test_config()
        };
        let result = create_test_server(&config).await;
        assert!(matches!(result, Err(DspaceError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let server = create_test_server(&create_test_config()).await.unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap();

        assert!(resp.status().is_success());
        assert_eq!(resp.text().await.unwrap(), "OK");
    }
}
