use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use dspace::config::StorageBackend;
use dspace::storage::{ChunkStore, DiscordPlatform, MemoryPlatform, StoragePlatform};
use dspace::web::WebServer;
use dspace::{Config, Database, UserRepository};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = dspace::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        dspace::logging::init_console_only(&config.logging.level);
    }

    info!("Dspace - chunked file storage");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> dspace::Result<()> {
    config.validate()?;

    let db = Database::open(&config.database.path).await?;
    let user = UserRepository::new(db.pool())
        .ensure(&config.server.default_user)
        .await?;
    info!(user = %user.username, "Default user ready");

    let storage = &config.storage;
    let platform: Arc<dyn StoragePlatform> = match storage.backend {
        StorageBackend::Discord => Arc::new(DiscordPlatform::new(storage)?),
        StorageBackend::Memory => {
            if storage.channels.is_empty() {
                Arc::new(MemoryPlatform::new(1))
            } else {
                Arc::new(MemoryPlatform::with_channel_ids(&storage.channels))
            }
        }
    };

    let store = ChunkStore::connect(
        platform,
        &storage.login_retry_policy(),
        storage.retry_policy(),
        storage.chunk_size_bytes()?,
    )
    .await?;

    info!(
        backend = ?storage.backend,
        channels = store.distributor().len(),
        chunk_size = store.chunk_size(),
        "Chunk store connected"
    );

    let server = WebServer::new(&config.server, Arc::new(db), Arc::new(store))?;
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await?;

    Ok(())
}
