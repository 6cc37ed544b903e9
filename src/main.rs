use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use file_router::{
    api,
    config::{Config, StorageBackend},
    object_store as obj,
    object_store::R2Store,
    placement::PlacementPolicy,
    router::StorageRouter,
    storage::Database,
    AppState,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "file-router starting");

    // Load configuration; missing backend settings fail here, not at request time
    let config = Config::load()?;

    // Initialize database
    let db = Database::open(&config.node.data_dir)?;
    info!("Database opened at: {}", config.node.data_dir);

    // Initialize object store backend
    let object_store: Arc<dyn obj::ObjectStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = obj::LocalStore::new(
                &config.storage.local_storage_path,
                &config.storage.local_public_base_url,
            )?;
            info!(
                "Using local storage backend at: {}",
                config.storage.local_storage_path
            );
            Arc::new(store)
        }
        StorageBackend::R2 => {
            let storage = &config.storage;
            let bucket = storage
                .r2_bucket
                .clone()
                .expect("R2_BUCKET validated in config");
            let store = R2Store::new(obj::R2Config {
                endpoint: storage
                    .r2_endpoint
                    .clone()
                    .expect("R2_ENDPOINT validated in config"),
                bucket: bucket.clone(),
                access_key_id: storage
                    .r2_access_key_id
                    .clone()
                    .expect("R2_ACCESS_KEY_ID validated in config"),
                secret_access_key: storage
                    .r2_secret_access_key
                    .clone()
                    .expect("R2_SECRET_ACCESS_KEY validated in config"),
                region: storage.r2_region.clone(),
                public_base_url: storage.r2_public_base_url.clone(),
                operation_timeout: Duration::from_secs(storage.operation_timeout_secs),
            })
            .await?;
            info!("Using R2 storage backend, bucket: {}", bucket);
            Arc::new(store)
        }
    };

    // Build the storage router
    let policy = PlacementPolicy::new(&config.placement);
    let router = StorageRouter::new(
        policy,
        object_store,
        Duration::from_secs(config.storage.signed_url_expiry_secs),
    );

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        router,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&state.config.node.bind_address).await?;
    info!("Listening on: {}", state.config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
