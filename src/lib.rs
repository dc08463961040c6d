//! PR Reviewer Service - assigns pull request reviewers from the author's
//! team and keeps assignments balanced as people come and go.
//!
//! The engine lives in `services`; `db` provides the SQLite backend and
//! `services::api_server` exposes everything over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use config::{AppConfig, ConfigError, StorageBackend};
use services::api_server::{self, ApiState};
use services::assignment::AssignmentService;
use services::memory_store::InMemoryStore;
use services::selection::SelectionPolicy;
use services::store::ReviewStore;

/// Errors that stop the service from starting or running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database initialization failed: {0}")]
    Database(#[from] db::DbError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open the configured storage backend.
pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn ReviewStore>, StartupError> {
    match config.storage.backend {
        StorageBackend::Memory => {
            log::info!("[startup] Using in-memory storage");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = config.storage.path.as_deref().ok_or_else(|| {
                ConfigError::Invalid("storage.path is required for the sqlite backend".into())
            })?;
            let pool = db::initialize(path).await?;
            Ok(Arc::new(db::SqliteStore::new(pool)))
        }
    }
}

/// Wire the engine for the given configuration and store.
pub fn build_service(config: &AppConfig, store: Arc<dyn ReviewStore>) -> AssignmentService {
    AssignmentService::new(
        store,
        SelectionPolicy::from_entropy(config.review.max_reviewers),
        config.review.admin_ids.iter().cloned(),
    )
}

/// Run the HTTP service until `cancel` fires.
pub async fn run(config: AppConfig, cancel: CancellationToken) -> Result<(), StartupError> {
    config.validate()?;

    let store = build_store(&config).await?;
    let service = build_service(&config, store);

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    api_server::serve(listener, ApiState { service, cancel }).await?;
    Ok(())
}
