//! Persistence Layer
//!
//! Passthrough storage of trades, performance and win-rate snapshots, balance
//! state and bot logs in a hosted relational backend.
//!
//! # Backends
//! - [`PostgrestBackend`]: the hosted backend's REST interface
//! - [`MemoryBackend`]: in-process tables, used by tests and offline hosts
//!
//! # Tables
//! - `trades`: one row per trade, keyed by trade id
//! - `performance_snapshots`: periodic aggregate stats
//! - `winrate_snapshots`: rolling win-rate windows (1h/4h/24h/7d/30d)
//! - `bot_logs`: diagnostic messages
//! - `balance_snapshots`: wallet history
//! - `current_balance`: singleton row with id 1
//!
//! Every operation on [`PersistenceGateway`] degrades to a fallback value when the
//! backend is unconfigured or a call fails; callers never see an error.

pub mod gateway;
pub mod memory;
pub mod models;
pub mod postgrest;
pub mod query;

pub use gateway::{FallbackStats, PersistenceGateway};
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;
pub use query::{Filter, FilterOp, Order, Query};

use crate::config::BackendConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

/// Persistence error
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Backend not configured")]
    Unconfigured,

    #[error("Invalid backend endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Row-level operations against named tables.
///
/// Rows are JSON objects keyed by column name. Inserts, upserts and updates
/// return the rows they touched; deletes return only a count.
#[async_trait]
pub trait TableBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>>;

    /// Insert or replace rows by their `id` column
    async fn upsert(&self, table: &str, rows: Vec<Value>) -> PersistenceResult<Vec<Value>>;

    /// Merge `patch` into every row matching all `filters`
    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> PersistenceResult<Vec<Value>>;

    async fn select(&self, table: &str, query: &Query) -> PersistenceResult<Vec<Value>>;

    /// Delete every row matching all `filters`, returning how many were removed
    async fn delete(&self, table: &str, filters: &[Filter]) -> PersistenceResult<usize>;
}

/// Build the REST backend for `config`, logging and returning `None` on failure
pub fn connect(config: Option<&BackendConfig>) -> Option<Arc<dyn TableBackend>> {
    let config = config?;
    match PostgrestBackend::new(config) {
        Ok(backend) => {
            tracing::info!(url = %config.url, "✓ Backend client initialized");
            Some(Arc::new(backend))
        }
        Err(e) => {
            tracing::error!("Failed to initialize backend client: {}", e);
            None
        }
    }
}

static GATEWAY: OnceLock<PersistenceGateway> = OnceLock::new();

/// Process-wide gateway, built from the environment on first use
pub fn gateway() -> &'static PersistenceGateway {
    GATEWAY.get_or_init(|| {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        let config = BackendConfig::from_env();
        PersistenceGateway::new(connect(config.as_ref()))
    })
}
