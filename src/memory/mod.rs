//! Agent Memory System
//!
//! Per-user conversation history and portfolio snapshots, shared by the
//! intent classifier, the portfolio tools and the agent loop.

pub mod postgres;
pub mod store;

pub use postgres::PostgresMemoryStore;
pub use store::{InMemoryMemoryStore, MemoryStore};

use crate::config::AdvisorConfig;
use std::sync::Arc;
use tracing::{info, warn};

/// Pick a backend from configuration: Postgres when a database URL is
/// configured and the pool can be set up, in-memory otherwise.
pub fn build_memory_store(config: &AdvisorConfig) -> Arc<dyn MemoryStore> {
    if let Some(url) = config.database_url.as_deref() {
        match PostgresMemoryStore::connect_lazy(url) {
            Ok(store) => {
                info!("Advisor memory backend: postgres");
                return Arc::new(store);
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres memory backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Advisor memory backend: in-memory");
    Arc::new(InMemoryMemoryStore::new())
}
