// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete [`Database`] for the configured storage backend,
//! keeping the domain layer free of infrastructure types.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Select the persistence adapter at startup

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{Database, StorageBackend};
use crate::infrastructure::db::PostgresDatabase;
use crate::infrastructure::repositories::InMemoryDatabase;

/// Creates a Database implementation based on the configured backend.
/// PostgreSQL schemas are migrated when `migrate` is set.
pub async fn create_database(backend: &StorageBackend, migrate: bool) -> Result<Arc<dyn Database>> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory storage backend");
            Ok(Arc::new(InMemoryDatabase::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let database = PostgresDatabase::connect(config).await?;
            if migrate {
                database.migrate().await?;
            }
            info!(max_connections = config.max_connections, "Using PostgreSQL storage backend");
            Ok(Arc::new(database))
        }
    }
}
