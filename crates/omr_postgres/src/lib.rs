//! PostgreSQL adapter for the metadata store port.
//!
//! `schema.sql` at the crate root creates the `omr` schema and its two
//! tables; apply it once before connecting. The adapter never requires
//! a database at compile time.

pub mod sqlx_types;
pub mod store;

use anyhow::anyhow;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use omr_core::error::OmrError;

pub use store::PgMetadataStore;

/// Build a connection pool for the metadata store.
pub async fn connect(database_url: &str) -> Result<PgPool, OmrError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| OmrError::Internal(anyhow!(e)))
}
