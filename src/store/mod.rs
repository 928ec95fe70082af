//! Record stores: the persistence seam behind every API call.

mod bootstrap;
mod memory;
mod migration;
mod postgres;

pub use bootstrap::ensure_database_exists;
pub use memory::MemoryStore;
pub use migration::{apply_migrations, table_ddl};
pub use postgres::PgStore;

use crate::config::ResolvedEntity;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One entity-aware operation per call; ids arrive already parsed for the entity's PK type.
/// Rows are JSON objects keyed by column name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError>;

    /// Rows whose `column` equals any of `values`. Used for batch-loading includes.
    async fn find_where_in(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        values: &[Value],
    ) -> Result<Vec<Value>, AppError>;

    /// Exact-match filters, ordered by primary key.
    async fn list(
        &self,
        entity: &ResolvedEntity,
        filters: &[(String, Value)],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Value>, AppError>;

    async fn create(&self, entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<Value, AppError>;

    /// Writes the writable columns present in `body`. `None` when no row has `id`.
    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError>;

    /// Returns the deleted row, `None` when no row has `id`.
    async fn delete(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}
