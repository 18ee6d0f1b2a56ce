use crate::{
    db::DbPool,
    entities::counter::{Entity as CounterEntity},
    errors::ServiceError,
    services::codes,
};
use sea_orm::{ConnectionTrait, DbBackend, EntityTrait, Statement};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Sequence backing `PED-` order numbers
pub const ORDER_SEQUENCE: &str = "pedido";
/// Sequence backing `REM-` delivery note numbers
pub const DELIVERY_NOTE_SEQUENCE: &str = "remision";

/// Named monotonic counters stored in the `counters` table.
///
/// Allocation is a single upsert-returning statement, so concurrent callers
/// never observe the same value. Values allocated inside a transaction that
/// later rolls back are released along with it.
#[derive(Clone)]
pub struct SequenceService {
    db_pool: Arc<DbPool>,
}

impl SequenceService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Increments `name` and returns the new value. The first call returns 1.
    #[instrument(skip(self))]
    pub async fn next_value(&self, name: &str) -> Result<i64, ServiceError> {
        Self::next_value_in(&*self.db_pool, name).await
    }

    /// Same as [`Self::next_value`] on any connection, including an open transaction.
    pub async fn next_value_in<C>(conn: &C, name: &str) -> Result<i64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let backend = conn.get_database_backend();
        let sql = match backend {
            DbBackend::Postgres => {
                "INSERT INTO counters (name, seq) VALUES ($1, 1) \
                 ON CONFLICT (name) DO UPDATE SET seq = counters.seq + 1 RETURNING seq"
            }
            DbBackend::Sqlite => {
                "INSERT INTO counters (name, seq) VALUES (?, 1) \
                 ON CONFLICT (name) DO UPDATE SET seq = counters.seq + 1 RETURNING seq"
            }
            DbBackend::MySql => {
                return Err(ServiceError::InternalError(
                    "sequence allocation requires INSERT .. RETURNING".to_string(),
                ))
            }
        };

        let row = conn
            .query_one(Statement::from_sql_and_values(
                backend,
                sql,
                [name.into()],
            ))
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!("sequence '{}' returned no row", name))
            })?;

        let value: i64 = row.try_get("", "seq")?;
        metrics::counter!("ventas.sequence.allocated", 1, "sequence" => name.to_string());
        debug!(sequence = name, value, "allocated sequence value");
        Ok(value)
    }

    /// Last issued value for `name`, or 0 when nothing was issued yet.
    pub async fn current_value(&self, name: &str) -> Result<i64, ServiceError> {
        Ok(CounterEntity::find_by_id(name.to_string())
            .one(&*self.db_pool)
            .await?
            .map(|c| c.seq)
            .unwrap_or(0))
    }

    /// Allocates the next value of `sequence` and formats it as `{prefix}-{n}`.
    pub async fn next_code_in<C>(
        conn: &C,
        sequence: &str,
        prefix: &str,
        width: usize,
    ) -> Result<String, ServiceError>
    where
        C: ConnectionTrait,
    {
        let value = Self::next_value_in(conn, sequence).await?;
        let value = u64::try_from(value).map_err(|_| {
            ServiceError::InternalError(format!("sequence '{}' went negative", sequence))
        })?;
        Ok(codes::format_code_with_width(prefix, value, width))
    }
}
