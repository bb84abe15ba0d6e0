use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::{
    Result, StateEntry, StateStoreError, Version,
    store::{PutOptions, StateOperation, StateStore, validate_operations},
};

/// PostgreSQL-backed state store implementation.
///
/// Values live in the `state_entries` table; the `version` column is the
/// ETag. Conditional writes are single statements guarded on that column, so
/// two writers holding the same version cannot both succeed.
#[derive(Clone)]
pub struct PostgresStateStore {
    pool: PgPool,
}

impl PostgresStateStore {
    /// Creates a new PostgreSQL state store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<StateEntry> {
        Ok(StateEntry {
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn stored_version(conn: &mut PgConnection, key: &str) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM state_entries WHERE key = $1")
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(version.map(Version::new).unwrap_or(Version::initial()))
    }

    async fn conflict(conn: &mut PgConnection, key: &str, expected: Version) -> StateStoreError {
        match Self::stored_version(conn, key).await {
            Ok(actual) => {
                tracing::debug!(key, %expected, %actual, "conditional write rejected");
                StateStoreError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    actual,
                }
            }
            Err(e) => e,
        }
    }

    async fn upsert(
        conn: &mut PgConnection,
        key: &str,
        value: &serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        let written: Option<i64> = match options.expected_version {
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO state_entries (key, value, version, updated_at)
                    VALUES ($1, $2, 1, NOW())
                    ON CONFLICT (key) DO UPDATE SET
                        value = EXCLUDED.value,
                        version = state_entries.version + 1,
                        updated_at = NOW()
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(value)
                .fetch_optional(&mut *conn)
                .await?
            }
            Some(expected) if expected == Version::initial() => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO state_entries (key, value, version, updated_at)
                    VALUES ($1, $2, 1, NOW())
                    ON CONFLICT (key) DO NOTHING
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(value)
                .fetch_optional(&mut *conn)
                .await?
            }
            Some(expected) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE state_entries
                    SET value = $2, version = version + 1, updated_at = NOW()
                    WHERE key = $1 AND version = $3
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(expected.as_i64())
                .fetch_optional(&mut *conn)
                .await?
            }
        };

        match (written, options.expected_version) {
            (Some(version), _) => Ok(Version::new(version)),
            (None, Some(expected)) => Err(Self::conflict(conn, key, expected).await),
            (None, None) => Err(StateStoreError::Unavailable(format!(
                "upsert of key '{key}' returned no row"
            ))),
        }
    }

    async fn remove(conn: &mut PgConnection, key: &str, options: PutOptions) -> Result<()> {
        match options.expected_version {
            None => {
                sqlx::query("DELETE FROM state_entries WHERE key = $1")
                    .bind(key)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
            Some(expected) if expected == Version::initial() => {
                let actual = Self::stored_version(conn, key).await?;
                if actual != Version::initial() {
                    return Err(StateStoreError::VersionConflict {
                        key: key.to_string(),
                        expected,
                        actual,
                    });
                }
                Ok(())
            }
            Some(expected) => {
                let result =
                    sqlx::query("DELETE FROM state_entries WHERE key = $1 AND version = $2")
                        .bind(key)
                        .bind(expected.as_i64())
                        .execute(&mut *conn)
                        .await?;
                if result.rows_affected() == 0 {
                    return Err(Self::conflict(conn, key, expected).await);
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl StateStore for PostgresStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateEntry>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT key, value, version, updated_at
            FROM state_entries
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_entry).transpose()
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        options: PutOptions,
    ) -> Result<Version> {
        let mut conn = self.pool.acquire().await?;
        Self::upsert(&mut conn, key, &value, options).await
    }

    async fn delete(&self, key: &str, options: PutOptions) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::remove(&mut conn, key, options).await
    }

    async fn transact(&self, operations: Vec<StateOperation>) -> Result<()> {
        validate_operations(&operations)?;

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;

        for op in &operations {
            match op {
                StateOperation::Upsert {
                    key,
                    value,
                    options,
                } => {
                    Self::upsert(&mut tx, key, value, *options).await?;
                }
                StateOperation::Delete { key, options } => {
                    Self::remove(&mut tx, key, *options).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
