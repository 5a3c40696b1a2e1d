//! SQLite-backed repository
//!
//! Each entity is stored as a JSON document keyed by id. Queries load the
//! table and filter in process, matching the predicate-based contract.

use crate::models::Entity;
use crate::repository::{Predicate, Repository};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::marker::PhantomData;
use uuid::Uuid;

/// Repository for entity `T` over a shared pool
pub struct SqliteRepository<T: Entity> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SqliteRepository<T> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn decode(data: &str) -> Result<T> {
        serde_json::from_str(data).map_err(Error::Serialization)
    }
}

impl<T: Entity> Clone for SqliteRepository<T> {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for SqliteRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", T::TABLE);
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(data,)| Self::decode(&data)).transpose()
    }

    async fn query(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>> {
        let sql = format!("SELECT data FROM {} ORDER BY rowid", T::TABLE);
        let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut matches = Vec::new();
        for (data,) in rows {
            let entity = Self::decode(&data)?;
            if predicate(&entity) {
                matches.push(entity);
            }
        }
        Ok(matches)
    }

    async fn add(&self, entity: T) -> Result<T> {
        let sql = format!(
            "INSERT INTO {} (id, data, created_at, updated_at) VALUES (?, ?, ?, ?)",
            T::TABLE
        );
        let data = serde_json::to_string(&entity)?;
        let audit = entity.audit();

        sqlx::query(&sql)
            .bind(entity.id().to_string())
            .bind(data)
            .bind(audit.created_at.to_rfc3339())
            .bind(audit.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    Error::InvalidInput(format!("{} {} already exists", T::TABLE, entity.id()))
                }
                other => Error::Database(other),
            })?;

        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<T> {
        let sql = format!("UPDATE {} SET data = ?, updated_at = ? WHERE id = ?", T::TABLE);
        let data = serde_json::to_string(&entity)?;

        let result = sqlx::query(&sql)
            .bind(data)
            .bind(entity.audit().updated_at.to_rfc3339())
            .bind(entity.id().to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(T::TABLE, entity.id()));
        }
        Ok(entity)
    }
}
