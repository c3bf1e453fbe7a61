use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use super::error::DatabaseError;

/// A persisted model mapped onto one table.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Every column, `id` included, in table order
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<Uuid>;
    fn set_id(&mut self, id: Uuid);

    /// Called by `save` before a new row is written
    fn before_insert(&mut self) {}
}

/// Storage operations available to controllers.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError>;

    /// Zero-based page of at most `size` models, ordered by id
    async fn list(&self, page: u32, size: u32) -> Result<Vec<T>, DatabaseError>;

    /// Insert or update; a model without an id gets a fresh one
    async fn save(&self, model: T) -> Result<T, DatabaseError>;

    /// Returns whether a row was removed
    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Models whose `field` equals `value` when compared as text
    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>, DatabaseError>;
}

/// Repository handle as stored in the container
pub type SharedRepository<T> = Arc<dyn Repository<T>>;

pub(crate) fn ensure_column<T: Entity>(field: &str) -> Result<(), DatabaseError> {
    if T::COLUMNS.contains(&field) {
        Ok(())
    } else {
        Err(DatabaseError::UnknownColumn {
            table: T::TABLE,
            column: field.to_string(),
        })
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// PostgreSQL repository mapping rows through `row_to_json`.
pub struct PgRepository<T> {
    pool: PgPool,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Entity> PgRepository<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    fn table() -> String {
        quote_identifier(T::TABLE)
    }

    fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<T>, DatabaseError> {
        rows.into_iter()
            .map(|row| {
                let value: Value = row.try_get("row")?;
                Ok(serde_json::from_value(value)?)
            })
            .collect()
    }

    fn upsert_sql() -> String {
        let table = Self::table();
        let updates: Vec<String> = T::COLUMNS
            .iter()
            .filter(|column| **column != "id")
            .map(|column| format!("{0} = EXCLUDED.{0}", quote_identifier(column)))
            .collect();
        let conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {table} SELECT * FROM json_populate_record(NULL::{table}, $1::json) ON CONFLICT (\"id\") {conflict}"
        )
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for PgRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE \"id\" = $1) t",
            Self::table()
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(|row| Self::decode_rows(vec![row]).map(|mut v| v.remove(0)))
            .transpose()
    }

    async fn list(&self, page: u32, size: u32) -> Result<Vec<T>, DatabaseError> {
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} ORDER BY \"id\" LIMIT $1 OFFSET $2) t",
            Self::table()
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(size))
            .bind(i64::from(page) * i64::from(size))
            .fetch_all(&self.pool)
            .await?;
        Self::decode_rows(rows)
    }

    async fn save(&self, mut model: T) -> Result<T, DatabaseError> {
        let id = match model.id() {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                model.set_id(id);
                model.before_insert();
                id
            }
        };

        let payload = serde_json::to_value(&model)?;
        sqlx::query(&Self::upsert_sql())
            .bind(payload)
            .execute(&self.pool)
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} after save", T::TABLE, id)))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE \"id\" = $1", Self::table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>, DatabaseError> {
        ensure_column::<T>(field)?;
        let sql = format!(
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM {} WHERE {}::text = $1 ORDER BY \"id\") t",
            Self::table(),
            quote_identifier(field)
        );
        let rows = sqlx::query(&sql).bind(value).fetch_all(&self.pool).await?;
        Self::decode_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Dummy;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_identifier("dummy"), "\"dummy\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn rejects_unknown_columns() {
        assert!(ensure_column::<Dummy>("field").is_ok());
        assert!(matches!(
            ensure_column::<Dummy>("field; DROP TABLE dummy"),
            Err(DatabaseError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn upsert_updates_every_non_id_column() {
        assert_eq!(
            PgRepository::<Dummy>::upsert_sql(),
            "INSERT INTO \"dummy\" SELECT * FROM json_populate_record(NULL::\"dummy\", $1::json) \
             ON CONFLICT (\"id\") DO UPDATE SET \"field\" = EXCLUDED.\"field\""
        );
    }
}
