use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::DatabaseError;
use super::repository::{ensure_column, Entity, Repository};

/// In-process repository used by the `test` environment.
pub struct MemoryRepository<T> {
    rows: RwLock<BTreeMap<Uuid, T>>,
}

impl<T: Entity> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the repository; models without an id get one.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let rows = records
            .into_iter()
            .map(|mut model| {
                let id = model.id().unwrap_or_else(|| {
                    let id = Uuid::new_v4();
                    model.set_id(id);
                    model.before_insert();
                    id
                });
                (id, model)
            })
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list(&self, page: u32, size: u32) -> Result<Vec<T>, DatabaseError> {
        let skip = (page as usize).saturating_mul(size as usize);
        Ok(self
            .rows
            .read()
            .await
            .values()
            .skip(skip)
            .take(size as usize)
            .cloned()
            .collect())
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
        self.rows.write().await.insert(id, model.clone());
        Ok(model)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.rows.write().await.remove(&id).is_some())
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<T>, DatabaseError> {
        ensure_column::<T>(field)?;
        let rows = self.rows.read().await;
        let mut found = Vec::new();
        for model in rows.values() {
            let json = serde_json::to_value(model)?;
            if json.get(field).and_then(text_of).as_deref() == Some(value) {
                found.push(model.clone());
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Dummy;

    #[tokio::test]
    async fn save_assigns_id_and_get_returns_it() {
        let repo = MemoryRepository::<Dummy>::new();
        let saved = repo.save(Dummy::new("hello")).await.unwrap();
        let id = saved.id.expect("id assigned");

        assert_eq!(repo.get(id).await.unwrap(), Some(saved));
        assert_eq!(repo.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_with_id_updates_in_place() {
        let repo = MemoryRepository::<Dummy>::new();
        let mut saved = repo.save(Dummy::new("one")).await.unwrap();
        saved.field = "two".to_string();
        repo.save(saved.clone()).await.unwrap();

        assert_eq!(repo.list(0, 10).await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn list_pages_through_rows() {
        let repo = MemoryRepository::with_records((0..5).map(|i| Dummy::new(format!("d{}", i))));
        assert_eq!(repo.list(0, 2).await.unwrap().len(), 2);
        assert_eq!(repo.list(2, 2).await.unwrap().len(), 1);
        assert!(repo.list(3, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let repo = MemoryRepository::<Dummy>::new();
        let id = repo.save(Dummy::new("x")).await.unwrap().id.unwrap();
        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn find_by_matches_text_value() {
        let repo = MemoryRepository::with_records(vec![Dummy::new("a"), Dummy::new("b"), Dummy::new("a")]);
        assert_eq!(repo.find_by("field", "a").await.unwrap().len(), 2);
        assert!(matches!(repo.find_by("nope", "a").await, Err(DatabaseError::UnknownColumn { .. })));
    }
}
