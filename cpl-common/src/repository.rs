//! Keyed entity repository contract
//!
//! Engines depend only on this narrow interface (`get`, `query`, `add`,
//! `update`), one repository per entity type. Implementations:
//! - [`InMemoryRepository`]: process-local, used by tests and `--in-memory` runs
//! - `db::SqliteRepository`: JSON documents in SQLite (feature `sqlx`)
//!
//! Individual calls are atomic; sequences of calls are not.

use crate::models::Entity;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Predicate used by [`Repository::query`]
pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Async keyed store for one entity type
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Fetch by id; `Ok(None)` when absent
    async fn get(&self, id: Uuid) -> Result<Option<T>>;

    /// All entities matching `predicate`, in insertion order
    async fn query(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>>;

    /// Insert a new entity; fails if the id already exists
    async fn add(&self, entity: T) -> Result<T>;

    /// Replace an existing entity; `Error::NotFound` if the id is unknown
    async fn update(&self, entity: T) -> Result<T>;

    async fn all(&self) -> Result<Vec<T>> {
        self.query(&|_: &T| true).await
    }
}

/// Shared handle to a repository trait object
pub type SharedRepository<T> = Arc<dyn Repository<T>>;

/// Process-local repository backed by a vector
pub struct InMemoryRepository<T: Entity> {
    items: RwLock<Vec<T>>,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    /// Seed with existing entities
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn get(&self, id: Uuid) -> Result<Option<T>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id() == id).cloned())
    }

    async fn query(&self, predicate: Predicate<'_, T>) -> Result<Vec<T>> {
        let items = self.items.read().await;
        Ok(items.iter().filter(|item| predicate(item)).cloned().collect())
    }

    async fn add(&self, entity: T) -> Result<T> {
        let mut items = self.items.write().await;
        if items.iter().any(|item| item.id() == entity.id()) {
            return Err(Error::InvalidInput(format!(
                "{} {} already exists",
                T::TABLE,
                entity.id()
            )));
        }
        items.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<T> {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|item| item.id() == entity.id()) {
            Some(slot) => {
                *slot = entity.clone();
                Ok(entity)
            }
            None => Err(Error::not_found(T::TABLE, entity.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, OrganizationType, Prospect, ProspectSource};

    fn prospect(name: &str) -> Prospect {
        Prospect::new(
            name,
            OrganizationType::Nonprofit,
            Location::new("Boise", "ID", "US"),
            ProspectSource::Manual,
            Uuid::nil(),
        )
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let repo = InMemoryRepository::new();
        let added = repo.add(prospect("Boise Rivers")).await.unwrap();

        let fetched = repo.get(added.id).await.unwrap();
        assert_eq!(fetched, Some(added));
        assert_eq!(repo.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_id() {
        let repo = InMemoryRepository::new();
        let p = prospect("A");
        repo.add(p.clone()).await.unwrap();
        assert!(matches!(repo.add(p).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let repo: InMemoryRepository<Prospect> = InMemoryRepository::new();
        let result = repo.update(prospect("Ghost")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_query_filters_and_keeps_order() {
        let repo =
            InMemoryRepository::with_items(vec![prospect("A"), prospect("B"), prospect("C")]);
        let names: Vec<String> = repo
            .query(&|p: &Prospect| p.name != "B")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(repo.all().await.unwrap().len(), 3);
    }
}
