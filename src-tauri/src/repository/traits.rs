//! Repository Layer - Store Contract
//!
//! Groups and POMs are persisted through the same contract. The store owns
//! identity and timestamps; callers pass entities with a placeholder id on
//! create and get back what was actually written.

use async_trait::async_trait;
use crate::domain::{DomainError, DomainResult, Entity};

/// Persistence for one kind of hierarchy entity
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Label used in error messages, e.g. "Group 7 not found"
    const KIND: &'static str;

    /// Validate, assign an id and timestamps, and store. The referenced
    /// parent group must exist.
    async fn create(&self, entity: &T) -> DomainResult<T>;

    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// Like `find_by_id`, but a missing row is `NotFound`
    async fn get(&self, id: T::Id) -> DomainResult<T> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("{} {} not found", Self::KIND, id)))
    }

    /// Every stored entity, in a stable display order
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Write the editable fields and return the stored row. Placement in
    /// the hierarchy changes through the hierarchy operations only.
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Remove the entity. A group's children and POMs are detached to the
    /// root; a POM's elements go with it.
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}
