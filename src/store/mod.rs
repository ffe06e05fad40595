//! Persistence for style history.

mod libsql_store;

pub use libsql_store::LibSqlStyleStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::styles::StyleConfig;

/// Backend-agnostic store for `StyleConfig` records.
///
/// Owns the single-active invariant: every path that activates a record
/// first clears all active flags, and does both inside one transaction so
/// concurrent activations can't leave two (or zero-where-one-was-expected)
/// active records behind.
#[async_trait]
pub trait StyleStore: Send + Sync {
    /// Insert a new record as the active style, deactivating the previous
    /// active record in the same transaction.
    async fn create(
        &self,
        user_prompt: &str,
        styling_json: &serde_json::Value,
    ) -> Result<StyleConfig, StoreError>;

    /// The unique active record, or `None` when no style is active.
    ///
    /// A backend failure is an error, never `None` — callers must not
    /// coalesce "no active style" with "could not determine".
    async fn get_active(&self) -> Result<Option<StyleConfig>, StoreError>;

    /// All records, newest first (`created_at` descending, insertion order
    /// breaking ties).
    async fn list_history(&self) -> Result<Vec<StyleConfig>, StoreError>;

    /// Make the record with `id` the single active style.
    ///
    /// `NotFound` rolls the whole operation back — the previous active
    /// record stays active.
    async fn activate(&self, id: Uuid) -> Result<StyleConfig, StoreError>;

    /// Clear every active flag. Idempotent.
    async fn deactivate_all(&self) -> Result<(), StoreError>;

    /// Delete the record with `id`.
    ///
    /// Refused with `DeleteActive` while the record is active, so the store
    /// never silently loses its current style.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
