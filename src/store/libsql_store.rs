//! libSQL backend — async `StyleStore` implementation.
//!
//! Supports local file and in-memory databases. `libsql::Connection` is
//! `Send + Sync` and safe for concurrent async use; activation paths run
//! as transactions so the single-active invariant holds across writers.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::StyleStore;
use crate::styles::StyleConfig;

const STYLE_COLUMNS: &str = "id, user_prompt, styling_json, active, created_at";

/// libSQL style store.
pub struct LibSqlStyleStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStyleStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Backend(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Style store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Backend(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Idempotent schema setup.
    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS styles (
                    id TEXT PRIMARY KEY,
                    user_prompt TEXT NOT NULL,
                    styling_json TEXT NOT NULL,
                    active INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_styles_active ON styles(active);",
            )
            .await
            .map_err(|e| StoreError::Backend(format!("Schema setup failed: {e}")))?;
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string (our canonical write format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Map a libsql row to a StyleConfig. Column order matches STYLE_COLUMNS.
fn row_to_style(row: &libsql::Row) -> Result<StyleConfig, StoreError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;
    let user_prompt: String = row
        .get(1)
        .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;
    let styling_str: String = row
        .get(2)
        .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;
    let active: i64 = row
        .get(3)
        .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;
    let created_str: String = row
        .get(4)
        .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Backend(format!("Corrupt style id '{id_str}': {e}")))?;
    let styling_json = serde_json::from_str(&styling_str)
        .map_err(|e| StoreError::Backend(format!("Corrupt styling_json for {id}: {e}")))?;

    Ok(StyleConfig {
        id,
        user_prompt,
        styling_json,
        active: active != 0,
        created_at: parse_datetime(&created_str),
    })
}

fn query_err(e: libsql::Error) -> StoreError {
    StoreError::Backend(format!("Query failed: {e}"))
}

#[async_trait]
impl StyleStore for LibSqlStyleStore {
    async fn create(
        &self,
        user_prompt: &str,
        styling_json: &serde_json::Value,
    ) -> Result<StyleConfig, StoreError> {
        let style = StyleConfig {
            id: Uuid::new_v4(),
            user_prompt: user_prompt.to_string(),
            styling_json: styling_json.clone(),
            active: true,
            created_at: Utc::now(),
        };

        let tx = self.conn.transaction().await.map_err(query_err)?;
        tx.execute("UPDATE styles SET active = 0 WHERE active = 1", ())
            .await
            .map_err(query_err)?;
        tx.execute(
            "INSERT INTO styles (id, user_prompt, styling_json, active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                style.id.to_string(),
                style.user_prompt.clone(),
                style.styling_json.to_string(),
                style.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        info!(style_id = %style.id, "Style created and activated");
        Ok(style)
    }

    async fn get_active(&self) -> Result<Option<StyleConfig>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {STYLE_COLUMNS} FROM styles WHERE active = 1 LIMIT 1"),
                (),
            )
            .await
            .map_err(query_err)?;

        match rows.next().await.map_err(query_err)? {
            Some(row) => Ok(Some(row_to_style(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_history(&self) -> Result<Vec<StyleConfig>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {STYLE_COLUMNS} FROM styles
                     ORDER BY created_at DESC, rowid DESC"
                ),
                (),
            )
            .await
            .map_err(query_err)?;

        let mut styles = Vec::new();
        while let Some(row) = rows.next().await.map_err(query_err)? {
            styles.push(row_to_style(&row)?);
        }
        Ok(styles)
    }

    async fn activate(&self, id: Uuid) -> Result<StyleConfig, StoreError> {
        let tx = self.conn.transaction().await.map_err(query_err)?;

        let mut rows = tx
            .query(
                &format!("SELECT {STYLE_COLUMNS} FROM styles WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = rows.next().await.map_err(query_err)? else {
            // Dropping the transaction rolls back; nothing was touched.
            return Err(StoreError::NotFound { id });
        };
        let mut style = row_to_style(&row)?;

        tx.execute("UPDATE styles SET active = 0 WHERE active = 1", ())
            .await
            .map_err(query_err)?;
        tx.execute(
            "UPDATE styles SET active = 1 WHERE id = ?1",
            params![id.to_string()],
        )
        .await
        .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        style.active = true;
        info!(style_id = %id, "Style activated");
        Ok(style)
    }

    async fn deactivate_all(&self) -> Result<(), StoreError> {
        self.conn
            .execute("UPDATE styles SET active = 0 WHERE active = 1", ())
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let tx = self.conn.transaction().await.map_err(query_err)?;

        let mut rows = tx
            .query(
                "SELECT active FROM styles WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = rows.next().await.map_err(query_err)? else {
            return Err(StoreError::NotFound { id });
        };
        let active: i64 = row
            .get(0)
            .map_err(|e| StoreError::Backend(format!("Row read failed: {e}")))?;
        if active != 0 {
            return Err(StoreError::DeleteActive { id });
        }

        tx.execute("DELETE FROM styles WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;

        info!(style_id = %id, "Style deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> LibSqlStyleStore {
        LibSqlStyleStore::new_memory().await.unwrap()
    }

    fn config(color: &str) -> serde_json::Value {
        serde_json::json!({ "paragraph": format!("color: {color};") })
    }

    #[tokio::test]
    async fn create_activates_new_and_deactivates_old() {
        let store = memory_store().await;

        let a = store
            .create("dark cyberpunk theme", &config("#0ff"))
            .await
            .unwrap();
        assert!(a.active);

        let b = store.create("warm minimal", &config("#3d2e2e")).await.unwrap();
        assert!(b.active);

        let active = store.get_active().await.unwrap().unwrap();
        assert_eq!(active.id, b.id);

        // At most one active record, ever.
        let history = store.list_history().await.unwrap();
        assert_eq!(history.iter().filter(|s| s.active).count(), 1);
    }

    #[tokio::test]
    async fn get_active_on_empty_store_is_none() {
        let store = memory_store().await;
        assert!(store.get_active().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let store = memory_store().await;
        let mut ids = Vec::new();
        for i in 0..4 {
            let style = store
                .create(&format!("style {i}"), &config("#333"))
                .await
                .unwrap();
            ids.push(style.id);
        }

        let history = store.list_history().await.unwrap();
        assert_eq!(history.len(), 4);
        ids.reverse();
        let listed: Vec<Uuid> = history.iter().map(|s| s.id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn activate_switches_single_active() {
        let store = memory_store().await;
        let a = store.create("first", &config("#111")).await.unwrap();
        let b = store.create("second", &config("#222")).await.unwrap();

        let activated = store.activate(a.id).await.unwrap();
        assert!(activated.active);
        assert_eq!(activated.id, a.id);

        let active = store.get_active().await.unwrap().unwrap();
        assert_eq!(active.id, a.id);

        let history = store.list_history().await.unwrap();
        let b_row = history.iter().find(|s| s.id == b.id).unwrap();
        assert!(!b_row.active);
    }

    #[tokio::test]
    async fn activate_unknown_id_leaves_active_untouched() {
        let store = memory_store().await;
        let a = store.create("only", &config("#111")).await.unwrap();

        let err = store.activate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        // The deactivate-all half must not have been left applied.
        let active = store.get_active().await.unwrap().unwrap();
        assert_eq!(active.id, a.id);
    }

    #[tokio::test]
    async fn deactivate_all_is_idempotent() {
        let store = memory_store().await;
        store.create("style", &config("#111")).await.unwrap();

        store.deactivate_all().await.unwrap();
        assert!(store.get_active().await.unwrap().is_none());

        // Second call: no error, no state change.
        store.deactivate_all().await.unwrap();
        assert!(store.get_active().await.unwrap().is_none());
        assert_eq!(store.list_history().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_active_refused_store_unchanged() {
        let store = memory_store().await;
        let a = store.create("active one", &config("#111")).await.unwrap();

        let err = store.delete(a.id).await.unwrap_err();
        assert!(matches!(err, StoreError::DeleteActive { .. }));

        let history = store.list_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].active);
    }

    #[tokio::test]
    async fn delete_inactive_succeeds() {
        let store = memory_store().await;
        let b = store.create("old", &config("#111")).await.unwrap();
        let a = store.create("new", &config("#222")).await.unwrap();

        store.delete(b.id).await.unwrap();

        let history = store.list_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, a.id);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let store = memory_store().await;
        let err = store.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn styling_json_round_trips() {
        let store = memory_store().await;
        let config = serde_json::json!({
            "paragraph": "color: #e8eaed; line-height: 1.6;",
            "background_color": "#1a1a1a",
        });
        let created = store.create("dark", &config).await.unwrap();

        let loaded = store.get_active().await.unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.styling_json, config);
        assert_eq!(loaded.user_prompt, "dark");
    }

    #[tokio::test]
    async fn local_store_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("styles.db");
        let store = LibSqlStyleStore::new_local(&db_path).await.unwrap();
        store.create("persisted", &config("#111")).await.unwrap();
        assert!(db_path.exists());
    }
}
