//! Style configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted style: the user's original prompt paired with the generated
/// element→CSS mapping and an active flag.
///
/// At most one record in the whole store has `active = true` at any time;
/// zero is valid ("no active style").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Original natural-language prompt, immutable after creation.
    pub user_prompt: String,
    /// Mapping from semantic element name (e.g. "paragraph", "link_button")
    /// to a complete CSS declaration string. The reserved key
    /// `background_color` holds a bare color token instead.
    ///
    /// The key set is a contract with the generative collaborator, not
    /// enforced structurally here.
    pub styling_json: serde_json::Value,
    pub active: bool,
    /// Assignment timestamp, set by the store. History is ordered by this,
    /// descending.
    pub created_at: DateTime<Utc>,
}
