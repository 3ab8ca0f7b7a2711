use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient::{id_opt, timestamp_opt, Id};

/// User notification, created server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default, deserialize_with = "id_opt::deserialize")]
    pub entity_id: Option<Id>,
    #[serde(default, alias = "read")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "timestamp_opt::deserialize")]
    pub created_at: Option<DateTime<Utc>>,
}
