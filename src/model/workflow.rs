//! Server-owned approval workflow snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient::{timestamp_opt, Id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Workflow attached to an order, payment, invoice or document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Workflow {
    pub pipeline: Vec<String>,
    pub current_stage: Option<String>,
    pub completed_stages: Vec<String>,
    pub pending_stages: Vec<String>,
    pub approval_status: ApprovalStatus,
    #[serde(deserialize_with = "timestamp_opt::deserialize")]
    pub current_sla_expires_at: Option<DateTime<Utc>>,
}

/// Kind of entity a workflow is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Order,
    Invoice,
    Payment,
    Document,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "order",
            EntityKind::Invoice => "invoice",
            EntityKind::Payment => "payment",
            EntityKind::Document => "document",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a workflow-bearing entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Id,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<Id>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}
