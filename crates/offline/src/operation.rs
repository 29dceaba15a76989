//! Queued mutations and the identifiers they point at.
//!
//! An entity created offline has no server identifier yet. It is tracked
//! under a client-generated [`TempId`] and every operation that targets it
//! carries an [`EntityRef::Local`]; once the create is confirmed the queue
//! rewrites those references to [`EntityRef::Server`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::OfflineError;

const TEMP_PREFIX: &str = "tmp-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Trip,
    DiaryEntry,
    Place,
}

impl EntityType {
    /// Diary entries and places live inside a trip and are created under it.
    pub fn needs_parent(self) -> bool {
        matches!(self, Self::DiaryEntry | Self::Place)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Syncing,
    Completed,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.pad(s)
    }
}

/// Client-generated handle of an entity the server has not seen yet.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    pub fn generate() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TempId {
    type Err = OfflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TEMP_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(Self(s.to_string())),
            _ => Err(OfflineError::InvalidArgument(format!(
                "temporary ids start with `{TEMP_PREFIX}`: {s}"
            ))),
        }
    }
}

/// Reference to an entity, either by temporary handle or by server id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Local(TempId),
    Server(String),
}

impl EntityRef {
    pub fn local(&self) -> Option<&TempId> {
        match self {
            Self::Local(temp_id) => Some(temp_id),
            Self::Server(_) => None,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(temp_id) => write!(f, "{temp_id}"),
            Self::Server(id) => f.write_str(id),
        }
    }
}

/// `tmp-…` parses as a local handle, anything else as a server id.
impl FromStr for EntityRef {
    type Err = OfflineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OfflineError::InvalidArgument(
                "empty entity reference".to_string(),
            ));
        }
        if s.starts_with(TEMP_PREFIX) {
            return s.parse().map(Self::Local);
        }
        Ok(Self::Server(s.to_string()))
    }
}

/// A mutation as handed to [`crate::OfflineQueue::enqueue`].
#[derive(Clone, Debug)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub entity: EntityType,
    /// Entity the operation applies to. For creates this is the temporary
    /// handle of the new entity (generated when absent).
    pub target: Option<EntityRef>,
    /// The trip a diary entry or place is created under.
    pub parent: Option<EntityRef>,
    pub payload: Value,
}

impl NewOperation {
    pub fn create(entity: EntityType, payload: Value) -> Self {
        Self {
            kind: OperationKind::Create,
            entity,
            target: None,
            parent: None,
            payload,
        }
    }

    pub fn update(entity: EntityType, target: EntityRef, payload: Value) -> Self {
        Self {
            kind: OperationKind::Update,
            entity,
            target: Some(target),
            parent: None,
            payload,
        }
    }

    pub fn delete(entity: EntityType, target: EntityRef) -> Self {
        Self {
            kind: OperationKind::Delete,
            entity,
            target: Some(target),
            parent: None,
            payload: Value::Null,
        }
    }

    #[must_use]
    pub fn temp_id(mut self, temp_id: TempId) -> Self {
        self.target = Some(EntityRef::Local(temp_id));
        self
    }

    #[must_use]
    pub fn parent(mut self, parent: EntityRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: Uuid,
    /// Enqueue order; replay follows it.
    pub seq: u64,
    pub kind: OperationKind,
    pub entity: EntityType,
    pub target: EntityRef,
    pub parent: Option<EntityRef>,
    pub payload: Value,
    pub status: OperationStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueuedOperation {
    /// Whether the operation still points at `temp_id`, as target or parent.
    pub fn references(&self, temp_id: &TempId) -> bool {
        self.target.local() == Some(temp_id)
            || self.parent.as_ref().and_then(EntityRef::local) == Some(temp_id)
    }
}

/// Local copy of an entity created through the queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity {
    pub temp_id: TempId,
    pub entity: EntityType,
    /// Set once the create has been confirmed by the server.
    pub server_id: Option<String>,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

/// Durable marker of whether a replay run is in progress.
///
/// A `Syncing` token found on startup means the previous run was interrupted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QueueState {
    #[default]
    Idle,
    Syncing { started_at: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ref_parses_temp_and_server_ids() {
        let temp = TempId::generate();
        assert_eq!(
            temp.as_str().parse::<EntityRef>().unwrap(),
            EntityRef::Local(temp.clone())
        );
        assert_eq!(
            "42".parse::<EntityRef>().unwrap(),
            EntityRef::Server("42".to_string())
        );
        assert!("tmp-".parse::<EntityRef>().is_err());
        assert!("  ".parse::<EntityRef>().is_err());
    }

    #[test]
    fn temp_ids_are_unique() {
        assert_ne!(TempId::generate(), TempId::generate());
        assert!(TempId::generate().as_str().starts_with("tmp-"));
    }

    #[test]
    fn references_checks_target_and_parent() {
        let trip = TempId::generate();
        let now = Utc::now();
        let op = QueuedOperation {
            id: Uuid::new_v4(),
            seq: 1,
            kind: OperationKind::Create,
            entity: EntityType::DiaryEntry,
            target: EntityRef::Local(TempId::generate()),
            parent: Some(EntityRef::Local(trip.clone())),
            payload: Value::Null,
            status: OperationStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            last_error: None,
        };
        assert!(op.references(&trip));
        assert!(!op.references(&TempId::generate()));
    }
}
