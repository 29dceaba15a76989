//! Offline mutation queue of the TravelMind client.
//!
//! Mutations made while offline (or whose live request failed) are recorded
//! in a durable local queue and replayed against the server, in the order
//! they were made, once connectivity returns. Failing operations are retried
//! on later runs up to a ceiling, then parked until retried by hand.

pub use backend::{HttpBackend, SyncBackend, SyncFailure, SyncOutcome, SyncRequest};
pub use connectivity::watch_connectivity;
pub use error::{OfflineError, Result};
pub use operation::{
    CachedEntity, EntityRef, EntityType, NewOperation, OperationKind, OperationStatus,
    QueueState, QueuedOperation, TempId,
};
pub use queue::{
    DEFAULT_COMPLETED_GRACE, DEFAULT_MAX_RETRIES, OfflineQueue, OfflineQueueBuilder,
    QueueCounts, QueuePolicy, SyncEvent, SyncReport,
};
pub use store::{EntityCache, JsonFileStore, LocalStore, MemoryStore, QueueFile, QueueStore};

pub mod backend;
mod connectivity;
mod error;
mod operation;
mod queue;
pub mod settings;
pub mod store;
