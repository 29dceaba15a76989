//! Durable local storage of the queue.
//!
//! Store calls are synchronous and short: the queue never holds a store lock
//! across an `.await`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{OfflineError, Result},
    operation::{CachedEntity, QueueState, QueuedOperation, TempId},
};

/// Keyed storage of queued operations plus the queue state token.
pub trait QueueStore: Send + Sync {
    fn operations(&self) -> Result<Vec<QueuedOperation>>;

    fn operation(&self, id: Uuid) -> Result<Option<QueuedOperation>>;

    /// Inserts or replaces the operation with the same id.
    fn put_operation(&self, operation: &QueuedOperation) -> Result<()>;

    /// Replaces a stored operation. Returns `false`, writing nothing, when no
    /// operation with that id exists anymore.
    fn update_operation(&self, operation: &QueuedOperation) -> Result<bool>;

    fn delete_operations(&self, ids: &[Uuid]) -> Result<()>;

    /// Returns the next enqueue sequence number and advances the counter.
    fn next_seq(&self) -> Result<u64>;

    fn queue_state(&self) -> Result<QueueState>;

    fn set_queue_state(&self, state: QueueState) -> Result<()>;
}

/// Local copies of entities created through the queue, keyed by temp handle.
pub trait EntityCache: Send + Sync {
    fn entity(&self, temp_id: &TempId) -> Result<Option<CachedEntity>>;

    fn entities(&self) -> Result<Vec<CachedEntity>>;

    fn put_entity(&self, entity: &CachedEntity) -> Result<()>;
}

/// Everything the queue needs from its storage.
pub trait LocalStore: QueueStore + EntityCache {}

impl<T: QueueStore + EntityCache> LocalStore for T {}

/// On-disk layout of a [`JsonFileStore`]; also the state of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueFile {
    #[serde(default)]
    pub state: QueueState,
    #[serde(default)]
    pub next_seq: u64,
    #[serde(default)]
    pub operations: BTreeMap<Uuid, QueuedOperation>,
    #[serde(default)]
    pub entities: BTreeMap<TempId, CachedEntity>,
}

impl QueueFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the whole file through a sibling temp file and a rename, so a
    /// crash leaves either the old or the new content.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Queue state behind a lock, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
struct Inner {
    path: Option<PathBuf>,
    file: Mutex<QueueFile>,
}

impl Inner {
    fn lock(&self) -> Result<MutexGuard<'_, QueueFile>> {
        self.file
            .lock()
            .map_err(|_| OfflineError::Store("queue store lock poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&QueueFile) -> T) -> Result<T> {
        Ok(f(&*self.lock()?))
    }

    /// Applies `f` under the lock. File-backed stores apply it to a copy and
    /// only keep the change once the copy is saved.
    fn write<T>(&self, f: impl FnOnce(&mut QueueFile) -> T) -> Result<T> {
        let mut guard = self.lock()?;
        let Some(path) = &self.path else {
            return Ok(f(&mut guard));
        };
        let mut next = guard.clone();
        let value = f(&mut next);
        next.save(path)?;
        *guard = next;
        Ok(value)
    }
}

macro_rules! impl_stores {
    ($store:ty) => {
        impl QueueStore for $store {
            fn operations(&self) -> Result<Vec<QueuedOperation>> {
                self.inner
                    .read(|file| file.operations.values().cloned().collect())
            }

            fn operation(&self, id: Uuid) -> Result<Option<QueuedOperation>> {
                self.inner.read(|file| file.operations.get(&id).cloned())
            }

            fn put_operation(&self, operation: &QueuedOperation) -> Result<()> {
                self.inner.write(|file| {
                    file.operations.insert(operation.id, operation.clone());
                })
            }

            fn update_operation(&self, operation: &QueuedOperation) -> Result<bool> {
                self.inner
                    .write(|file| match file.operations.get_mut(&operation.id) {
                        Some(stored) => {
                            *stored = operation.clone();
                            true
                        }
                        None => false,
                    })
            }

            fn delete_operations(&self, ids: &[Uuid]) -> Result<()> {
                self.inner.write(|file| {
                    for id in ids {
                        file.operations.remove(id);
                    }
                })
            }

            fn next_seq(&self) -> Result<u64> {
                self.inner.write(|file| {
                    file.next_seq += 1;
                    file.next_seq
                })
            }

            fn queue_state(&self) -> Result<QueueState> {
                self.inner.read(|file| file.state)
            }

            fn set_queue_state(&self, state: QueueState) -> Result<()> {
                self.inner.write(|file| file.state = state)
            }
        }

        impl EntityCache for $store {
            fn entity(&self, temp_id: &TempId) -> Result<Option<CachedEntity>> {
                self.inner.read(|file| file.entities.get(temp_id).cloned())
            }

            fn entities(&self) -> Result<Vec<CachedEntity>> {
                self.inner
                    .read(|file| file.entities.values().cloned().collect())
            }

            fn put_entity(&self, entity: &CachedEntity) -> Result<()> {
                self.inner.write(|file| {
                    file.entities.insert(entity.temp_id.clone(), entity.clone());
                })
            }
        }
    };
}

/// Volatile store, for tests and for callers that bring their own durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Inner,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing state, e.g. one left behind by a crashed run.
    pub fn with_state(file: QueueFile) -> Self {
        Self {
            inner: Inner {
                path: None,
                file: Mutex::new(file),
            },
        }
    }
}

impl_stores!(MemoryStore);

/// Store kept in a single JSON file, rewritten atomically on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    inner: Inner,
}

impl JsonFileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = QueueFile::load(&path)?;
        Ok(Self {
            inner: Inner {
                path: Some(path),
                file: Mutex::new(file),
            },
        })
    }
}

impl_stores!(JsonFileStore);
