//! # Storage (persistence module)
//!
//! A key-value store held in memory and persisted as a JSON snapshot inside the
//! configured directory. It is the first module constructed and the last one
//! released.
//!
//! [`Storage`] is a cheap handle around shared state. The supervisor keeps one
//! handle for teardown; dependents get clones and must never close them.
//!
//! ```text
//! <path>/
//!   <snapshot_file>        written on close (temp file + rename)
//! ```

pub mod error;

pub use error::*;

use crate::config::StorageConfig;
use crate::framework::{BoxError, Resource};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Handle to the node's key-value storage.
#[derive(Clone, Debug)]
pub struct Storage {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    snapshot: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
    closed: AtomicBool,
}

impl Storage {
    /// Opens storage under `config.path`, creating the directory if needed and
    /// loading the previous snapshot when there is one.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.snapshot_file.is_empty() || config.snapshot_file.contains(['/', '\\']) {
            return Err(StorageError::InvalidPath {
                path: config.path.clone(),
                reason: format!("bad snapshot file name {:?}", config.snapshot_file),
            });
        }

        tokio::fs::create_dir_all(&config.path)
            .await
            .map_err(|source| StorageError::Io {
                path: config.path.clone(),
                source,
            })?;

        let snapshot = config.path.join(&config.snapshot_file);
        let data = load_snapshot(&snapshot).await?;
        info!(path = %config.path.display(), keys = data.len(), "Storage opened");

        Ok(Self {
            inner: Arc::new(Inner {
                snapshot,
                data: RwLock::new(data),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the value for `key`, or `None` if it is not set.
    pub fn get_opt(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read()?.get(key).cloned())
    }

    /// Returns the value for `key`, failing with [`StorageError::NotFound`] if it is not set.
    pub fn get(&self, key: &str) -> Result<String, StorageError> {
        self.get_opt(key)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), StorageError> {
        let key = key.into();
        debug!(%key, "Set");
        self.write()?.insert(key, value.into());
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        debug!(%key, "Delete");
        Ok(self.write()?.remove(key).is_some())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Writes the snapshot to disk and closes every handle.
    ///
    /// Only the first call does anything; later calls fail with [`StorageError::Closed`].
    ///
    /// The flag flips under the write lock, so every write either lands in the
    /// snapshot or fails with [`StorageError::Closed`].
    pub async fn close(&self) -> Result<(), StorageError> {
        let encoded = {
            let data = self
                .inner
                .data
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                return Err(StorageError::Closed);
            }
            serde_json::to_vec_pretty(&*data).map_err(StorageError::Encode)?
        };

        let tmp = self.inner.snapshot.with_extension("tmp");
        tokio::fs::write(&tmp, &encoded)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.inner.snapshot)
            .await
            .map_err(|source| StorageError::Io {
                path: self.inner.snapshot.clone(),
                source,
            })?;

        info!(path = %self.inner.snapshot.display(), bytes = encoded.len(), "Storage closed");
        Ok(())
    }

    // `closed` is checked after the lock is taken: `close` flips it while
    // holding the write lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>, StorageError> {
        let guard = self
            .inner
            .data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, StorageError> {
        let guard = self
            .inner
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(guard)
    }
}

async fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[async_trait]
impl Resource for Storage {
    fn name(&self) -> &'static str {
        "storage"
    }

    async fn release(self: Box<Self>) -> Result<(), BoxError> {
        self.close().await.map_err(Into::into)
    }
}
