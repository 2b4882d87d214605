// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded directory storage
//!
//! A governor owns one directory and a file-count ceiling. Every write through
//! `store` is followed by an eviction pass that removes at most one file, the
//! oldest by creation time. Writes and evictions on the same governor are
//! serialized.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("capacity must be at least 1")]
    ZeroCapacity,
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub struct StorageGovernor {
    dir: PathBuf,
    capacity: usize,
    lock: Mutex<()>,
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    created: SystemTime,
}

impl StorageGovernor {
    /// Create the governor, creating `dir` if needed
    pub async fn new(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        if capacity == 0 {
            return Err(StorageError::ZeroCapacity);
        }
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        info!(
            "Storage governor ready: dir={}, capacity={}",
            dir.display(),
            capacity
        );
        Ok(Self {
            dir,
            capacity,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write `bytes` as `name`, then evict the oldest file if over capacity
    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        let path = self.dir.join(name);

        let _guard = self.lock.lock().await;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());

        self.evict_oldest().await?;
        Ok(path)
    }

    /// Run one eviction pass; returns the removed path, if any
    pub async fn enforce(&self) -> Result<Option<PathBuf>, StorageError> {
        let _guard = self.lock.lock().await;
        self.evict_oldest().await
    }

    async fn evict_oldest(&self) -> Result<Option<PathBuf>, StorageError> {
        let entries = self.scan().await?;
        if entries.len() <= self.capacity {
            return Ok(None);
        }

        let Some(oldest) = entries
            .into_iter()
            .min_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)))
        else {
            return Ok(None);
        };

        match tokio::fs::remove_file(&oldest.path).await {
            Ok(()) => {
                info!(
                    "Evicted {} (capacity {})",
                    oldest.path.display(),
                    self.capacity
                );
                Ok(Some(oldest.path))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already removed", oldest.path.display());
                Ok(None)
            }
            Err(e) => Err(StorageError::io(&oldest.path, e)),
        }
    }

    async fn scan(&self) -> Result<Vec<Entry>, StorageError> {
        let mut reader = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        let mut entries = Vec::new();
        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = item.path();
            let metadata = match item.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::io(&path, e)),
            };
            if !metadata.is_file() {
                continue;
            }

            let created = match metadata.created().or_else(|_| metadata.modified()) {
                Ok(time) => time,
                Err(e) => {
                    warn!("No timestamp for {}: {}", path.display(), e);
                    SystemTime::UNIX_EPOCH
                }
            };
            entries.push(Entry { path, created });
        }
        Ok(entries)
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let plain = Path::new(name)
        .file_name()
        .map_or(false, |file_name| file_name == name);
    if name.is_empty() || !plain || name == "." || name == ".." {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
