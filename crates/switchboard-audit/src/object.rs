//! Object storage for request and response bodies

use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AuditError;

/// Blob store keyed by `/`-separated paths
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), AuditError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AuditError>;
}

/// Object store held in process memory
///
/// Keeps the order of writes so tests can assert on it.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
    writes: Mutex<Vec<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys in the order they were written
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), AuditError> {
        self.objects.insert(key.to_owned(), data);
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(key.to_owned());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AuditError> {
        self.objects
            .get(key)
            .map(|data| data.clone())
            .ok_or_else(|| AuditError::ObjectNotFound(key.to_owned()))
    }
}

/// Object store rooted in a local directory
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for `key`; only plain relative components are accepted
    fn path(&self, key: &str) -> Result<PathBuf, AuditError> {
        let relative = Path::new(key);
        let plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(AuditError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
    async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), AuditError> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AuditError> {
        let path = self.path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AuditError::ObjectNotFound(key.to_owned())),
            Err(e) => Err(e.into()),
        }
    }
}
