//! Playbook persistence backends.
//!
//! A repository moves the JSON document described in [`crate::codec`] to and
//! from durable storage. Decoding and validation stay in the codec so every
//! backend rejects bad data the same way.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::codec::{decode_playbooks, encode_playbooks};
use crate::config::StorageConfig;
use crate::error::{PersistenceError, Result};
use crate::model::Playbook;

/// Storage for the serialized playbook collection.
#[async_trait]
pub trait PlaybookRepository: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Read the stored document. `Ok(None)` means nothing has been saved yet.
    async fn fetch(&self) -> std::result::Result<Option<String>, PersistenceError>;

    /// Replace the stored document.
    async fn store(&self, document: &str) -> std::result::Result<(), PersistenceError>;
}

/// Fetch and decode the collection. `Ok(None)` if the repository is empty.
pub async fn load_playbooks(
    repo: &dyn PlaybookRepository,
    capacity: u32,
) -> Result<Option<Vec<Playbook>>> {
    match repo.fetch().await? {
        Some(document) => Ok(Some(decode_playbooks(&document, capacity)?)),
        None => Ok(None),
    }
}

/// Encode and store the collection.
pub async fn save_playbooks(repo: &dyn PlaybookRepository, playbooks: &[Playbook]) -> Result<()> {
    let document = encode_playbooks(playbooks)?;
    repo.store(&document).await?;
    Ok(())
}

/// Build the repository selected by the storage configuration.
///
/// A configured `remote_url` wins over the local file.
pub fn repository_from_config(
    storage: &StorageConfig,
    workspace: &Path,
) -> Result<Box<dyn PlaybookRepository>> {
    match &storage.remote_url {
        Some(url) => Ok(Box::new(HttpRepository::new(
            url.clone(),
            Duration::from_secs(storage.timeout_secs),
        )?)),
        None => Ok(Box::new(JsonFileRepository::new(
            storage.resolve_path(workspace),
            storage.allow_write,
        ))),
    }
}

/// Playbooks kept in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    allow_write: bool,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>, allow_write: bool) -> Self {
        Self {
            path: path.into(),
            allow_write,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PlaybookRepository for JsonFileRepository {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> std::result::Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, document: &str) -> std::result::Result<(), PersistenceError> {
        if !self.allow_write {
            return Err(PersistenceError::WriteDisabled);
        }
        atomic_write(&self.path, document.as_bytes()).await?;
        Ok(())
    }
}

/// Atomically write bytes: write a `.tmp` sibling, then rename over the target.
///
/// Creates parent directories if they don't exist.
pub async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Playbooks served by a remote store at `{base_url}/api/playbooks`.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRepository {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/playbooks", self.base_url)
    }
}

#[async_trait]
impl PlaybookRepository for HttpRepository {
    fn describe(&self) -> String {
        self.endpoint()
    }

    async fn fetch(&self) -> std::result::Result<Option<String>, PersistenceError> {
        let resp = self
            .client
            .get(self.endpoint())
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        Ok(Some(body))
    }

    async fn store(&self, document: &str) -> std::result::Result<(), PersistenceError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(document.to_string())
            .send()
            .await
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PersistenceError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Repository held in memory. Used by tests and as a scratch store.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    document: Mutex<Option<String>>,
    fail_writes: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            fail_writes: false,
        }
    }

    /// A repository whose writes are always refused.
    pub fn read_only() -> Self {
        Self {
            document: Mutex::new(None),
            fail_writes: true,
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document.lock().ok().and_then(|d| d.clone())
    }
}

#[async_trait]
impl PlaybookRepository for InMemoryRepository {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch(&self) -> std::result::Result<Option<String>, PersistenceError> {
        Ok(self.document())
    }

    async fn store(&self, document: &str) -> std::result::Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::WriteDisabled);
        }
        let mut slot = self
            .document
            .lock()
            .map_err(|e| PersistenceError::Transport(e.to_string()))?;
        *slot = Some(document.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_playbooks;
    use crate::error::BrainmapError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("nested").join("pb.json"), true);

        let playbooks = default_playbooks();
        save_playbooks(&repo, &playbooks).await.unwrap();
        let loaded = load_playbooks(&repo, 200).await.unwrap();
        assert_eq!(loaded, Some(playbooks));
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("absent.json"), true);
        assert!(load_playbooks(&repo, 200).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pb.json");
        let repo = JsonFileRepository::new(&path, false);

        let err = save_playbooks(&repo, &default_playbooks()).await.unwrap_err();
        assert!(matches!(
            err,
            BrainmapError::Persistence(PersistenceError::WriteDisabled)
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_atomic_write_no_tmp_leftover() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clean.json");
        atomic_write(&path, b"[]").await.unwrap();

        assert!(!path.with_extension("tmp").exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pb.json");
        std::fs::write(&path, "not json").unwrap();

        let repo = JsonFileRepository::new(&path, true);
        let err = load_playbooks(&repo, 200).await.unwrap_err();
        assert!(matches!(err, BrainmapError::Parse(_)));
    }

    #[test]
    fn test_repository_from_config() {
        let mut storage = StorageConfig::default();
        let file = repository_from_config(&storage, Path::new("/srv")).unwrap();
        assert_eq!(file.describe(), "/srv/playbooks.json");

        storage.remote_url = Some("http://store.internal:8080".into());
        let remote = repository_from_config(&storage, Path::new("/srv")).unwrap();
        assert_eq!(remote.describe(), "http://store.internal:8080/api/playbooks");
    }

    #[test]
    fn test_http_endpoint_trims_slash() {
        let repo = HttpRepository::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(repo.endpoint(), "http://localhost:3000/api/playbooks");
    }

    #[tokio::test]
    async fn test_in_memory_read_only() {
        let repo = InMemoryRepository::read_only();
        let err = repo.store("[]").await.unwrap_err();
        assert!(matches!(err, PersistenceError::WriteDisabled));
        assert!(repo.document().is_none());
    }
}
