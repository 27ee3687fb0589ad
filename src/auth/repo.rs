use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::auth::repo_types::User;

/// Whole-collection persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// All known users. An absent or empty backing medium reads as no users.
    async fn load(&self) -> anyhow::Result<Vec<User>>;

    /// Replace the persisted collection. Later loads never see a partial write.
    async fn save(&self, users: &[User]) -> anyhow::Result<()>;

    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.load().await?.into_iter().find(|u| u.email == email))
    }
}

/// Users kept as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Writes `[]` only if no file exists, so it never clobbers a concurrent save.
    async fn create_if_missing(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.dir())
            .await
            .with_context(|| format!("create {}", self.dir().display()))?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("create {}", self.path.display()));
            }
        };
        file.write_all(b"[]")
            .await
            .with_context(|| format!("write {}", self.path.display()))?;
        info!(path = %self.path.display(), "users file initialized");
        Ok(())
    }
}

/// Write into a uniquely named sibling temp file, then rename it over `path`.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(bytes).context("write temp users file")?;
    tmp.as_file().sync_all().context("sync temp users file")?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn load(&self) -> anyhow::Result<Vec<User>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.create_if_missing().await?;
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", self.path.display()));
            }
        };

        // Left as is; the next save writes a full array.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            debug!(path = %self.path.display(), "users file empty");
            return Ok(Vec::new());
        }

        let users: Vec<User> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse {}", self.path.display()))?;
        debug!(count = users.len(), "users loaded");
        Ok(users)
    }

    async fn save(&self, users: &[User]) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(users).context("serialize users")?;
        let (dir, path) = (self.dir().to_path_buf(), self.path.clone());
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &json)).await??;
        debug!(count = users.len(), "users saved");
        Ok(())
    }
}
