use crate::error::{Result, SyncError};
use crate::state::MirrorState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[async_trait]
pub trait StatePersister: Send + Sync {
    /// `None` when the mirror has never been initialized.
    async fn load(&self) -> Result<Option<MirrorState>>;
    async fn save(&self, state: &MirrorState) -> Result<()>;
}

/// Stores the state as pretty-printed JSON, replacing the file atomically.
pub struct JsonFilePersister {
    path: PathBuf
}

impl JsonFilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StatePersister for JsonFilePersister {
    async fn load(&self) -> Result<Option<MirrorState>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data).map(Some).map_err(|e| {
                SyncError::Persistence(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into())
        }
    }

    async fn save(&self, state: &MirrorState) -> Result<()> {
        let data = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &data).await?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(SyncError::Persistence(format!(
                "{}: {}",
                self.path.display(),
                e
            )));
        }
        tracing::debug!("saved mirror state ({} pages)", state.pages.len());
        Ok(())
    }
}

/// In-memory persister for tests.
#[derive(Default)]
pub struct MemoryPersister {
    state: RwLock<Option<MirrorState>>,
    saves: AtomicUsize
}

impl MemoryPersister {
    pub fn new(state: Option<MirrorState>) -> Self {
        Self {
            state: RwLock::new(state),
            saves: AtomicUsize::new(0)
        }
    }

    pub async fn current(&self) -> Option<MirrorState> {
        self.state.read().await.clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatePersister for MemoryPersister {
    async fn load(&self) -> Result<Option<MirrorState>> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &MirrorState) -> Result<()> {
        *self.state.write().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
