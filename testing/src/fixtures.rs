use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

pub fn unique_space_key() -> String {
    unique_id("SPACE").to_uppercase()
}

/// A throwaway mirror root, removed when dropped.
pub struct MirrorFixture {
    dir: TempDir
}

impl MirrorFixture {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.path(relative))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Every regular file under the root, as sorted slash-separated paths.
    pub fn files(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect(self.root(), self.root(), &mut out);
        out.sort();
        out
    }

    /// Push a file's modification time into the future so it reads as edited
    /// after the last sync.
    pub fn touch_future(&self, relative: &str, seconds: u64) -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(self.path(relative))?;
        let when = std::time::SystemTime::now() + std::time::Duration::from_secs(seconds);
        file.set_modified(when)
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            );
        }
    }
}

/// Render a mirror document the way the engine writes them.
pub fn document(page_id: &str, title: &str, version: u64, synced_at: &str, body: &str) -> String {
    format!(
        "---\npage_id: '{}'\ntitle: '{}'\nversion: {}\nsynced_at: {}\n---\n{}",
        page_id, title, version, synced_at, body
    )
}
