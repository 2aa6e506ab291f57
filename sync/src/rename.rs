//! Atomic document writes, rename with rollback, and reference repair.
//!
//! Content is always staged in the scratch directory (`.mirror/tmp`) and
//! moved into place with a rename. When a document moves, the old file is
//! parked as a `.bak` sibling until the new file is in place, so after any
//! outcome exactly one of the old and new paths holds valid content.

use crate::error::{Result, SyncError};
use crate::frontmatter;
use crate::links;
use crate::paths::resolve_in_root;
use errors::MirrorError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use walkdir::WalkDir;

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Final move of a staged file into its destination.
pub(crate) trait Mover: Send + Sync {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

pub(crate) struct FsMover;

impl Mover for FsMover {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// A staged file, removed on drop unless it was moved away.
struct ScratchFile {
    path: PathBuf
}

impl ScratchFile {
    fn create(scratch_dir: &Path, content: &str) -> io::Result<Self> {
        std::fs::create_dir_all(scratch_dir)?;
        let name = format!(
            "{}-{}.tmp",
            std::process::id(),
            SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst)
        );
        let path = scratch_dir.join(name);
        std::fs::write(&path, content)?;
        Ok(Self { path })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("failed to remove scratch file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    /// Relative path that now holds the content.
    pub path: String,
    pub renamed: bool,
    /// The target belonged to another page; content went to the old path.
    pub substituted: bool
}

/// Body hashes of a document whose links were repaired, `None` when the
/// document has no parsable front matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairedDocument {
    pub path: String,
    pub hash_before: Option<String>,
    pub hash_after: Option<String>
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub files_scanned: usize,
    pub files_updated: usize,
    pub links_rewritten: usize,
    pub failures: usize,
    pub updated: Vec<RepairedDocument>
}

pub struct DocumentWriter {
    root: PathBuf,
    scratch_dir: PathBuf,
    mover: Box<dyn Mover>
}

impl DocumentWriter {
    pub fn new(root: &Path, scratch_dir: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            scratch_dir: scratch_dir.to_path_buf(),
            mover: Box::new(FsMover)
        }
    }

    #[cfg(test)]
    pub(crate) fn with_mover(mut self, mover: Box<dyn Mover>) -> Self {
        self.mover = mover;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` to `relative` through a staged file.
    pub fn write_atomic(&self, relative: &str, content: &str) -> Result<()> {
        let target = resolve_in_root(&self.root, relative)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let staged = ScratchFile::create(&self.scratch_dir, content)?;
        self.mover.rename(&staged.path, &target)?;
        Ok(())
    }

    /// Write the document of `page_id` to `relative`, refusing to replace a
    /// file that holds another page's document or an untracked one.
    pub fn write_document(&self, page_id: &str, relative: &str, content: &str) -> Result<()> {
        let target = resolve_in_root(&self.root, relative)?;
        if target.exists() && !owned_by(&target, relative, page_id) {
            tracing::warn!("not writing page {} to {}: file belongs to another document", page_id, relative);
            return Err(MirrorError::PathOccupied {
                path: relative.to_string(),
                page_id: page_id.to_string()
            }
            .into());
        }
        self.write_atomic(relative, content)
    }

    /// Page id named in the front matter of the document at `relative`.
    pub fn owner_of(&self, relative: &str) -> Option<String> {
        let path = resolve_in_root(&self.root, relative).ok()?;
        let text = std::fs::read_to_string(path).ok()?;
        frontmatter::parse(relative, &text)
            .ok()?
            .front_matter?
            .page_id
    }

    /// Move the document of `page_id` from `old` to `new`, writing `content`.
    ///
    /// If `new` already holds another page's document the move is abandoned
    /// and `content` is written to `old` instead.
    pub fn rename_document(
        &self,
        page_id: &str,
        old: &str,
        new: &str,
        content: &str
    ) -> Result<RenameOutcome> {
        if old == new {
            self.write_atomic(new, content)?;
            return Ok(RenameOutcome {
                path: new.to_string(),
                renamed: false,
                substituted: false
            });
        }

        let old_abs = resolve_in_root(&self.root, old)?;
        let new_abs = resolve_in_root(&self.root, new)?;
        let staged = ScratchFile::create(&self.scratch_dir, content)?;

        if new_abs.exists() && !owned_by(&new_abs, new, page_id) {
            tracing::warn!(
                "not renaming {} to {}: target belongs to another document",
                old,
                new
            );
            if let Some(parent) = old_abs.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.mover.rename(&staged.path, &old_abs)?;
            return Ok(RenameOutcome {
                path: old.to_string(),
                renamed: false,
                substituted: true
            });
        }

        if let Some(parent) = new_abs.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let backup = old_abs.exists().then(|| backup_path(&old_abs));
        if let Some(backup) = &backup {
            std::fs::rename(&old_abs, backup)?;
        }

        if let Err(e) = self.mover.rename(&staged.path, &new_abs) {
            if let Some(backup) = &backup {
                if let Err(restore) = std::fs::rename(backup, &old_abs) {
                    tracing::error!(
                        "failed to restore {} from backup: {}",
                        old,
                        restore
                    );
                }
            }
            return Err(SyncError::Rename {
                from: old.to_string(),
                to: new.to_string(),
                reason: e.to_string()
            });
        }

        if let Some(backup) = &backup {
            if let Err(e) = std::fs::remove_file(backup) {
                tracing::warn!("failed to remove backup {}: {}", backup.display(), e);
            }
        }
        prune_empty_dirs(&self.root, old_abs.parent());

        tracing::info!("renamed {} -> {}", old, new);
        Ok(RenameOutcome {
            path: new.to_string(),
            renamed: true,
            substituted: false
        })
    }

    /// Delete a document and any directories it leaves empty.
    pub fn remove_document(&self, relative: &str) -> Result<bool> {
        let path = resolve_in_root(&self.root, relative)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                prune_empty_dirs(&self.root, path.parent());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into())
        }
    }

    /// Rewrite links in every other document that resolved to `old` so they
    /// point at `new`. Unreadable documents are counted and skipped.
    pub fn repair_references(&self, old: &str, new: &str) -> RepairReport {
        let mut report = RepairReport::default();

        for relative in markdown_files(&self.root) {
            if relative == new || relative == old {
                continue;
            }
            report.files_scanned += 1;

            let abs = self.root.join(&relative);
            let text = match std::fs::read_to_string(&abs) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("skipping {} during link repair: {}", relative, e);
                    report.failures += 1;
                    continue;
                }
            };

            let (updated, count) = links::repoint(&text, &relative, old, new);
            if count == 0 {
                continue;
            }
            match self.write_atomic(&relative, &updated) {
                Ok(()) => {
                    report.files_updated += 1;
                    report.links_rewritten += count;
                    report.updated.push(RepairedDocument {
                        hash_before: body_hash(&relative, &text),
                        hash_after: body_hash(&relative, &updated),
                        path: relative
                    });
                }
                Err(e) => {
                    tracing::warn!("failed to update links in {}: {}", relative, e);
                    report.failures += 1;
                }
            }
        }

        report
    }
}

fn body_hash(relative: &str, text: &str) -> Option<String> {
    let doc = frontmatter::parse(relative, text).ok()?;
    doc.front_matter
        .is_some()
        .then(|| utils::compute_content_hash(&doc.body))
}

fn owned_by(abs: &Path, relative: &str, page_id: &str) -> bool {
    std::fs::read_to_string(abs)
        .ok()
        .and_then(|text| frontmatter::read_page_state(relative, &text))
        .is_some_and(|state| state.page_id == page_id)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

fn prune_empty_dirs(root: &Path, start: Option<&Path>) {
    let mut current = start;
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Every markdown document under `root` as a sorted slash-separated relative
/// path, skipping hidden entries such as the `.mirror` directory.
pub fn markdown_files(root: &Path) -> Vec<String> {
    let mut out: Vec<String> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .filter_map(|e| {
            e.path().strip_prefix(root).ok().map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect();
    out.sort();
    out
}
