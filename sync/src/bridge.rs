use crate::conflict::{self, GuardOutcome};
use crate::diff::{self, DiffOptions};
use crate::error::{Result, SyncError};
use crate::frontmatter::{self, FrontMatter};
use crate::links;
use crate::paths::{PathGenerator, README_FILE, is_readme, resolve_in_root};
use crate::rename::{DocumentWriter, RepairedDocument};
use crate::scan::{self, ScanResult};
use crate::scheduler;
use crate::state::MirrorState;
use crate::state_persister::StatePersister;
use crate::tree::RemoteTree;
use config::SyncConfig;
use errors::{ApiError, MirrorError};
use mirror_core::traits::{ContentConverter, RemoteApi};
use mirror_core::types::{
    CandidateKind, ChangeEntry, ChangeSet, CreatePageRequest, FolderRecord, PushCandidate,
    RemoteNode, UpdatePageRequest
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use utils::parent_dir;

#[derive(Debug, Clone, Default)]
pub struct PullOptions {
    pub force: bool,
    pub dry_run: bool,
    /// Page ids or recorded paths to restrict the pull to.
    pub pages: Vec<String>
}

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Push only this document, relative to the mirror root.
    pub file: Option<String>,
    pub force: bool,
    pub dry_run: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub path: String,
    pub error: String
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConflict {
    pub path: String,
    pub local: u64,
    pub remote: u64
}

#[derive(Debug, Clone, Default)]
pub struct PullReport {
    pub changes: ChangeSet,
    pub written: Vec<String>,
    /// `(old, new)` pairs.
    pub renamed: Vec<(String, String)>,
    pub deleted: Vec<String>,
    /// Remotely deleted pages whose documents were kept for their local edits.
    pub kept: Vec<String>,
    pub failed: Vec<PageFailure>,
    pub warnings: Vec<String>,
    pub links_repaired: usize,
    pub cancelled: bool,
    pub dry_run: bool
}

impl PullReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Clone, Default)]
pub struct PushReport {
    pub order: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    pub pushed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<PageFailure>,
    pub conflicts: Vec<PushConflict>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
    pub dry_run: bool
}

impl PushReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.conflicts.is_empty() && !self.cancelled
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// What a pull would change.
    pub changes: ChangeSet,
    /// What a push would send, in push order.
    pub pending: Vec<PushCandidate>,
    pub warnings: Vec<String>
}

/// Local path to page id, seeded from the mirror state and extended with
/// every page created during a push batch.
#[derive(Debug, Clone, Default)]
pub struct PushAccumulator {
    by_path: HashMap<String, String>
}

impl PushAccumulator {
    pub fn from_state(state: &MirrorState) -> Self {
        Self {
            by_path: state.path_index()
        }
    }

    pub fn lookup(&self, path: &str) -> Option<String> {
        self.by_path.get(path).cloned()
    }

    pub fn record(&mut self, path: &str, page_id: &str) {
        self.by_path.insert(path.to_string(), page_id.to_string());
    }
}

struct PullPlan {
    pages: Vec<RemoteNode>,
    folders: Vec<RemoteNode>,
    changes: ChangeSet,
    full_resync: bool
}

enum PushStep {
    Pushed,
    Skipped(String)
}

pub struct SyncManager {
    api: Arc<dyn RemoteApi>,
    converter: Arc<dyn ContentConverter>,
    persister: Arc<dyn StatePersister>,
    writer: DocumentWriter,
    config: SyncConfig,
    cancel: watch::Receiver<bool>
}

impl SyncManager {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        converter: Arc<dyn ContentConverter>,
        persister: Arc<dyn StatePersister>,
        root: &Path,
        config: &SyncConfig
    ) -> Self {
        let scratch = root.join(".mirror").join("tmp");
        let (_, cancel) = watch::channel(false);
        Self {
            api,
            converter,
            persister,
            writer: DocumentWriter::new(root, &scratch),
            config: config.clone(),
            cancel
        }
    }

    /// Observe `cancel`; once it reads `true` the run stops before the next
    /// page.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        self.writer.root()
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    async fn load_state(&self) -> Result<(MirrorState, Vec<String>)> {
        let mut state = self.persister.load().await?.ok_or_else(|| {
            SyncError::Mirror(MirrorError::NotConfigured {
                reason: "no mirror state found; run `mirror init` first".to_string()
            })
        })?;
        let warnings = state.sanitize().iter().map(ToString::to_string).collect();
        Ok((state, warnings))
    }

    async fn plan_pull(&self, state: &MirrorState, options: &PullOptions) -> Result<PullPlan> {
        let pages = self.api.list_pages(&state.space_id).await?;
        let folders = match self.api.list_folders(&state.space_id).await {
            Ok(folders) => folders,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into())
        };

        let mut selected = HashSet::new();
        for selector in &options.pages {
            selected.insert(select_page(state, &pages, selector)?);
        }
        let full_resync = options.force && selected.is_empty();
        let diff_options = DiffOptions {
            force: selected.clone(),
            only: (!selected.is_empty()).then_some(selected),
            full_resync
        };

        let local = diff::read_page_states(self.root(), &state.pages).await;
        let changes = diff::compute_diff(&pages, &state.pages, &local, &diff_options);
        Ok(PullPlan {
            pages,
            folders,
            changes,
            full_resync
        })
    }

    /// Bring the mirror up to date with the remote space.
    #[tracing::instrument(skip(self))]
    pub async fn pull(&self, options: PullOptions) -> Result<PullReport> {
        let start = std::time::Instant::now();
        let (mut state, warnings) = self.load_state().await?;
        let plan = self.plan_pull(&state, &options).await?;

        let mut report = PullReport {
            changes: plan.changes.clone(),
            warnings,
            dry_run: options.dry_run,
            ..Default::default()
        };
        if options.dry_run {
            return Ok(report);
        }
        tracing::info!(
            "pulling {} added, {} modified, {} deleted",
            plan.changes.added.len(),
            plan.changes.modified.len(),
            plan.changes.deleted.len()
        );

        let prior = state.pages.clone();
        let prior_hashes = state.content_hashes.clone();
        if plan.full_resync {
            state.pages.clear();
            state.content_hashes.clear();
        }

        let tree = RemoteTree::new(plan.pages.iter().chain(plan.folders.iter()).cloned());
        let touched: HashSet<&str> = plan
            .changes
            .added
            .iter()
            .chain(plan.changes.modified.iter())
            .map(|e| e.page_id.as_str())
            .collect();
        let mut generator = PathGenerator::new(&tree, state.homepage_id.as_deref());
        for (id, path) in &prior {
            if tree.contains(id) && (is_readme(path) || !touched.contains(id.as_str())) {
                generator.pin(id, path);
            }
        }
        for (id, folder) in &state.folders {
            if tree.contains(id) {
                generator.pin(id, &folder.local_path);
            } else {
                generator.reserve(id, &folder.local_path, true);
            }
        }
        // Paths recorded for renamed or deleted pages stay occupied until
        // their owners have moved out.
        for (id, path) in &prior {
            generator.reserve(id, path, false);
        }
        let paths = generator.assign_all();

        for entry in plan.changes.added.iter().chain(plan.changes.modified.iter()) {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if let Err(e) = self
                .apply_page(&mut state, entry, &paths, &prior, &prior_hashes, &mut report)
                .await
            {
                let path = paths
                    .get(&entry.page_id)
                    .cloned()
                    .unwrap_or_else(|| entry.title.clone());
                tracing::error!("failed to pull {} ({}): {}", entry.page_id, path, e);
                metrics::counter!("mirror.pull.failed").increment(1);
                report.failed.push(PageFailure {
                    path,
                    error: e.to_string()
                });
            }
        }

        for entry in &plan.changes.deleted {
            if report.cancelled || self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if let Err(e) = self.apply_deletion(&mut state, entry, &mut report).await {
                let path = entry.local_path.clone().unwrap_or_default();
                tracing::error!("failed to remove {}: {}", path, e);
                report.failed.push(PageFailure {
                    path,
                    error: e.to_string()
                });
            }
        }

        if !report.cancelled {
            state.folders = plan
                .folders
                .iter()
                .filter_map(|f| {
                    let local_path = paths.get(&f.id)?.clone();
                    Some((
                        f.id.clone(),
                        FolderRecord {
                            title: f.title.clone(),
                            parent_id: f.parent_id.clone(),
                            local_path
                        }
                    ))
                })
                .collect();
            state.last_sync = Some(chrono::Utc::now());
        }
        self.persister.save(&state).await?;

        metrics::counter!("mirror.pull.pages").increment(report.written.len() as u64);
        metrics::counter!("mirror.pull.deleted").increment(report.deleted.len() as u64);
        metrics::histogram!("mirror.pull.duration_ms").record(start.elapsed().as_millis() as f64);
        tracing::info!(
            "pull finished: {} written, {} renamed, {} deleted, {} failed",
            report.written.len(),
            report.renamed.len(),
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn apply_page(
        &self,
        state: &mut MirrorState,
        entry: &ChangeEntry,
        paths: &HashMap<String, String>,
        prior: &BTreeMap<String, String>,
        prior_hashes: &BTreeMap<String, String>,
        report: &mut PullReport
    ) -> Result<()> {
        let page = self.api.get_page(&entry.page_id).await?;
        let target = paths
            .get(&entry.page_id)
            .cloned()
            .ok_or_else(|| SyncError::Internal(format!("no path for page {}", entry.page_id)))?;
        let previous = prior.get(&entry.page_id).cloned();

        if let Some(old) = previous.as_deref()
            && scan::document_has_local_edits(
                self.root(),
                old,
                prior_hashes.get(&entry.page_id).map(String::as_str),
                self.config.mtime_tolerance_seconds
            )
        {
            tracing::warn!("page {} changed remotely; local edits in {} are replaced", entry.page_id, old);
            report.warnings.push(format!(
                "{}: unpushed local edits were replaced by the remote version of page {}",
                old, entry.page_id
            ));
        }

        let converted = self.converter.to_local_format(&page.body);
        report
            .warnings
            .extend(converted.warnings.iter().map(|w| format!("{}: {}", target, w)));

        let extra = previous
            .as_deref()
            .and_then(|p| self.existing_front_matter(p))
            .map(|fm| fm.extra)
            .unwrap_or_default();
        let front_matter = FrontMatter {
            page_id: Some(page.node.id.clone()),
            title: Some(page.node.title.clone()),
            version: page.node.version,
            synced_at: Some(chrono::Utc::now()),
            updated_at: page.updated_at,
            parent_id: page.node.parent_id.clone(),
            extra
        };
        let render_at = |path: &str| -> Result<(String, String)> {
            let (body, unresolved) = links::to_local_links(&converted.text, path, paths);
            for id in unresolved {
                tracing::warn!("{} links to unknown page {}", path, id);
            }
            let content = frontmatter::render(&front_matter, &body)?;
            Ok((body, content))
        };

        let (mut body, content) = render_at(&target)?;
        let written = match previous {
            Some(old) if old != target => {
                let outcome = self
                    .writer
                    .rename_document(&entry.page_id, &old, &target, &content)?;
                if outcome.substituted {
                    // Links were made relative to the abandoned target.
                    let (kept_body, kept_content) = render_at(&outcome.path)?;
                    self.writer.write_atomic(&outcome.path, &kept_content)?;
                    body = kept_body;
                    report.warnings.push(format!(
                        "kept {} for page {}: {} belongs to another page",
                        old, entry.page_id, target
                    ));
                }
                if outcome.renamed {
                    if self.config.repair_links {
                        let repair = self.writer.repair_references(&old, &target);
                        report.links_repaired += repair.links_rewritten;
                        rehash_repaired(state, &repair.updated);
                        if repair.failures > 0 {
                            report.warnings.push(format!(
                                "{} documents could not be checked for links to {}",
                                repair.failures, old
                            ));
                        }
                    }
                    report.renamed.push((old, target.clone()));
                }
                outcome.path
            }
            Some(_) => {
                self.writer.write_atomic(&target, &content)?;
                target
            }
            _ => {
                self.writer
                    .write_document(&entry.page_id, &target, &content)?;
                target
            }
        };

        state.record(&entry.page_id, &written, utils::compute_content_hash(&body));
        self.persister.save(state).await?;
        tracing::info!("pulled {} -> {}", entry.page_id, written);
        report.written.push(written);
        Ok(())
    }

    async fn apply_deletion(
        &self,
        state: &mut MirrorState,
        entry: &ChangeEntry,
        report: &mut PullReport
    ) -> Result<()> {
        let Some(path) = entry.local_path.clone() else {
            state.forget(&entry.page_id);
            return Ok(());
        };

        if let Some(owner) = self.writer.owner_of(&path)
            && owner != entry.page_id
        {
            tracing::warn!(
                "page {} was deleted remotely but {} now holds page {}; leaving it",
                entry.page_id,
                path,
                owner
            );
            report.warnings.push(format!(
                "{} left in place: it holds page {}, not deleted page {}",
                path, owner, entry.page_id
            ));
        } else if scan::document_has_local_edits(
            self.root(),
            &path,
            state.hash_of(&entry.page_id),
            self.config.mtime_tolerance_seconds
        ) {
            tracing::warn!(
                "page {} was deleted remotely but {} has local edits; keeping the file",
                entry.page_id,
                path
            );
            report.warnings.push(format!(
                "{} kept: page {} was deleted remotely",
                path, entry.page_id
            ));
            report.kept.push(path);
        } else {
            self.writer.remove_document(&path)?;
            tracing::info!("removed {} (page {} deleted remotely)", path, entry.page_id);
            report.deleted.push(path);
        }
        state.forget(&entry.page_id);
        self.persister.save(state).await
    }

    fn existing_front_matter(&self, relative: &str) -> Option<FrontMatter> {
        let path = resolve_in_root(self.root(), relative).ok()?;
        let text = std::fs::read_to_string(path).ok()?;
        frontmatter::parse(relative, &text).ok()?.front_matter
    }

    /// Send local changes to the remote, link targets first.
    #[tracing::instrument(skip(self))]
    pub async fn push(&self, options: PushOptions) -> Result<PushReport> {
        let start = std::time::Instant::now();
        let (mut state, mut warnings) = self.load_state().await?;
        let ScanResult {
            candidates,
            warnings: scan_warnings
        } = scan::scan_candidates(
            self.root(),
            &state,
            self.config.mtime_tolerance_seconds,
            options.file.as_deref()
        )?;
        warnings.extend(scan_warnings);

        let schedule = scheduler::schedule(candidates);
        for cycle in &schedule.cycles {
            warnings.push(format!("link cycle: {}", cycle.join(" -> ")));
        }
        let mut report = PushReport {
            order: schedule.paths(),
            cycles: schedule.cycles.clone(),
            warnings,
            dry_run: options.dry_run,
            ..Default::default()
        };
        if options.dry_run {
            return Ok(report);
        }

        let mut accumulator = PushAccumulator::from_state(&state);
        for candidate in &schedule.order {
            if self.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self
                .push_one(&mut state, &mut accumulator, candidate, options.force, &mut report)
                .await
            {
                Ok(PushStep::Pushed) => report.pushed.push(candidate.path.clone()),
                Ok(PushStep::Skipped(reason)) => {
                    tracing::info!("skipped {}: {}", candidate.path, reason);
                    report.skipped.push(candidate.path.clone());
                }
                Err(SyncError::Conflict {
                    path,
                    local,
                    remote
                }) => {
                    tracing::warn!(
                        "version conflict on {}: local {}, remote {}",
                        path,
                        local,
                        remote
                    );
                    metrics::counter!("mirror.push.conflicts").increment(1);
                    report.conflicts.push(PushConflict {
                        path,
                        local,
                        remote
                    });
                }
                Err(e) => {
                    tracing::error!("failed to push {}: {}", candidate.path, e);
                    metrics::counter!("mirror.push.failed").increment(1);
                    report.failed.push(PageFailure {
                        path: candidate.path.clone(),
                        error: e.to_string()
                    });
                }
            }
        }

        metrics::counter!("mirror.push.pages").increment(report.pushed.len() as u64);
        metrics::histogram!("mirror.push.duration_ms").record(start.elapsed().as_millis() as f64);
        tracing::info!(
            "push finished: {} pushed, {} skipped, {} conflicts, {} failed",
            report.pushed.len(),
            report.skipped.len(),
            report.conflicts.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn push_one(
        &self,
        state: &mut MirrorState,
        accumulator: &mut PushAccumulator,
        candidate: &PushCandidate,
        force: bool,
        report: &mut PushReport
    ) -> Result<PushStep> {
        let (linked, unresolved) =
            links::to_remote_links(&candidate.body, &candidate.path, |p| accumulator.lookup(p));
        for target in unresolved {
            report
                .warnings
                .push(format!("{} links to {} which is not on the remote", candidate.path, target));
        }
        let converted = self.converter.to_remote_format(&linked);
        report
            .warnings
            .extend(converted.warnings.iter().map(|w| format!("{}: {}", candidate.path, w)));

        let mut front_matter = self
            .existing_front_matter(&candidate.path)
            .unwrap_or_default();
        let parent = self
            .resolve_parent(state, accumulator, &candidate.path)
            .await?;

        let node = match (&candidate.kind, &candidate.page_id) {
            (CandidateKind::Modified, Some(page_id)) => {
                let local = candidate.version.unwrap_or(0);
                let remote = match conflict::check_versions(self.api.as_ref(), page_id, local, force)
                    .await
                {
                    GuardOutcome::Clear { remote } | GuardOutcome::Forced { remote, .. } => remote,
                    GuardOutcome::Conflict { local, remote } => {
                        return Err(SyncError::Conflict {
                            path: candidate.path.clone(),
                            local,
                            remote
                        });
                    }
                    GuardOutcome::NotFound => {
                        return Err(ApiError::not_found("page", page_id).into());
                    }
                    GuardOutcome::Transport(e) => return Err(e.into())
                };

                if utils::compute_content_hash(&candidate.body)
                    == state.hash_of(page_id).unwrap_or_default()
                    && front_matter.title.as_deref() == Some(candidate.title.as_str())
                    && remote == local
                {
                    return Ok(PushStep::Skipped("no content changes".to_string()));
                }

                let node = self
                    .api
                    .update_page(UpdatePageRequest {
                        page_id: page_id.clone(),
                        title: candidate.title.clone(),
                        body: converted.text,
                        version: remote + 1
                    })
                    .await?;

                if let Some(parent) = &parent
                    && front_matter.parent_id.as_ref() != Some(parent)
                    && parent != page_id
                {
                    match self.api.move_page(page_id, parent).await {
                        Ok(()) => front_matter.parent_id = Some(parent.clone()),
                        Err(e) => report
                            .warnings
                            .push(format!("{} could not be moved: {}", candidate.path, e))
                    }
                }
                node
            }
            (CandidateKind::Modified, None) => {
                return Err(SyncError::Internal(format!(
                    "{} is marked modified but has no page id",
                    candidate.path
                )));
            }
            (CandidateKind::New, _) => {
                let node = self
                    .api
                    .create_page(CreatePageRequest {
                        space_id: state.space_id.clone(),
                        title: candidate.title.clone(),
                        parent_id: parent.clone(),
                        body: converted.text
                    })
                    .await?;
                accumulator.record(&candidate.path, &node.id);
                front_matter.parent_id = parent;
                node
            }
        };

        front_matter.page_id = Some(node.id.clone());
        front_matter.title = Some(candidate.title.clone());
        front_matter.version = node.version;
        front_matter.synced_at = Some(chrono::Utc::now());
        let content = frontmatter::render(&front_matter, &candidate.body)?;
        self.writer.write_atomic(&candidate.path, &content)?;

        state.record(
            &node.id,
            &candidate.path,
            utils::compute_content_hash(&candidate.body)
        );
        self.persister.save(state).await?;
        tracing::info!("pushed {} as page {}", candidate.path, node.id);
        Ok(PushStep::Pushed)
    }

    /// Remote parent for the document at `path`: the page owning the nearest
    /// enclosing readme, else the enclosing folder, else the homepage.
    async fn resolve_parent(
        &self,
        state: &MirrorState,
        accumulator: &PushAccumulator,
        path: &str
    ) -> Result<Option<String>> {
        let mut dir = parent_dir(path).to_string();
        loop {
            for name in [README_FILE, "index.md"] {
                let readme = join_path(&dir, name);
                if readme == path {
                    continue;
                }
                if let Some(id) = accumulator.lookup(&readme) {
                    return Ok(Some(id));
                }
            }
            if !dir.is_empty()
                && let Some(folder_id) = state.folder_at(&dir)
            {
                match self.api.get_folder(folder_id).await {
                    Ok(folder) => return Ok(Some(folder.id)),
                    Err(e) if e.is_not_found() => {
                        tracing::warn!("folder {} for {} no longer exists", folder_id, dir);
                    }
                    Err(e) => return Err(e.into())
                }
            }
            if dir.is_empty() {
                break;
            }
            dir = parent_dir(&dir).to_string();
        }
        Ok(state.homepage_id.clone())
    }

    /// What `pull` and `push` would do, without changing anything.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self) -> Result<StatusReport> {
        let (state, mut warnings) = self.load_state().await?;
        let plan = self.plan_pull(&state, &PullOptions::default()).await?;
        let scanned = scan::scan_candidates(
            self.root(),
            &state,
            self.config.mtime_tolerance_seconds,
            None
        )?;
        warnings.extend(scanned.warnings);
        let schedule = scheduler::schedule(scanned.candidates);
        Ok(StatusReport {
            changes: plan.changes,
            pending: schedule.order,
            warnings
        })
    }
}

/// Documents touched only by link repair keep their sync status: when the
/// recorded hash matched before the rewrite, it is moved to the new body.
fn rehash_repaired(state: &mut MirrorState, repaired: &[RepairedDocument]) {
    let index = state.path_index();
    for doc in repaired {
        let Some(page_id) = index.get(&doc.path) else {
            continue;
        };
        let (Some(before), Some(after)) = (&doc.hash_before, &doc.hash_after) else {
            continue;
        };
        if state.hash_of(page_id) == Some(before.as_str()) {
            state.record(page_id, &doc.path, after.clone());
        }
    }
}

fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Resolve a `--page` selector: a remote or recorded page id, or a recorded
/// document path.
fn select_page(state: &MirrorState, pages: &[RemoteNode], selector: &str) -> Result<String> {
    if pages.iter().any(|p| p.id == selector) || state.path_of(selector).is_some() {
        return Ok(selector.to_string());
    }
    utils::normalize_relative(selector)
        .and_then(|path| state.page_at(&path).map(str::to_string))
        .ok_or_else(|| ApiError::not_found("page", selector).into())
}
