//! Local path generation for remote nodes.
//!
//! Layout rules:
//! - the space homepage is `README.md` at the mirror root
//! - a page with children is `prefix/slug/README.md`
//! - a leaf page is `prefix/slug.md`
//! - a folder is the directory `prefix/slug`
//!
//! `prefix` is the directory of the nearest ancestor that already has a path,
//! extended by the slugs of the ancestors between. Collisions get `-2`, `-3`
//! and so on; readme paths take the suffix on their directory.
//!
//! A reserved path is off limits to every node except its owner, so a page
//! can never be handed a file another page still occupies.

use crate::tree::RemoteTree;
use errors::MirrorError;
use mirror_core::types::RemoteNode;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use utils::{normalize_relative, parent_dir, slugify};

pub const README_FILE: &str = "README.md";

/// Whether a relative path names a readme/index file.
pub fn is_readme(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.eq_ignore_ascii_case(README_FILE) || name.eq_ignore_ascii_case("index.md")
}

/// Resolve a recorded relative path to an absolute path inside `root`.
///
/// Fails for absolute paths, paths climbing out of the root and paths that
/// are not already in normalized form.
pub fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf, MirrorError> {
    match normalize_relative(relative) {
        Some(normalized) if normalized == relative => Ok(root.join(relative)),
        Some(_) => Err(MirrorError::InvalidPath {
            path: relative.to_string(),
            reason: "path is not normalized".to_string()
        }),
        None => Err(MirrorError::PathEscapesRoot {
            path: relative.to_string()
        })
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Directory a node's children live in, given the node's own path.
fn child_dir(path: &str) -> String {
    if is_readme(path) {
        parent_dir(path).to_string()
    } else if let Some(stem) = path.strip_suffix(".md") {
        stem.to_string()
    } else {
        path.to_string()
    }
}

pub struct PathGenerator<'a> {
    tree: &'a RemoteTree,
    homepage_id: Option<String>,
    files: HashSet<String>,
    dirs: HashSet<String>,
    reserved_files: HashMap<String, String>,
    reserved_dirs: HashMap<String, String>,
    assigned: HashMap<String, String>
}

impl<'a> PathGenerator<'a> {
    pub fn new(tree: &'a RemoteTree, homepage_id: Option<&str>) -> Self {
        Self {
            tree,
            homepage_id: homepage_id.map(str::to_string),
            files: HashSet::new(),
            dirs: HashSet::new(),
            reserved_files: HashMap::new(),
            reserved_dirs: HashMap::new(),
            assigned: HashMap::new()
        }
    }

    /// Fix the path of `id` before generation, claiming it.
    pub fn pin(&mut self, id: &str, path: &str) {
        self.claim(path, self.tree.get(id).is_some_and(RemoteNode::is_folder));
        self.assigned.insert(id.to_string(), path.to_string());
    }

    /// Keep `path` for `owner` without assigning it: other nodes are steered
    /// around it, `owner` may still take it or move elsewhere.
    pub fn reserve(&mut self, owner: &str, path: &str, folder: bool) {
        if folder {
            self.reserved_dirs
                .insert(path.to_string(), owner.to_string());
        } else {
            if is_readme(path) {
                self.reserved_dirs
                    .insert(parent_dir(path).to_string(), owner.to_string());
            }
            self.reserved_files
                .insert(path.to_string(), owner.to_string());
        }
    }

    fn file_taken(&self, path: &str, owner: &str) -> bool {
        self.files.contains(path) || self.reserved_files.get(path).is_some_and(|o| o != owner)
    }

    fn dir_taken(&self, path: &str, owner: &str) -> bool {
        self.dirs.contains(path) || self.reserved_dirs.get(path).is_some_and(|o| o != owner)
    }

    fn claim(&mut self, path: &str, folder: bool) {
        if folder {
            self.dirs.insert(path.to_string());
        } else {
            if is_readme(path) {
                self.dirs.insert(parent_dir(path).to_string());
            }
            self.files.insert(path.to_string());
        }
    }

    pub fn assigned(&self) -> &HashMap<String, String> {
        &self.assigned
    }

    /// Path for one node, generated on first request and stable afterwards.
    pub fn generate(&mut self, id: &str) -> Option<String> {
        if let Some(path) = self.assigned.get(id) {
            return Some(path.clone());
        }
        let tree = self.tree;
        let node = tree.get(id)?;

        if self.homepage_id.as_deref() == Some(id) {
            let path = README_FILE.to_string();
            self.claim(&path, false);
            self.assigned.insert(id.to_string(), path.clone());
            return Some(path);
        }

        let prefix = self.prefix_for(id);
        let slug = slugify(&node.title);
        let path = if node.is_folder() {
            self.free_dir(id, &prefix, &slug)
        } else if tree.has_children(id) {
            format!("{}/{}", self.free_dir(id, &prefix, &slug), README_FILE)
        } else {
            self.free_file(id, &prefix, &slug)
        };

        self.claim(&path, node.is_folder());
        self.assigned.insert(id.to_string(), path.clone());
        Some(path)
    }

    /// Generate paths for every node in the tree, parents first.
    pub fn assign_all(&mut self) -> HashMap<String, String> {
        let ids: Vec<String> = self
            .tree
            .parents_first()
            .iter()
            .map(|n| n.id.clone())
            .collect();
        for id in ids {
            self.generate(&id);
        }
        self.assigned.clone()
    }

    fn prefix_for(&self, id: &str) -> String {
        let mut slugs: Vec<String> = Vec::new();
        let mut base = String::new();

        for ancestor in self.tree.ancestors(id) {
            if self.homepage_id.as_deref() == Some(ancestor.id.as_str()) {
                break;
            }
            if let Some(path) = self.assigned.get(&ancestor.id) {
                base = if ancestor.is_folder() {
                    path.clone()
                } else {
                    child_dir(path)
                };
                break;
            }
            slugs.push(slugify(&ancestor.title));
        }

        slugs.reverse();
        slugs
            .into_iter()
            .fold(base, |prefix, slug| join(&prefix, &slug))
    }

    fn free_dir(&self, owner: &str, prefix: &str, slug: &str) -> String {
        let mut candidate = join(prefix, slug);
        let mut n = 2;
        while self.dir_taken(&candidate, owner) {
            candidate = join(prefix, &format!("{}-{}", slug, n));
            n += 1;
        }
        candidate
    }

    fn free_file(&self, owner: &str, prefix: &str, slug: &str) -> String {
        let mut candidate = join(prefix, &format!("{}.md", slug));
        let mut n = 2;
        while self.file_taken(&candidate, owner) {
            candidate = join(prefix, &format!("{}-{}.md", slug, n));
            n += 1;
        }
        candidate
    }
}
