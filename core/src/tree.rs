//! Ancestor resolution of canonical paths against the [`ItemIndex`].
//!
//! The resolver only reads the index. Items it cannot find leave an empty
//! slot in the chain; loading them is up to the caller.

use crate::index::{DetailedItem, ItemIndex};
use crate::paths::{CanonicalForm, CanonicalPath, PathConventions};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncestorSlot {
    pub path: CanonicalPath,
    pub item: Option<DetailedItem>,
}

/// Root (index 0) to target (last) slots along a path. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AncestorChain {
    pub slots: Vec<AncestorSlot>,
}

impl AncestorChain {
    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn root(&self) -> Option<&DetailedItem> { self.slots.first().and_then(|s| s.item.as_ref()) }

    pub fn target(&self) -> Option<&DetailedItem> { self.slots.last().and_then(|s| s.item.as_ref()) }

    pub fn get(&self, position: usize) -> Option<&DetailedItem> {
        self.slots.get(position).and_then(|s| s.item.as_ref())
    }

    pub fn is_complete(&self) -> bool { self.slots.iter().all(|s| s.item.is_some()) }

    /// Paths of the slots whose item is not in the index yet.
    pub fn missing_paths(&self) -> Vec<CanonicalPath> {
        self.slots.iter().filter(|s| s.item.is_none()).map(|s| s.path.clone()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeResolver {
    conventions: PathConventions,
}

impl TreeResolver {
    pub fn new(conventions: PathConventions) -> Self { Self { conventions } }

    pub fn conventions(&self) -> &PathConventions { &self.conventions }

    /// Segments of `target` below `root`, or `None` when `target` is outside of it.
    ///
    /// Trailing separators, a trailing index document and empty segments are
    /// all ignored, so `root/a/`, `root/a//` and `root/a/index.xml` agree.
    fn relative_segments(&self, target: &str, root: &str) -> Option<Vec<String>> {
        let root = trim_root(root);
        let explicit = regex::escape(&self.conventions.to_explicit(root));
        let implicit = regex::escape(self.conventions.to_implicit(root).trim_end_matches('/'));
        let index = regex::escape(&self.conventions.index_document);
        let pattern = format!(r"^(?:{explicit}|{implicit})(?P<rest>/.*?)?(?:/{index})?/*$");
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(err) => {
                warn!(%root, error = %err, "could not build root pattern");
                return None;
            }
        };
        let caps = re.captures(target)?;
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
        Some(rest.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect())
    }

    pub fn resolve_ancestors(&self, target: &str, root: &str, index: &ItemIndex) -> AncestorChain {
        let root = trim_root(root);
        let root_implicit = self.conventions.to_implicit(root);
        let root_item = index.probe(root, CanonicalForm::Explicit, &self.conventions).cloned();
        let mut slots = vec![AncestorSlot { path: root_implicit.clone(), item: root_item }];

        let segments = match self.relative_segments(target, root) {
            Some(segments) => segments,
            None => {
                debug!(%target, %root, "target is outside of the root");
                return AncestorChain { slots };
            }
        };

        let mut running = root_implicit.trim_end_matches('/').to_string();
        for segment in segments {
            running.push('/');
            running.push_str(&segment);
            let item = index.probe(&running, CanonicalForm::Implicit, &self.conventions).cloned();
            slots.push(AncestorSlot { path: running.clone(), item });
        }
        AncestorChain { slots }
    }

    /// Breadcrumb levels for `path`: the root, then every level down to the
    /// item's immediate parent. The item itself is never included.
    pub fn parents_from_path(&self, path: &str, root: &str) -> Vec<CanonicalPath> {
        let root = trim_root(root);
        let root_implicit = self.conventions.to_implicit(root).trim_end_matches('/').to_string();
        let mut parents = vec![root_implicit.clone()];
        let Some(mut segments) = self.relative_segments(path, root) else {
            return parents;
        };
        segments.pop();
        let mut running = root_implicit;
        for segment in segments {
            running.push('/');
            running.push_str(&segment);
            parents.push(running.clone());
        }
        parents
    }

    /// Every prefix of `path`, most specific first, down to the top-level
    /// segment. With a root, stops at (and keeps) the root.
    pub fn individual_paths(&self, path: &str, root: Option<&str>) -> Vec<CanonicalPath> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut paths = Vec::with_capacity(segments.len());
        while !segments.is_empty() {
            paths.push(format!("/{}", segments.join("/")));
            segments.pop();
        }
        if let Some(root) = root {
            if let Some(pos) = paths.iter().position(|p| self.conventions.is_same_item(p, root)) {
                paths.truncate(pos + 1);
            }
        }
        paths
    }

    /// Paths of the ancestors of `target` that still have to be loaded.
    pub fn missing_ancestors(&self, target: &str, root: &str, index: &ItemIndex) -> Vec<CanonicalPath> {
        self.resolve_ancestors(target, root, index).missing_paths()
    }
}

/// `root` without trailing separators; a bare `/` stays `/`.
fn trim_root(root: &str) -> &str {
    match root.trim_end_matches('/') {
        "" if root.starts_with('/') => "/",
        trimmed => trimmed,
    }
}

pub fn resolve_ancestors(target: &str, root: &str, index: &ItemIndex) -> AncestorChain {
    TreeResolver::default().resolve_ancestors(target, root, index)
}

pub fn parents_from_path(path: &str, root: &str) -> Vec<CanonicalPath> {
    TreeResolver::default().parents_from_path(path, root)
}

pub fn individual_paths(path: &str, root: Option<&str>) -> Vec<CanonicalPath> {
    TreeResolver::default().individual_paths(path, root)
}
