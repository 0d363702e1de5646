use crate::paths::{CanonicalForm, CanonicalPath, PathConventions};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedItem {
    pub id: String,
    pub path: CanonicalPath,
    pub label: String,
    pub content_type: String,
    #[serde(default)]
    pub previewable: bool,
    #[serde(default)]
    pub children_loaded: bool,
}

/// Items observed so far in the current view, keyed by canonical path.
///
/// A key may be in either canonical form depending on where the item was
/// first seen, so lookups go through [`ItemIndex::probe`].
#[derive(Debug, Default, Clone)]
pub struct ItemIndex {
    items: HashMap<CanonicalPath, DetailedItem>,
}

pub type SharedItemIndex = Arc<RwLock<ItemIndex>>;

impl ItemIndex {
    pub fn new() -> Self { Self::default() }

    pub fn shared(self) -> SharedItemIndex { Arc::new(RwLock::new(self)) }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Insert under the item's own path, replacing any previous entry for that key.
    pub fn insert(&mut self, item: DetailedItem) -> Option<DetailedItem> {
        self.items.insert(item.path.clone(), item)
    }

    /// Merge a batch of freshly loaded items; returns how many keys were new.
    pub fn merge<I: IntoIterator<Item = DetailedItem>>(&mut self, items: I) -> usize {
        items.into_iter().filter(|item| self.insert(item.clone()).is_none()).count()
    }

    pub fn remove(&mut self, key: &str) -> Option<DetailedItem> { self.items.remove(key) }

    pub fn get(&self, key: &str) -> Option<&DetailedItem> { self.items.get(key) }

    /// Look up `path` under both canonical forms, `first` before the other.
    pub fn probe(&self, path: &str, first: CanonicalForm, conventions: &PathConventions) -> Option<&DetailedItem> {
        self.items
            .get(&conventions.to_form(path, first))
            .or_else(|| self.items.get(&conventions.to_form(path, first.other())))
    }
}

impl FromIterator<DetailedItem> for ItemIndex {
    fn from_iter<I: IntoIterator<Item = DetailedItem>>(iter: I) -> Self {
        let mut index = ItemIndex::new();
        index.merge(iter);
        index
    }
}
