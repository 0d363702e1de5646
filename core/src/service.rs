use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::paths::CanonicalPath;

/// Item type tag of component search hits.
pub const COMPONENT_ITEM_TYPE: &str = "Component";
/// Content-type id of the level descriptor, which is never addressable.
pub const LEVEL_DESCRIPTOR_TYPE: &str = "/component/level-descriptor";
pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    pub content_types: BTreeSet<String>,
    pub mime_types: BTreeSet<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool { self.content_types.is_empty() && self.mime_types.is_empty() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchQuery {
    pub keywords: String,
    pub offset: usize,
    pub limit: usize,
    /// Match any keyword instead of all of them.
    pub or_operator: bool,
    pub filters: SearchFilters,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self { keywords: String::new(), offset: 0, limit: DEFAULT_PAGE_SIZE, or_operator: false, filters: SearchFilters::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItem {
    pub path: CanonicalPath,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub previewable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl SearchItem {
    pub fn is_component(&self) -> bool { self.item_type == COMPONENT_ITEM_TYPE }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSearchResult")]
pub struct SearchResult {
    pub items: Vec<SearchItem>,
    pub total: usize,
}

/// Services report the total as `total`, `count`, or both.
#[derive(Deserialize)]
struct RawSearchResult {
    #[serde(default)]
    items: Vec<SearchItem>,
    total: Option<usize>,
    count: Option<usize>,
}

impl From<RawSearchResult> for SearchResult {
    fn from(raw: RawSearchResult) -> Self {
        Self { items: raw.items, total: raw.total.or(raw.count).unwrap_or_default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ContentType {
    pub fn is_component(&self) -> bool { self.kind == "component" }
}

pub type ContentTypeLookup = HashMap<String, ContentType>;

pub fn build_lookup<'a, I: IntoIterator<Item = &'a ContentType>>(types: I) -> ContentTypeLookup {
    types.into_iter().map(|t| (t.id.clone(), t.clone())).collect()
}

/// Component types a search may return, minus the level descriptor.
pub fn addressable_components<I: IntoIterator<Item = ContentType>>(types: I) -> Vec<ContentType> {
    types.into_iter().filter(|t| t.is_component() && t.id != LEVEL_DESCRIPTOR_TYPE).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInstance {
    pub id: String,
    pub path: CanonicalPath,
    pub label: String,
    pub content_type_id: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

pub type ContentInstanceLookup = HashMap<CanonicalPath, ContentInstance>;

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, site: &str, query: &SearchQuery) -> Result<SearchResult>;
}

#[async_trait]
pub trait ContentService: Send + Sync {
    async fn get_content_instance(&self, site: &str, path: &str, lookup: &ContentTypeLookup) -> Result<ContentInstance>;
}

#[async_trait]
pub trait ContentTypeDirectory: Send + Sync {
    /// Addressable component content types of `site`.
    async fn content_types(&self, site: &str) -> Result<Vec<ContentType>>;
}

/// The three collaborators a search orchestrator talks to.
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn SearchService>,
    pub content: Arc<dyn ContentService>,
    pub content_types: Arc<dyn ContentTypeDirectory>,
}

impl Services {
    /// Use one backend for all three roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SearchService + ContentService + ContentTypeDirectory + 'static,
    {
        Self { search: backend.clone(), content: backend.clone(), content_types: backend }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_read_from_count_or_total() {
        let a: SearchResult = serde_json::from_str(r#"{"items":[],"total":7}"#).unwrap();
        let b: SearchResult = serde_json::from_str(r#"{"items":[],"count":7}"#).unwrap();
        let both: SearchResult = serde_json::from_str(r#"{"items":[],"total":7,"count":7}"#).unwrap();
        let neither: SearchResult = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert_eq!(a.total, 7);
        assert_eq!(b.total, 7);
        assert_eq!(both.total, 7);
        assert_eq!(neither.total, 0);
        assert_eq!(serde_json::to_value(&both).unwrap()["total"], 7);
    }

    #[test]
    fn level_descriptor_is_not_addressable() {
        let types = vec![
            ContentType { id: "/component/hero".into(), name: "Hero".into(), kind: "component".into() },
            ContentType { id: LEVEL_DESCRIPTOR_TYPE.into(), name: "Level".into(), kind: "component".into() },
            ContentType { id: "/page/home".into(), name: "Home".into(), kind: "page".into() },
        ];
        let ids: Vec<String> = addressable_components(types).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["/component/hero".to_string()]);
    }

    #[test]
    fn query_defaults_fill_missing_keys() {
        let q: SearchQuery = serde_json::from_str(r#"{"keywords":"hero"}"#).unwrap();
        assert_eq!(q.limit, DEFAULT_PAGE_SIZE);
        assert!(q.filters.is_empty());
        assert!(!q.or_operator);
    }
}
