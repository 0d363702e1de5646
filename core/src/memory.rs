//! In-memory catalog implementing every service trait.
//!
//! Backs the HTTP server and the tests. Keyword matching goes through the
//! [`tokenizer`](crate::tokenizer) over each entry's label and path.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::index::{DetailedItem, ItemIndex};
use crate::paths::{CanonicalPath, PathConventions};
use crate::service::{
    addressable_components, ContentInstance, ContentService, ContentType, ContentTypeDirectory, ContentTypeLookup,
    SearchItem, SearchQuery, SearchResult, SearchService, COMPONENT_ITEM_TYPE,
};
use crate::tokenizer::KeywordMatcher;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub path: CanonicalPath,
    pub label: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub previewable: bool,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl CatalogEntry {
    pub fn is_component(&self) -> bool { self.item_type == COMPONENT_ITEM_TYPE }

    fn search_item(&self) -> SearchItem {
        SearchItem {
            path: self.path.clone(),
            name: self.label.clone(),
            item_type: self.item_type.clone(),
            previewable: self.previewable,
            mime_type: self.mime_type.clone(),
        }
    }

    fn detailed_item(&self) -> DetailedItem {
        DetailedItem {
            id: self.id.clone(),
            path: self.path.clone(),
            label: self.label.clone(),
            content_type: self.content_type.clone().unwrap_or_default(),
            previewable: self.previewable,
            children_loaded: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub site: String,
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    catalog: Catalog,
    conventions: PathConventions,
}

impl InMemoryCatalog {
    pub fn new(catalog: Catalog) -> Self { Self { catalog, conventions: PathConventions::default() } }

    pub fn with_conventions(mut self, conventions: PathConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn site(&self) -> &str { &self.catalog.site }

    pub fn all_content_types(&self) -> &[ContentType] { &self.catalog.content_types }

    /// Entry at `path`, in either canonical form.
    pub fn find(&self, path: &str) -> Option<&CatalogEntry> {
        self.catalog.entries.iter().find(|e| self.conventions.is_same_item(&e.path, path))
    }

    /// Item index seeded with every catalog entry.
    pub fn item_index(&self) -> ItemIndex {
        self.catalog.entries.iter().map(CatalogEntry::detailed_item).collect()
    }

    fn check_site(&self, site: &str) -> Result<()> {
        if site != self.catalog.site {
            bail!("unknown site '{site}'");
        }
        Ok(())
    }

    fn passes_filters(&self, entry: &CatalogEntry, query: &SearchQuery) -> bool {
        let filters = &query.filters;
        if filters.is_empty() {
            return true;
        }
        let by_type = entry.content_type.as_ref().is_some_and(|t| filters.content_types.contains(t));
        let by_mime = entry.mime_type.as_ref().is_some_and(|m| filters.mime_types.contains(m));
        by_type || by_mime
    }
}

pub fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&content).with_context(|| "Failed to parse catalog file")?;
    tracing::info!(site = %catalog.site, entries = catalog.entries.len(), "catalog loaded");
    Ok(InMemoryCatalog::new(catalog))
}

#[async_trait]
impl SearchService for InMemoryCatalog {
    async fn search(&self, site: &str, query: &SearchQuery) -> Result<SearchResult> {
        self.check_site(site)?;
        let matcher = KeywordMatcher::new(&query.keywords, query.or_operator);
        let mut hits: Vec<&CatalogEntry> = self
            .catalog
            .entries
            .iter()
            .filter(|e| self.passes_filters(e, query))
            .filter(|e| matcher.matches([e.label.as_str(), e.path.as_str()]))
            .collect();
        hits.sort_by(|a, b| a.path.cmp(&b.path));
        let total = hits.len();
        let items = hits.into_iter().skip(query.offset).take(query.limit).map(CatalogEntry::search_item).collect();
        Ok(SearchResult { items, total })
    }
}

#[async_trait]
impl ContentService for InMemoryCatalog {
    async fn get_content_instance(&self, site: &str, path: &str, lookup: &ContentTypeLookup) -> Result<ContentInstance> {
        self.check_site(site)?;
        let entry = self.find(path).ok_or_else(|| anyhow!("no content at {path}"))?;
        let content_type_id = entry.content_type.clone().ok_or_else(|| anyhow!("{path} has no content type"))?;
        if !lookup.contains_key(&content_type_id) {
            bail!("content type {content_type_id} of {path} is not in the lookup");
        }
        Ok(ContentInstance {
            id: entry.id.clone(),
            path: entry.path.clone(),
            label: entry.label.clone(),
            content_type_id,
            fields: entry.fields.clone(),
        })
    }
}

#[async_trait]
impl ContentTypeDirectory for InMemoryCatalog {
    async fn content_types(&self, site: &str) -> Result<Vec<ContentType>> {
        self.check_site(site)?;
        Ok(addressable_components(self.catalog.content_types.iter().cloned()))
    }
}
