use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use crate::bus::DEFAULT_BUS_CAPACITY;
use crate::paths::PathConventions;
use crate::search::{SearchSettings, SupersedePolicy};
use crate::service::DEFAULT_PAGE_SIZE;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthoringConfig {
    pub site: String,
    pub paths: PathConventions,
    pub search: SearchConfig,
    pub bus: BusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_mime_types")]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub supersede: SupersedePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            page_size: default_page_size(),
            mime_types: default_mime_types(),
            supersede: SupersedePolicy::default(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    400
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_mime_types() -> Vec<String> {
    ["image/png", "image/jpeg", "image/gif", "video/mp4", "image/svg+xml"].into_iter().map(String::from).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

fn default_capacity() -> usize {
    DEFAULT_BUS_CAPACITY
}

impl AuthoringConfig {
    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            site: self.site.clone(),
            debounce: Duration::from_millis(self.search.debounce_ms),
            page_size: self.search.page_size,
            mime_types: self.search.mime_types.iter().cloned().collect::<BTreeSet<_>>(),
            supersede: self.search.supersede,
        }
    }
}

pub fn parse_config(content: &str) -> Result<AuthoringConfig> {
    let config: AuthoringConfig = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if !config.paths.content_root.starts_with('/') {
        anyhow::bail!("paths.content_root must start with '/'");
    }
    if config.paths.index_document.is_empty() || config.paths.index_document.contains('/') {
        anyhow::bail!("paths.index_document must be a bare file name");
    }
    if config.search.debounce_ms == 0 {
        anyhow::bail!("search.debounce_ms must be > 0");
    }
    if config.search.page_size == 0 {
        anyhow::bail!("search.page_size must be >= 1");
    }
    if config.bus.capacity == 0 {
        anyhow::bail!("bus.capacity must be >= 1");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<AuthoringConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.paths, PathConventions::default());
        assert_eq!(config.search.debounce_ms, 400);
        assert_eq!(config.search.page_size, 10);
        assert_eq!(config.search.supersede, SupersedePolicy::LatestIssued);
        assert!(config.search.mime_types.contains(&"image/png".to_string()));
        assert_eq!(config.bus.capacity, 256);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            site = "editorial"
            [paths]
            content_root = "/content"
            [search]
            supersede = "last-arrival"
            page_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.site, "editorial");
        assert_eq!(config.paths.content_root, "/content");
        assert_eq!(config.paths.index_document, "index.xml");
        assert_eq!(config.search.supersede, SupersedePolicy::LastArrival);
        let settings = config.search_settings();
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.debounce, Duration::from_millis(400));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_config("[search]\ndebounce_ms = 0").is_err());
        assert!(parse_config("[search]\npage_size = 0").is_err());
        assert!(parse_config("[paths]\ncontent_root = \"site\"").is_err());
        assert!(parse_config("[paths]\nindex_document = \"a/b.xml\"").is_err());
        assert!(parse_config("[search]\nsupersede = \"sometimes\"").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authoring.toml");
        std::fs::write(&path, "site = \"blog\"").unwrap();
        assert_eq!(load_config(&path).unwrap().site, "blog");
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
