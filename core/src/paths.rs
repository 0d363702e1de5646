use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type CanonicalPath = String;

pub const DEFAULT_CONTENT_ROOT: &str = "/site/website";
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.xml";

lazy_static! {
    static ref SCHEME_AUTHORITY: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/?#;]*").expect("valid regex");
    static ref DEFAULTS: PathConventions = PathConventions::default();
}

/// The two surface forms of a canonical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalForm {
    /// Directory style, no index document: `/site/website/about`
    Implicit,
    /// Ends in the index document: `/site/website/about/index.xml`
    Explicit,
}

impl CanonicalForm {
    pub fn other(self) -> Self {
        match self {
            CanonicalForm::Implicit => CanonicalForm::Explicit,
            CanonicalForm::Explicit => CanonicalForm::Implicit,
        }
    }
}

/// Naming conventions of the backing content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConventions {
    pub content_root: String,
    pub index_document: String,
    pub rendered_extension: String,
    pub source_extension: String,
}

impl Default for PathConventions {
    fn default() -> Self {
        Self {
            content_root: DEFAULT_CONTENT_ROOT.to_string(),
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
            rendered_extension: ".html".to_string(),
            source_extension: ".xml".to_string(),
        }
    }
}

impl PathConventions {
    fn index_suffix(&self) -> String { format!("/{}", self.index_document) }

    /// Map a raw preview URL (absolute or site relative) onto its canonical path.
    ///
    /// Never fails: query, fragment and `;` parameters are dropped, a rendered
    /// extension becomes the source extension, and anything that is not a
    /// source document is treated as a directory with an index document.
    pub fn to_canonical(&self, raw_url: &str) -> CanonicalPath {
        let mut path = SCHEME_AUTHORITY.replace(raw_url.trim(), "").into_owned();
        for separator in ['?', '#', ';'] {
            if let Some(pos) = path.find(separator) {
                path.truncate(pos);
            }
        }
        if !self.rendered_extension.is_empty() {
            if let Some(stem) = path.strip_suffix(self.rendered_extension.as_str()) {
                path = format!("{stem}{}", self.source_extension);
            }
        }
        if self.source_extension.is_empty() || !path.ends_with(self.source_extension.as_str()) {
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(&self.index_document);
        }
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        format!("{}{}", self.content_root, path)
    }

    pub fn to_implicit(&self, path: &str) -> CanonicalPath {
        let suffix = self.index_suffix();
        let mut trimmed = path;
        while let Some(rest) = trimmed.strip_suffix(suffix.as_str()) {
            trimmed = rest;
        }
        trimmed.to_string()
    }

    pub fn to_explicit(&self, path: &str) -> CanonicalPath {
        let suffix = self.index_suffix();
        if path.ends_with(suffix.as_str()) {
            path.to_string()
        } else {
            format!("{path}{suffix}")
        }
    }

    pub fn to_form(&self, path: &str, form: CanonicalForm) -> CanonicalPath {
        match form {
            CanonicalForm::Implicit => self.to_implicit(path),
            CanonicalForm::Explicit => self.to_explicit(path),
        }
    }

    /// Parent in implicit form. The content root maps to its own parent
    /// directory and `/` maps to the empty string.
    pub fn parent_of(&self, path: &str) -> CanonicalPath {
        let implicit = self.to_implicit(path);
        match implicit.rfind('/') {
            Some(pos) => implicit[..pos].to_string(),
            None => String::new(),
        }
    }

    /// Preview URL for a canonical path; the inverse of [`Self::to_canonical`]
    /// for paths under the content root.
    pub fn to_preview_url(&self, path: &str) -> String {
        let relative = path.strip_prefix(self.content_root.as_str()).unwrap_or(path);
        let relative = self.to_implicit(relative);
        let url = match relative.strip_suffix(self.source_extension.as_str()) {
            Some(stem) if !self.source_extension.is_empty() => format!("{stem}{}", self.rendered_extension),
            _ => relative,
        };
        if url.is_empty() {
            "/".to_string()
        } else if url.starts_with('/') {
            url
        } else {
            format!("/{url}")
        }
    }

    pub fn is_same_item(&self, a: &str, b: &str) -> bool {
        self.to_explicit(a) == self.to_explicit(b)
    }
}

pub fn to_canonical(raw_url: &str) -> CanonicalPath { DEFAULTS.to_canonical(raw_url) }

pub fn to_implicit(path: &str) -> CanonicalPath { DEFAULTS.to_implicit(path) }

pub fn to_explicit(path: &str) -> CanonicalPath { DEFAULTS.to_explicit(path) }

pub fn parent_of(path: &str) -> CanonicalPath { DEFAULTS.parent_of(path) }

pub fn to_preview_url(path: &str) -> String { DEFAULTS.to_preview_url(path) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strips_query_fragment_and_params() {
        assert_eq!(to_canonical("/about-us?x=1#top"), "/site/website/about-us/index.xml");
        assert_eq!(to_canonical("/a/b.html;jsessionid=1"), "/site/website/a/b.xml");
        assert_eq!(to_canonical("/articles/#comments"), "/site/website/articles/index.xml");
    }

    #[test]
    fn canonical_drops_scheme_and_host() {
        assert_eq!(to_canonical("http://localhost:8080/blog/post.html?crafterSite=x"), "/site/website/blog/post.xml");
        assert_eq!(to_canonical("https://example.com"), "/site/website/index.xml");
    }

    #[test]
    fn canonical_is_total_on_degenerate_input() {
        assert_eq!(to_canonical(""), "/site/website/index.xml");
        assert_eq!(to_canonical("/"), "/site/website/index.xml");
        assert_eq!(to_canonical("?only=query"), "/site/website/index.xml");
        assert_eq!(to_canonical("relative"), "/site/website/relative/index.xml");
    }

    #[test]
    fn forms_round_trip() {
        let paths = ["/site/website/a/b/index.xml", "/site/website/a/b", "/site/website", "/site/website/index.xml"];
        for p in paths {
            assert_eq!(to_explicit(&to_implicit(p)), to_explicit(p), "{p}");
            assert_eq!(to_implicit(&to_explicit(p)), to_implicit(p), "{p}");
            assert_eq!(to_implicit(&to_implicit(p)), to_implicit(p), "{p}");
            assert_eq!(to_explicit(&to_explicit(p)), to_explicit(p), "{p}");
            assert_eq!(to_explicit(p), format!("{}/index.xml", to_implicit(p)));
        }
    }

    #[test]
    fn parent_of_works_in_both_forms() {
        assert_eq!(parent_of("/site/website/a/b/index.xml"), "/site/website/a");
        assert_eq!(parent_of("/site/website/a/b"), "/site/website/a");
        assert_eq!(parent_of("/site/website"), "/site");
        assert_eq!(parent_of("/"), "");
    }

    #[test]
    fn preview_url_inverts_canonical() {
        assert_eq!(to_preview_url("/site/website/index.xml"), "/");
        assert_eq!(to_preview_url("/site/website/about/index.xml"), "/about");
        assert_eq!(to_preview_url("/site/website/blog/post.xml"), "/blog/post.html");
        assert_eq!(to_canonical(&to_preview_url("/site/website/blog/post.xml")), "/site/website/blog/post.xml");
    }

    #[test]
    fn custom_conventions() {
        let conventions = PathConventions {
            content_root: "/content".into(),
            index_document: "default.md".into(),
            rendered_extension: ".htm".into(),
            source_extension: ".md".into(),
        };
        assert_eq!(conventions.to_canonical("/docs/"), "/content/docs/default.md");
        assert_eq!(conventions.to_canonical("/docs/page.htm"), "/content/docs/page.md");
        assert!(conventions.is_same_item("/content/docs", "/content/docs/default.md"));
    }
}
