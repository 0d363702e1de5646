//! Maps preview navigation back onto the site's item index.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bus::{BusMessage, BusSubscription};
use crate::index::SharedItemIndex;
use crate::paths::{CanonicalPath, PathConventions};
use crate::tree::{AncestorChain, TreeResolver};

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    pub url: String,
    pub path: CanonicalPath,
    pub chain: AncestorChain,
    /// Ancestors the caller still has to load into the index.
    pub missing: Vec<CanonicalPath>,
    pub breadcrumbs: Vec<CanonicalPath>,
}

pub struct NavigationTracker {
    resolver: TreeResolver,
    root: CanonicalPath,
    index: SharedItemIndex,
    current: Option<NavigationState>,
}

impl NavigationTracker {
    pub fn new(index: SharedItemIndex, conventions: PathConventions) -> Self {
        let root = conventions.content_root.clone();
        Self { resolver: TreeResolver::new(conventions), root, index, current: None }
    }

    pub fn with_root(mut self, root: impl Into<CanonicalPath>) -> Self {
        self.root = root.into();
        self
    }

    pub fn current(&self) -> Option<&NavigationState> { self.current.as_ref() }

    fn resolve(&self, url: &str) -> NavigationState {
        let path = self.resolver.conventions().to_canonical(url);
        let chain = self.resolver.resolve_ancestors(&path, &self.root, &self.index.read());
        let missing = chain.missing_paths();
        let breadcrumbs = self.resolver.parents_from_path(&path, &self.root);
        NavigationState { url: url.to_string(), path, chain, missing, breadcrumbs }
    }

    /// The preview is now showing `url`.
    pub fn observe(&mut self, url: &str) -> &NavigationState {
        let state = self.resolve(url);
        debug!(url, path = %state.path, missing = state.missing.len(), "preview navigated");
        self.current.insert(state)
    }

    /// Re-resolve the current location, e.g. after missing ancestors were merged.
    pub fn refresh(&mut self) -> Option<&NavigationState> {
        let url = self.current.as_ref()?.url.clone();
        Some(self.observe(&url))
    }

    /// Apply a bus message; only navigation reports are relevant.
    pub fn handle(&mut self, message: &BusMessage) -> Option<&NavigationState> {
        match message {
            BusMessage::PreviewNavigated { url } => Some(self.observe(url)),
            _ => None,
        }
    }
}

/// Follow navigation reports from the preview until the bus closes.
pub fn spawn_navigation_listener(
    mut tracker: NavigationTracker,
    mut subscription: BusSubscription,
) -> (JoinHandle<()>, watch::Receiver<Option<NavigationState>>) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            if let Some(state) = tracker.handle(&message) {
                let _ = tx.send(Some(state.clone()));
            }
        }
        debug!("bus closed, navigation listener stopping");
    });
    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::CrossContextBus;
    use crate::index::{DetailedItem, ItemIndex};

    fn item(path: &str) -> DetailedItem {
        DetailedItem {
            id: path.into(),
            path: path.into(),
            label: path.into(),
            content_type: "/page/generic".into(),
            previewable: true,
            children_loaded: false,
        }
    }

    #[test]
    fn observe_reports_missing_ancestors_until_merged() {
        let index = [item("/site/website/index.xml"), item("/site/website/blog/post.xml")]
            .into_iter()
            .collect::<ItemIndex>()
            .shared();
        let mut tracker = NavigationTracker::new(index.clone(), PathConventions::default());

        let state = tracker.observe("http://localhost:8080/blog/post.html?preview=true");
        assert_eq!(state.path, "/site/website/blog/post.xml");
        assert_eq!(state.chain.len(), 3);
        assert_eq!(state.missing, vec!["/site/website/blog".to_string()]);
        assert_eq!(state.breadcrumbs, vec!["/site/website", "/site/website/blog"]);

        index.write().merge([item("/site/website/blog/index.xml")]);
        let state = tracker.refresh().unwrap();
        assert!(state.missing.is_empty());
        assert!(state.chain.is_complete());
    }

    #[tokio::test]
    async fn listener_follows_preview_reports() {
        let index = [item("/site/website/index.xml")].into_iter().collect::<ItemIndex>().shared();
        let (shell, preview) = CrossContextBus::open(8);
        let tracker = NavigationTracker::new(index, PathConventions::default());
        let (_handle, mut rx) = spawn_navigation_listener(tracker, shell.subscribe());

        preview.publish(BusMessage::PreviewNavigated { url: "/".into() });
        rx.changed().await.unwrap();
        let state = rx.borrow().clone().unwrap();
        assert_eq!(state.path, "/site/website/index.xml");
        assert_eq!(state.chain.len(), 1);
        assert!(state.chain.root().is_some());
    }
}
