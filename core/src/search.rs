//! Debounced, hydrating component search behind a single driver task.

use anyhow::Result;
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::bus::{AssetRef, BusEndpoint, BusMessage, ComponentRef, DragPayload};
use crate::service::{
    addressable_components, build_lookup, ContentInstanceLookup, ContentType, ContentTypeLookup, SearchFilters,
    SearchItem, SearchQuery, SearchResult, Services, DEFAULT_PAGE_SIZE,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// How responses of overlapping queries are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupersedePolicy {
    /// Only the most recently issued query may publish; older responses are dropped.
    #[default]
    LatestIssued,
    /// Whatever arrives last overwrites the view, regardless of issue order.
    LastArrival,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub site: String,
    pub debounce: Duration,
    pub page_size: usize,
    pub mime_types: BTreeSet<String>,
    pub supersede: SupersedePolicy,
}

impl SearchSettings {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            debounce: DEFAULT_DEBOUNCE,
            page_size: DEFAULT_PAGE_SIZE,
            mime_types: BTreeSet::new(),
            supersede: SupersedePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchPhase {
    #[default]
    Idle,
    Querying,
    Resolved,
    Failed(String),
}

/// Rendering state written by the driver.
#[derive(Debug, Clone, Default)]
pub struct SearchView {
    pub phase: SearchPhase,
    /// Query whose response is currently shown.
    pub query: Option<SearchQuery>,
    pub result: Option<SearchResult>,
    pub content_instances: ContentInstanceLookup,
    pub content_types: Vec<ContentType>,
    /// Generation of the query whose response is shown; 0 before the first one.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HydratedResult {
    pub result: SearchResult,
    pub content_instances: ContentInstanceLookup,
}

/// Scope a user query to the allowed component types and MIME types.
pub fn scoped_query(keywords: &str, offset: usize, limit: usize, universe: &[ContentType], mime_types: &BTreeSet<String>) -> SearchQuery {
    SearchQuery {
        keywords: keywords.to_string(),
        offset,
        limit,
        or_operator: true,
        filters: SearchFilters {
            content_types: universe.iter().map(|t| t.id.clone()).collect(),
            mime_types: mime_types.clone(),
        },
    }
}

/// Run one query and hydrate its component hits.
///
/// No component hits means no content fetches. Otherwise the fetches run
/// concurrently and the first failure fails the whole result.
pub async fn search(services: &Services, site: &str, query: &SearchQuery, lookup: &ContentTypeLookup) -> Result<HydratedResult> {
    let result = services.search.search(site, query).await?;
    let components: Vec<&SearchItem> = result.items.iter().filter(|item| item.is_component()).collect();
    if components.is_empty() {
        return Ok(HydratedResult { result, content_instances: ContentInstanceLookup::new() });
    }
    let fetches = components.iter().map(|item| services.content.get_content_instance(site, &item.path, lookup));
    let instances = try_join_all(fetches).await?;
    let content_instances = components.iter().map(|item| item.path.clone()).zip(instances).collect();
    Ok(HydratedResult { result, content_instances })
}

enum Command {
    Keywords(String),
    Page { offset: usize, limit: usize },
    RefreshContentTypes,
}

struct Completed {
    generation: u64,
    query: SearchQuery,
    outcome: Result<HydratedResult>,
}

type Publisher = Arc<Mutex<Option<watch::Sender<SearchView>>>>;

pub struct SearchOrchestrator {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SearchView>,
    publisher: Publisher,
    driver: Option<JoinHandle<()>>,
    bus: Option<BusEndpoint>,
}

impl SearchOrchestrator {
    /// Start the driver on the current tokio runtime.
    pub fn spawn(settings: SearchSettings, services: Services, bus: Option<BusEndpoint>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SearchView::default());
        let publisher: Publisher = Arc::new(Mutex::new(Some(view_tx)));
        let driver = Driver {
            keywords: String::new(),
            offset: 0,
            limit: settings.page_size.max(1),
            settings,
            services,
            publisher: publisher.clone(),
            commands: commands_rx,
            universe: Vec::new(),
            lookup: Arc::new(ContentTypeLookup::new()),
            types_ready: false,
            issued: 0,
            inflight: JoinSet::new(),
        };
        let handle = tokio::spawn(driver.run());
        Self { commands: commands_tx, view: view_rx, publisher, driver: Some(handle), bus }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("search driver is gone, command dropped");
        }
    }

    /// Debounced keyword edit.
    pub fn set_keywords(&self, keywords: impl Into<String>) { self.send(Command::Keywords(keywords.into())) }

    /// Immediate query for another page with the current keywords.
    pub fn set_page(&self, offset: usize, limit: usize) { self.send(Command::Page { offset, limit }) }

    /// Reload the content-type universe, then re-run the current query.
    pub fn refresh_content_types(&self) { self.send(Command::RefreshContentTypes) }

    pub fn view(&self) -> SearchView { self.view.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<SearchView> { self.view.clone() }

    pub fn is_torn_down(&self) -> bool { self.publisher.lock().is_none() }

    fn drag_payload(&self, item: &SearchItem) -> Option<DragPayload> {
        if !item.is_component() {
            return Some(DragPayload::Asset(AssetRef { path: item.path.clone(), asset_type: item.item_type.clone() }));
        }
        let view = self.view.borrow();
        let Some(instance) = view.content_instances.get(&item.path) else {
            debug!(path = %item.path, "component not hydrated yet, drag ignored");
            return None;
        };
        let Some(content_type) = view.content_types.iter().find(|t| t.id == instance.content_type_id) else {
            debug!(path = %item.path, content_type = %instance.content_type_id, "unknown content type, drag ignored");
            return None;
        };
        Some(DragPayload::Component(ComponentRef { instance: instance.clone(), content_type: content_type.clone() }))
    }

    /// Tell the preview a drag started; returns whether a message went out.
    pub fn drag_start(&self, item: &SearchItem) -> bool {
        match (&self.bus, self.drag_payload(item)) {
            (Some(bus), Some(payload)) => {
                bus.publish(BusMessage::drag_started(payload));
                true
            }
            _ => false,
        }
    }

    pub fn drag_end(&self, item: &SearchItem) -> bool {
        match (&self.bus, self.drag_payload(item)) {
            (Some(bus), Some(payload)) => {
                bus.publish(BusMessage::drag_ended(payload));
                true
            }
            _ => false,
        }
    }

    /// Sever every pending query. The view keeps its last state.
    pub fn teardown(&mut self) {
        if self.publisher.lock().take().is_some() {
            debug!("search orchestrator torn down");
        }
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl Drop for SearchOrchestrator {
    fn drop(&mut self) { self.teardown(); }
}

struct Driver {
    settings: SearchSettings,
    services: Services,
    publisher: Publisher,
    commands: mpsc::UnboundedReceiver<Command>,
    keywords: String,
    offset: usize,
    limit: usize,
    universe: Vec<ContentType>,
    lookup: Arc<ContentTypeLookup>,
    types_ready: bool,
    issued: u64,
    inflight: JoinSet<Completed>,
}

impl Driver {
    fn publish(&self, update: impl FnOnce(&mut SearchView)) -> bool {
        match self.publisher.lock().as_ref() {
            Some(view) => {
                view.send_modify(update);
                true
            }
            None => false,
        }
    }

    async fn run(mut self) {
        if self.load_content_types().await {
            self.issue();
        }
        let mut pending: Option<(String, Instant)> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, at)| *at).unwrap_or_else(Instant::now);
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Keywords(keywords)) => {
                        pending = Some((keywords, Instant::now() + self.settings.debounce));
                    }
                    Some(Command::Page { offset, limit }) => {
                        self.offset = offset;
                        self.limit = limit.max(1);
                        self.issue_when_ready().await;
                    }
                    Some(Command::RefreshContentTypes) => {
                        self.types_ready = false;
                        self.issue_when_ready().await;
                    }
                    None => break,
                },
                () = sleep_until(deadline), if pending.is_some() => {
                    if let Some((keywords, _)) = pending.take() {
                        self.keywords = keywords;
                        self.offset = 0;
                        self.issue_when_ready().await;
                    }
                }
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => match joined {
                    Ok(completed) => self.apply(completed),
                    Err(err) => warn!(error = %err, "search task did not complete"),
                },
            }
        }
        debug!("search driver stopped");
    }

    /// Fetch the content-type universe; on failure the view shows the error.
    async fn load_content_types(&mut self) -> bool {
        match self.services.content_types.content_types(&self.settings.site).await {
            Ok(types) => {
                let types = addressable_components(types);
                self.lookup = Arc::new(build_lookup(&types));
                self.universe = types;
                self.types_ready = true;
                info!(site = %self.settings.site, content_types = self.universe.len(), "content types loaded");
                let universe = self.universe.clone();
                self.publish(|view| view.content_types = universe);
                true
            }
            Err(err) => {
                warn!(site = %self.settings.site, error = %err, "content types failed to load");
                let message = format!("{err:#}");
                self.publish(|view| view.phase = SearchPhase::Failed(message));
                false
            }
        }
    }

    async fn issue_when_ready(&mut self) {
        if self.types_ready || self.load_content_types().await {
            self.issue();
        }
    }

    fn issue(&mut self) {
        self.issued += 1;
        let generation = self.issued;
        let query = scoped_query(&self.keywords, self.offset, self.limit, &self.universe, &self.settings.mime_types);
        debug!(generation, keywords = %query.keywords, offset = query.offset, limit = query.limit, "issuing search");
        self.publish(|view| view.phase = SearchPhase::Querying);

        let services = self.services.clone();
        let site = self.settings.site.clone();
        let lookup = self.lookup.clone();
        self.inflight.spawn(async move {
            let outcome = search(&services, &site, &query, &lookup).await;
            Completed { generation, query, outcome }
        });
    }

    fn apply(&mut self, completed: Completed) {
        let Completed { generation, query, outcome } = completed;
        if self.settings.supersede == SupersedePolicy::LatestIssued && generation < self.issued {
            debug!(generation, latest = self.issued, "discarding superseded search response");
            return;
        }
        match outcome {
            Ok(hydrated) => {
                debug!(generation, total = hydrated.result.total, hydrated = hydrated.content_instances.len(), "search resolved");
                self.publish(|view| {
                    view.phase = SearchPhase::Resolved;
                    view.query = Some(query);
                    view.result = Some(hydrated.result);
                    view.content_instances = hydrated.content_instances;
                    view.generation = generation;
                });
            }
            Err(err) => {
                warn!(generation, error = %err, "search failed");
                let message = format!("{err:#}");
                self.publish(|view| {
                    view.phase = SearchPhase::Failed(message);
                    view.query = Some(query);
                    view.result = None;
                    view.content_instances.clear();
                    view.generation = generation;
                });
            }
        }
    }
}
