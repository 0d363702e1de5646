use anyhow::Result;
use authoring_core::config::AuthoringConfig;
use authoring_core::index::{DetailedItem, SharedItemIndex};
use authoring_core::memory::{load_catalog, InMemoryCatalog};
use authoring_core::paths::CanonicalPath;
use authoring_core::service::{
    build_lookup, ContentInstance, ContentService, ContentType, ContentTypeDirectory, SearchQuery, SearchResult,
    SearchService,
};
use authoring_core::tree::{AncestorChain, TreeResolver};
use axum::{extract::{Path, Query, State}, http::{HeaderValue, StatusCode}, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct ContentParams {
    pub path: String,
}

#[derive(Deserialize)]
pub struct ResolveParams {
    /// Canonical path of the item.
    pub target: Option<String>,
    /// Raw preview URL, used when no target is given.
    pub url: Option<String>,
    pub root: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub target: CanonicalPath,
    pub chain: AncestorChain,
    pub missing: Vec<CanonicalPath>,
    pub breadcrumbs: Vec<CanonicalPath>,
}

#[derive(Serialize)]
pub struct MergeResponse {
    pub added: usize,
    pub total: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<InMemoryCatalog>,
    pub index: SharedItemIndex,
    pub resolver: TreeResolver,
    pub root: CanonicalPath,
}

pub fn build_app(catalog_path: String, config: AuthoringConfig) -> Result<Router> {
    let catalog = load_catalog(FsPath::new(&catalog_path))?.with_conventions(config.paths.clone());
    Ok(build_app_with(catalog, config))
}

pub fn build_app_with(catalog: InMemoryCatalog, config: AuthoringConfig) -> Router {
    let index = catalog.item_index().shared();
    let app_state = AppState {
        catalog: Arc::new(catalog),
        index,
        root: config.paths.content_root.clone(),
        resolver: TreeResolver::new(config.paths),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/:site/search", post(search_handler))
        .route("/api/:site/content", get(content_handler))
        .route("/api/:site/content-types", get(content_types_handler))
        .route("/api/:site/resolve", get(resolve_handler))
        .route("/api/:site/items", post(merge_items_handler))
        .with_state(app_state)
        .layer(cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// Origins from a comma separated list; any origin when none of them parse.
fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

fn check_site(state: &AppState, site: &str) -> Result<(), ApiError> {
    if site == state.catalog.site() {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, format!("unknown site '{site}'")))
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::warn!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

pub async fn search_handler(State(state): State<AppState>, Path(site): Path<String>, Json(query): Json<SearchQuery>) -> Result<Json<SearchResult>, ApiError> {
    check_site(&state, &site)?;
    let start = std::time::Instant::now();
    let result = state.catalog.search(&site, &query).await.map_err(internal)?;
    tracing::debug!(keywords = %query.keywords, total = result.total, took_ms = start.elapsed().as_millis() as u64, "search");
    Ok(Json(result))
}

pub async fn content_handler(State(state): State<AppState>, Path(site): Path<String>, Query(params): Query<ContentParams>) -> Result<Json<ContentInstance>, ApiError> {
    check_site(&state, &site)?;
    match state.catalog.find(&params.path) {
        None => return Err((StatusCode::NOT_FOUND, format!("no content at {}", params.path))),
        Some(entry) if entry.content_type.is_none() => {
            return Err((StatusCode::NOT_FOUND, format!("{} has no content instance", params.path)));
        }
        Some(_) => {}
    }
    let lookup = build_lookup(state.catalog.all_content_types());
    let instance = state.catalog.get_content_instance(&site, &params.path, &lookup).await.map_err(internal)?;
    Ok(Json(instance))
}

pub async fn content_types_handler(State(state): State<AppState>, Path(site): Path<String>) -> Result<Json<Vec<ContentType>>, ApiError> {
    check_site(&state, &site)?;
    let types = state.catalog.content_types(&site).await.map_err(internal)?;
    Ok(Json(types))
}

pub async fn resolve_handler(State(state): State<AppState>, Path(site): Path<String>, Query(params): Query<ResolveParams>) -> Result<Json<ResolveResponse>, ApiError> {
    check_site(&state, &site)?;
    let target = match (params.target, params.url) {
        (Some(target), _) => target,
        (None, Some(url)) => state.resolver.conventions().to_canonical(&url),
        (None, None) => return Err((StatusCode::BAD_REQUEST, "either target or url is required".into())),
    };
    let root = params.root.unwrap_or_else(|| state.root.clone());
    let chain = state.resolver.resolve_ancestors(&target, &root, &state.index.read());
    let missing = chain.missing_paths();
    let breadcrumbs = state.resolver.parents_from_path(&target, &root);
    Ok(Json(ResolveResponse { target, chain, missing, breadcrumbs }))
}

pub async fn merge_items_handler(State(state): State<AppState>, Path(site): Path<String>, Json(items): Json<Vec<DetailedItem>>) -> Result<Json<MergeResponse>, ApiError> {
    check_site(&state, &site)?;
    let mut index = state.index.write();
    let added = index.merge(items);
    tracing::info!(added, total = index.len(), "items merged into index");
    Ok(Json(MergeResponse { added, total: index.len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn allowed_origin(allowed: Option<&str>, origin: &str) -> Option<String> {
        let app: Router = Router::new().route("/health", get(|| async { "ok" })).layer(cors_layer(allowed));
        let req = Request::get("/health").header(header::ORIGIN, origin).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_allows_any_origin_by_default() {
        assert_eq!(allowed_origin(None, "https://studio.example.com").await.as_deref(), Some("*"));
        assert_eq!(allowed_origin(Some(" , "), "https://studio.example.com").await.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn cors_restricts_to_listed_origins() {
        let listed = Some("https://studio.example.com, https://preview.example.com");
        assert_eq!(
            allowed_origin(listed, "https://preview.example.com").await.as_deref(),
            Some("https://preview.example.com")
        );
        assert_eq!(allowed_origin(listed, "https://elsewhere.example.com").await, None);
    }
}
