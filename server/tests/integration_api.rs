use authoring_core::config::AuthoringConfig;
use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;
use tower::ServiceExt;

fn write_tiny_catalog(dir: &std::path::Path) -> String {
    let catalog = json!({
        "site": "editorial",
        "contentTypes": [
            { "id": "/component/hero", "name": "Hero", "type": "component" },
            { "id": "/component/level-descriptor", "name": "Level", "type": "component" },
            { "id": "/page/section", "name": "Section", "type": "page" }
        ],
        "entries": [
            { "id": "home", "path": "/site/website/index.xml", "label": "Home", "type": "Page", "contentType": "/page/section", "previewable": true },
            { "id": "news", "path": "/site/website/news/index.xml", "label": "News", "type": "Page", "contentType": "/page/section", "previewable": true },
            { "id": "weather", "path": "/site/website/news/local/weather/index.xml", "label": "Weather", "type": "Page", "contentType": "/page/section", "previewable": true },
            { "id": "hero", "path": "/site/components/hero/launch.xml", "label": "Launch hero", "type": "Component", "contentType": "/component/hero", "fields": { "headline": "We launched" } },
            { "id": "logo", "path": "/static-assets/images/logo.png", "label": "Logo", "type": "Image", "mimeType": "image/png" }
        ]
    });
    let path = dir.join("catalog.json");
    fs::write(&path, serde_json::to_vec_pretty(&catalog).unwrap()).unwrap();
    path.to_string_lossy().to_string()
}

fn app() -> (tempfile::TempDir, Router) {
    let dir = tempdir().unwrap();
    let catalog = write_tiny_catalog(dir.path());
    let app = authoring_server::build_app(catalog, AuthoringConfig::default()).unwrap();
    (dir, app)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    call(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Bytes) {
    let req = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    call(app, req).await
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, app) = app();
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_applies_filters_and_reports_total() {
    let (_dir, app) = app();
    let query = json!({
        "keywords": "",
        "offset": 0,
        "limit": 1,
        "orOperator": true,
        "filters": { "contentTypes": ["/component/hero"], "mimeTypes": ["image/png"] }
    });
    let (status, body) = post_json(app, "/api/editorial/search", query).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total"], 2);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["path"], "/site/components/hero/launch.xml");
    assert_eq!(items[0]["type"], "Component");
}

#[tokio::test]
async fn unknown_site_is_not_found() {
    let (_dir, app) = app();
    let (status, _) = post_json(app, "/api/other/search", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn content_instance_by_path() {
    let (_dir, app) = app();
    let (status, body) = get(app.clone(), "/api/editorial/content?path=/site/components/hero/launch.xml").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["contentTypeId"], "/component/hero");
    assert_eq!(json["fields"]["headline"], "We launched");

    let (status, _) = get(app, "/api/editorial/content?path=/site/components/missing.xml").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn asset_without_content_type_is_not_found() {
    let (_dir, app) = app();
    let (status, body) = get(app, "/api/editorial/content?path=/static-assets/images/logo.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8_lossy(&body).contains("no content instance"));
}

#[tokio::test]
async fn content_types_exclude_level_descriptor() {
    let (_dir, app) = app();
    let (status, body) = get(app, "/api/editorial/content-types").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<&str> = json.as_array().unwrap().iter().map(|t| t["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["/component/hero"]);
}

#[tokio::test]
async fn resolve_returns_one_slot_per_segment() {
    let (_dir, app) = app();
    let (status, body) = get(app, "/api/editorial/resolve?url=/news/local/weather/").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["target"], "/site/website/news/local/weather/index.xml");
    let slots = json["chain"]["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 4);
    assert_eq!(slots[0]["item"]["id"], "home");
    assert_eq!(slots[1]["item"]["id"], "news");
    assert!(slots[2]["item"].is_null());
    assert_eq!(slots[3]["item"]["id"], "weather");
    assert_eq!(json["missing"], json!(["/site/website/news/local"]));
}

#[tokio::test]
async fn merged_items_fill_missing_slots() {
    let (_dir, app) = app();
    let item = json!([{
        "id": "local-section",
        "path": "/site/website/news/local",
        "label": "Local",
        "contentType": "/page/section"
    }]);
    let (status, body) = post_json(app.clone(), "/api/editorial/items", item).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["added"], 1);

    let (_, body) = get(app, "/api/editorial/resolve?target=/site/website/news/local/weather/index.xml").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["missing"], json!([]));
    assert_eq!(json["chain"]["slots"][2]["item"]["id"], "local-section");
}

#[tokio::test]
async fn resolve_requires_a_target() {
    let (_dir, app) = app();
    let (status, _) = get(app, "/api/editorial/resolve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
