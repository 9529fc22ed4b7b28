//! Response strategies: network first for API and documents, cache first
//! for static assets, each with its own offline fallback.

use axum::{
  http::StatusCode,
  response::{Html, IntoResponse, Json, Response},
};
use color_eyre::Result;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use super::origin::{OriginRequest, OriginResponse};
use super::route::Route;
use super::store::CachedResponse;
use super::{Edge, Phase};
use crate::pokeapi::normalize_key;

const OFFLINE_DOCUMENT: &str = "<h1>PokeApp Offline</h1>";
const OFFLINE_SCRIPT: &str = "console.log(\"Resource unavailable offline\");";
const OFFLINE_TEXT: &str = "Resource unavailable offline";
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "ico"];

impl Edge {
  /// Serve one request according to its route.
  pub async fn handle(&self, route: Route, request: OriginRequest) -> Response {
    // Not in control yet: behave like a plain proxy
    if self.phase() != Phase::Activated {
      return self.pass_through(request).await;
    }

    match route {
      Route::Bypass | Route::DevTooling => self.pass_through(request).await,
      Route::Api => match self.api(request).await {
        Ok(response) => response,
        Err(e) => {
          error!(error = %e, "API strategy failed");
          (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "server_error", "message": "Edge proxy error" })),
          )
            .into_response()
        }
      },
      Route::Document => self.document(request).await,
      Route::Static => self.static_asset(request).await,
    }
  }

  async fn pass_through(&self, request: OriginRequest) -> Response {
    let path = request.path.clone();
    match self.origin.fetch(request).await {
      Ok(response) => response.into_response(),
      Err(e) => {
        warn!(path = %path, error = %e, "origin unreachable");
        (StatusCode::BAD_GATEWAY, OFFLINE_TEXT).into_response()
      }
    }
  }

  /// Network first, then the API cache, then a synthesized body.
  async fn api(&self, request: OriginRequest) -> Result<Response> {
    let url = self.origin.url(&request.path);

    if self.is_online() {
      match self.origin.fetch(request.clone()).await {
        Ok(response) if response.is_success() => {
          self.cache_api_body(&url, &response.body)?;
          return Ok(response.into_response());
        }
        Ok(response) => debug!(url = %url, status = %response.status, "API error response"),
        Err(e) => warn!(url = %url, error = %e, "API request failed"),
      }
    }

    if let Some(cached) = self.store.match_in(&self.settings.api_cache, &url)? {
      debug!(url = %url, "serving cached API response");
      return Ok(with_normalized_name(cached).into_response());
    }

    debug!(url = %url, "synthesizing API fallback");
    let body = fallback_body(
      &request.path,
      &self.settings.api_prefix,
      &self.settings.sprite_base,
    );
    Ok(Json(body).into_response())
  }

  /// Store a normalized JSON body in the API cache. Returns false when the
  /// body is not JSON and was left out.
  pub(super) fn cache_api_body(&self, url: &str, body: &[u8]) -> Result<bool> {
    let mut value: Value = match serde_json::from_slice(body) {
      Ok(v) => v,
      Err(e) => {
        warn!(url, error = %e, "not caching non-JSON API response");
        return Ok(false);
      }
    };
    normalize_name(&mut value);
    self
      .store
      .put(&self.settings.api_cache, url, &CachedResponse::json(&value))?;
    Ok(true)
  }

  /// Network first, then the cached app shell, then an inline page.
  async fn document(&self, request: OriginRequest) -> Response {
    let url = self.origin.url(&request.path);

    match self.origin.fetch(request).await {
      Ok(response) if response.is_success() => {
        self.remember(&self.settings.static_cache, &url, &response);
        response.into_response()
      }
      Ok(response) => match self.app_shell() {
        Some(shell) => shell.into_response(),
        None => response.into_response(),
      },
      Err(e) => {
        warn!(url = %url, error = %e, "document request failed");
        match self.app_shell() {
          Some(shell) => shell.into_response(),
          None => Html(OFFLINE_DOCUMENT).into_response(),
        }
      }
    }
  }

  /// Cache first, then network, then a per-type placeholder.
  async fn static_asset(&self, request: OriginRequest) -> Response {
    let url = self.origin.url(&request.path);

    if let Some(cached) = self.lookup(&url) {
      return cached.into_response();
    }

    let path = request.path.clone();
    match self.origin.fetch(request).await {
      Ok(response) => {
        if response.is_success() {
          self.remember(&self.settings.static_cache, &url, &response);
        }
        response.into_response()
      }
      Err(e) => {
        warn!(url = %url, error = %e, "static request failed");
        self.offline_asset(&path)
      }
    }
  }

  fn offline_asset(&self, path: &str) -> Response {
    let file = path.split(['?', '#']).next().unwrap_or(path);
    let extension = file
      .rsplit_once('.')
      .map(|(_, ext)| ext.to_ascii_lowercase())
      .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
      let placeholder = self.origin.url(&self.settings.placeholder_image);
      if let Some(image) = self.lookup(&placeholder) {
        return image.into_response();
      }
    }

    match extension.as_str() {
      "css" => CachedResponse::new(200, Some("text/css"), "").into_response(),
      "js" | "mjs" => {
        CachedResponse::new(200, Some("application/javascript"), OFFLINE_SCRIPT).into_response()
      }
      _ => CachedResponse::new(404, Some("text/plain"), OFFLINE_TEXT).into_response(),
    }
  }

  fn app_shell(&self) -> Option<CachedResponse> {
    self.lookup(&self.origin.url(&self.settings.app_shell))
  }

  /// Cache read where a broken store counts as a miss.
  fn lookup(&self, url: &str) -> Option<CachedResponse> {
    self.store.match_url(url).unwrap_or_else(|e| {
      warn!(url, error = %e, "cache read failed");
      None
    })
  }

  fn remember(&self, cache: &str, url: &str, response: &OriginResponse) {
    let cached = CachedResponse::new(
      response.status.as_u16(),
      response.content_type(),
      response.body.to_vec(),
    );
    if let Err(e) = self.store.put(cache, url, &cached) {
      warn!(url, error = %e, "cache write failed");
    }
  }
}

/// Give a nameless record a templated name built from its id.
pub fn normalize_name(value: &mut Value) -> bool {
  let Some(object) = value.as_object_mut() else {
    return false;
  };
  let has_name = object
    .get("name")
    .is_some_and(|n| n.as_str().is_some_and(|s| !s.is_empty()));
  if has_name {
    return false;
  }
  let Some(id) = object.get("id").map(display_id) else {
    return false;
  };
  object.insert("name".to_string(), Value::String(format!("Pokémon {}", id)));
  true
}

fn display_id(id: &Value) -> String {
  match id {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn with_normalized_name(cached: CachedResponse) -> CachedResponse {
  let Ok(mut value) = serde_json::from_slice::<Value>(&cached.body) else {
    return cached;
  };
  if normalize_name(&mut value) {
    CachedResponse::json(&value)
  } else {
    cached
  }
}

/// Minimal body for an API request nothing can answer.
///
/// Listing requests get an empty page; entity requests get a placeholder
/// record keyed by the path segment after the collection. Both carry the
/// `__fallback` and `__stale` markers.
pub fn fallback_body(path: &str, api_prefix: &str, sprite_base: &str) -> Value {
  let path = path.split(['?', '#']).next().unwrap_or(path);
  let segments: Vec<&str> = path
    .strip_prefix(api_prefix)
    .unwrap_or(path)
    .split('/')
    .filter(|s| !s.is_empty())
    .collect();

  let Some(key) = segments.get(1) else {
    return json!({
      "count": 0,
      "pokemon": [],
      "__fallback": true,
      "__stale": true,
    });
  };

  let key = normalize_key(key);
  let id: u64 = key.parse().unwrap_or(0);
  json!({
    "id": id,
    "name": format!("Pokémon {}", key),
    "sprite": format!("{}/{}.png", sprite_base, id),
    "height": 0,
    "weight": 0,
    "types": [],
    "abilities": [],
    "stats": [],
    "__fallback": true,
    "__stale": true,
  })
}

#[cfg(test)]
mod tests {
  use super::super::testing::*;
  use super::*;
  use crate::pokeapi::{Pokemon, PokemonPage};
  use axum::http::Method;
  use std::sync::Arc;

  async fn body_of(response: Response) -> (StatusCode, Option<String>, Vec<u8>) {
    let status = response.status();
    let content_type = response
      .headers()
      .get(axum::http::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, content_type, bytes.to_vec())
  }

  async fn json_of(response: Response) -> (StatusCode, Value) {
    let (status, _, body) = body_of(response).await;
    (status, serde_json::from_slice(&body).unwrap())
  }

  const SPRITES: &str = "https://sprites.test";

  async fn fetch_static(edge: &Edge, path: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    body_of(edge.handle(Route::Static, OriginRequest::get(path)).await).await
  }

  #[test]
  fn test_normalize_name() {
    let mut nameless = json!({ "id": 7 });
    assert!(normalize_name(&mut nameless));
    assert_eq!(nameless["name"], "Pokémon 7");

    let mut named = json!({ "id": 7, "name": "squirtle" });
    assert!(!normalize_name(&mut named));
    assert_eq!(named["name"], "squirtle");

    let mut page = json!({ "count": 1, "pokemon": [] });
    assert!(!normalize_name(&mut page));
    assert!(page.get("name").is_none());
  }

  #[test]
  fn test_entity_fallback_body() {
    let body = fallback_body("/api/pokemon/25", "/api/", SPRITES);
    assert_eq!(body["id"], 25);
    assert_eq!(body["name"], "Pokémon 25");
    assert_eq!(body["sprite"], "https://sprites.test/25.png");
    assert_eq!(body["__fallback"], true);
    assert_eq!(body["__stale"], true);

    // Decodes as a placeholder record
    let pokemon: Pokemon = serde_json::from_value(body).unwrap();
    assert!(pokemon.fallback);
    assert!(pokemon.types.is_empty());
  }

  #[test]
  fn test_named_and_abilities_fallback_bodies() {
    let body = fallback_body("/api/pokemon/Pikachu/abilities", "/api/", SPRITES);
    assert_eq!(body["id"], 0);
    assert_eq!(body["name"], "Pokémon pikachu");
  }

  #[test]
  fn test_listing_fallback_body_is_a_stale_page() {
    let body = fallback_body("/api/pokemon?limit=10&offset=0", "/api/", SPRITES);
    let page: PokemonPage = serde_json::from_value(body).unwrap();
    assert!(page.stale);
    assert!(page.pokemon.is_empty());
  }

  #[tokio::test]
  async fn test_api_synthesizes_when_offline_without_cache() {
    let origin = Arc::new(FakeOrigin::default());
    let edge = active_edge(Arc::clone(&origin)).await;
    edge.set_online(false);
    let calls = origin.calls();

    let (status, body) = json_of(
      edge
        .handle(Route::Api, OriginRequest::get("/api/pokemon/151"))
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 151);
    assert_eq!(body["__fallback"], true);
    assert_eq!(origin.calls(), calls);
  }

  #[tokio::test]
  async fn test_api_caches_normalized_body() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/api/pokemon/7", 200, "application/json", r#"{"id": 7}"#);
    let edge = active_edge(Arc::clone(&origin)).await;

    // Live response passes through as-is
    let (_, live) = json_of(edge.handle(Route::Api, OriginRequest::get("/api/pokemon/7")).await).await;
    assert!(live.get("name").is_none());

    origin.set_down(true);
    let (_, cached) = json_of(edge.handle(Route::Api, OriginRequest::get("/api/pokemon/7")).await).await;
    assert_eq!(cached["name"], "Pokémon 7");
  }

  #[tokio::test]
  async fn test_api_error_status_falls_back() {
    let origin = Arc::new(FakeOrigin::default());
    let edge = active_edge(Arc::clone(&origin)).await;

    let (status, body) = json_of(
      edge
        .handle(Route::Api, OriginRequest::get("/api/pokemon/missingno"))
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Pokémon missingno");
    assert_eq!(body["__fallback"], true);
  }

  #[tokio::test]
  async fn test_document_falls_back_to_app_shell() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/index.html", 200, "text/html", "<html>shell</html>");
    let edge = active_edge(Arc::clone(&origin)).await;
    origin.set_down(true);

    let (status, _, body) = body_of(
      edge
        .handle(Route::Document, OriginRequest::get("/details/pikachu"))
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>shell</html>");
  }

  #[tokio::test]
  async fn test_document_inline_fallback_without_shell() {
    let origin = Arc::new(FakeOrigin::default());
    let edge = active_edge(Arc::clone(&origin)).await;
    origin.set_down(true);

    let (_, content_type, body) = body_of(
      edge
        .handle(Route::Document, OriginRequest::get("/"))
        .await,
    )
    .await;

    assert!(content_type.unwrap().starts_with("text/html"));
    assert_eq!(body, OFFLINE_DOCUMENT.as_bytes());
  }

  #[tokio::test]
  async fn test_static_is_cache_first() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/assets/app.css", 200, "text/css", "body{}");
    let edge = active_edge(Arc::clone(&origin)).await;

    fetch_static(&edge, "/assets/app.css").await;
    let calls = origin.calls();
    let (_, _, body) = fetch_static(&edge, "/assets/app.css").await;

    assert_eq!(body, b"body{}");
    assert_eq!(origin.calls(), calls);
  }

  #[tokio::test]
  async fn test_static_offline_fallbacks_by_type() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/assets/pikachuError.jpg", 200, "image/jpeg", "JPEG");
    let edge = active_edge(Arc::clone(&origin)).await;
    origin.set_down(true);

    let (_, _, image) = fetch_static(&edge, "/sprites/25.png").await;
    assert_eq!(image, b"JPEG");

    let (status, content_type, css) = fetch_static(&edge, "/theme.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/css"));
    assert!(css.is_empty());

    let (_, content_type, _) = fetch_static(&edge, "/chunk.js?v=2").await;
    assert_eq!(content_type.as_deref(), Some("application/javascript"));

    let (status, _, _) = fetch_static(&edge, "/video.mp4").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_requests_pass_through_before_activation() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/api/pokemon/1", 200, "application/json", r#"{"id": 1}"#);
    let edge = edge(Arc::clone(&origin));

    edge
      .handle(Route::Api, OriginRequest::get("/api/pokemon/1"))
      .await;

    assert_eq!(edge.store.count("pokeapp-api-v1").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_bypass_is_never_cached() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/api/pokemon/1", 200, "application/json", r#"{"id": 1}"#);
    let edge = active_edge(Arc::clone(&origin)).await;

    let mut request = OriginRequest::get("/api/pokemon/1");
    request.method = Method::POST;
    edge.handle(Route::Bypass, request).await;

    assert_eq!(edge.store.count("pokeapp-api-v1").unwrap(), 0);
  }

  #[tokio::test]
  async fn test_unreachable_origin_on_pass_through_is_bad_gateway() {
    let origin = Arc::new(FakeOrigin::default());
    origin.set_down(true);
    let edge = active_edge(Arc::clone(&origin)).await;

    let (status, _, _) = body_of(
      edge
        .handle(Route::DevTooling, OriginRequest::get("/__vite_ping"))
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
  }
}
