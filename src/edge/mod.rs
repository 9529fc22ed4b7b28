//! Caching reverse proxy in front of the web app.
//!
//! Every request is classified ([`route::classify`]) and served with a
//! network-first strategy (API, documents) or a cache-first one (static
//! assets). Responses are kept in a [`ResponseStore`] of named caches,
//! independent of the application cache.

mod lifecycle;
mod origin;
mod route;
mod store;
mod strategy;

pub use lifecycle::{ClientMessage, Notification, Phase};
pub use origin::{HttpOrigin, Origin, OriginRequest};
pub use store::ResponseStore;

use axum::{
  body::Bytes,
  extract::{Request, State},
  http::{header, StatusCode},
  response::{IntoResponse, Json, Response},
  routing::{get, post},
  Router,
};
use color_eyre::{eyre::eyre, Report, Result};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use route::classify;

const MAX_BODY: usize = 8 * 1024 * 1024;

/// What the edge needs to know about the app it fronts.
#[derive(Debug, Clone)]
pub struct EdgeSettings {
  pub api_prefix: String,
  pub static_cache: String,
  pub api_cache: String,
  pub precache: Vec<String>,
  pub placeholder_image: String,
  pub app_shell: String,
  /// Directory of sprites used in synthesized API bodies
  pub sprite_base: String,
}

impl EdgeSettings {
  pub fn from_config(config: &Config) -> Self {
    Self {
      api_prefix: config.edge.api_prefix.clone(),
      static_cache: config.edge.static_cache.clone(),
      api_cache: config.edge.api_cache.clone(),
      precache: config.edge.precache.clone(),
      placeholder_image: config.edge.placeholder_image.clone(),
      app_shell: config.edge.app_shell.clone(),
      sprite_base: config
        .upstream
        .sprite_base_url
        .trim_end_matches('/')
        .to_string(),
    }
  }
}

pub struct Edge {
  origin: Arc<dyn Origin>,
  store: Arc<ResponseStore>,
  settings: EdgeSettings,
  online: AtomicBool,
  phase: RwLock<Phase>,
  notifications: Mutex<VecDeque<Notification>>,
}

impl Edge {
  pub fn new(origin: Arc<dyn Origin>, store: Arc<ResponseStore>, settings: EdgeSettings) -> Self {
    Self {
      origin,
      store,
      settings,
      online: AtomicBool::new(true),
      phase: RwLock::new(Phase::Installing),
      notifications: Mutex::new(VecDeque::new()),
    }
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  pub fn set_online(&self, online: bool) {
    if self.online.swap(online, Ordering::SeqCst) != online {
      info!(online, "edge connectivity changed");
    }
  }

  pub fn phase(&self) -> Phase {
    self.phase.read().map(|p| *p).unwrap_or(Phase::Installing)
  }

  fn set_phase(&self, phase: Phase) {
    if let Ok(mut current) = self.phase.write() {
      *current = phase;
    }
  }

  /// Snapshot for the status route.
  pub fn status(&self) -> Result<serde_json::Value> {
    let caches = self
      .store
      .cache_names()?
      .into_iter()
      .map(|name| {
        let entries = self.store.count(&name)?;
        Ok(json!({ "name": name, "entries": entries }))
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(json!({
      "phase": self.phase(),
      "online": self.is_online(),
      "caches": caches,
      "notifications": self.notifications(),
    }))
  }
}

/// Build the edge router: control routes first, everything else proxied.
pub fn router(edge: Arc<Edge>) -> Router {
  Router::new()
    .route("/__edge/message", post(message))
    .route("/__edge/push", post(push))
    .route("/__edge/status", get(status))
    .fallback(proxy)
    .layer(TraceLayer::new_for_http())
    .with_state(edge)
}

/// Install, activate, then serve until the process is stopped.
pub async fn run(addr: SocketAddr, edge: Arc<Edge>) -> Result<()> {
  let report = edge.install().await?;
  info!(
    cached = report.cached,
    failed = report.failed.len(),
    "precache finished"
  );
  edge.activate()?;

  let listener = TcpListener::bind(addr)
    .await
    .map_err(|e| eyre!("Failed to bind {}: {}", addr, e))?;
  info!("Edge proxy listening on http://{}", addr);

  axum::serve(listener, router(edge))
    .await
    .map_err(|e| eyre!("Edge server error: {}", e))
}

fn internal_error(e: Report) -> Response {
  error!(error = %e, "edge control request failed");
  (
    StatusCode::INTERNAL_SERVER_ERROR,
    Json(json!({ "error": e.to_string() })),
  )
    .into_response()
}

async fn message(State(edge): State<Arc<Edge>>, Json(msg): Json<ClientMessage>) -> Response {
  match edge.handle_message(msg).await {
    Ok(body) => Json(body).into_response(),
    Err(e) => internal_error(e),
  }
}

async fn push(State(edge): State<Arc<Edge>>, body: Bytes) -> Response {
  match Notification::from_payload(&body) {
    Ok(notification) => {
      edge.push(notification.clone());
      Json(notification).into_response()
    }
    Err(e) => (
      StatusCode::BAD_REQUEST,
      Json(json!({ "error": e.to_string() })),
    )
      .into_response(),
  }
}

async fn status(State(edge): State<Arc<Edge>>) -> Response {
  match edge.status() {
    Ok(body) => Json(body).into_response(),
    Err(e) => internal_error(e),
  }
}

async fn proxy(State(edge): State<Arc<Edge>>, request: Request) -> Response {
  let (parts, body) = request.into_parts();
  let body = match axum::body::to_bytes(body, MAX_BODY).await {
    Ok(b) => b,
    Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response(),
  };

  let accept = parts
    .headers
    .get(header::ACCEPT)
    .and_then(|v| v.to_str().ok());
  let route = classify(
    &parts.method,
    parts.uri.path(),
    accept,
    &edge.settings.api_prefix,
  );

  let path = parts
    .uri
    .path_and_query()
    .map(|pq| pq.as_str().to_string())
    .unwrap_or_else(|| "/".to_string());

  let request = OriginRequest {
    method: parts.method,
    path,
    headers: parts.headers,
    body,
  };
  edge.handle(route, request).await
}
