//! Install/activate lifecycle, client messages and push notifications.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::origin::OriginRequest;
use super::store::CachedResponse;
use super::Edge;

const MAX_NOTIFICATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
  Installing,
  /// Precached, waiting to take over
  Installed,
  /// Serving every request through the strategies
  Activated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkState {
  Online,
  Offline,
}

/// Message posted by a page to the edge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
  SkipWaiting,
  RefreshCache,
  NetworkStatus { status: NetworkState },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
  pub cached: usize,
  /// Paths that could not be fetched
  pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  #[serde(default = "default_title")]
  pub title: String,
  #[serde(default = "default_body")]
  pub body: String,
  #[serde(default = "default_icon")]
  pub icon: String,
  #[serde(default)]
  pub received_at: i64,
}

fn default_title() -> String {
  "PokeApp".to_string()
}

fn default_body() -> String {
  "New Pokémon data available".to_string()
}

fn default_icon() -> String {
  "/faviconP.ico".to_string()
}

impl Notification {
  /// Parse a push payload. An empty payload yields the default notification.
  pub fn from_payload(payload: &[u8]) -> Result<Self> {
    let mut notification: Notification = if payload.iter().all(u8::is_ascii_whitespace) {
      serde_json::from_str("{}")
    } else {
      serde_json::from_slice(payload)
    }
    .map_err(|e| eyre!("Invalid push payload: {}", e))?;

    notification.received_at = Utc::now().timestamp_millis();
    Ok(notification)
  }
}

impl Edge {
  /// Fetch every manifest entry into the static cache.
  ///
  /// Entries are fetched concurrently and independently; a failed entry is
  /// reported, never fatal.
  pub async fn precache(&self) -> PrecacheReport {
    let fetches = self.settings.precache.iter().map(|path| async move {
      let outcome = self.origin.fetch(OriginRequest::get(path.as_str())).await;
      (path, outcome)
    });

    let mut report = PrecacheReport::default();
    for (path, outcome) in join_all(fetches).await {
      let stored = match outcome {
        Ok(resp) if resp.is_success() => self
          .store
          .put(
            &self.settings.static_cache,
            &self.origin.url(path),
            &CachedResponse::new(resp.status.as_u16(), resp.content_type(), resp.body.to_vec()),
          )
          .map_err(|e| e.to_string()),
        Ok(resp) => Err(format!("status {}", resp.status)),
        Err(e) => Err(e.to_string()),
      };

      match stored {
        Ok(()) => report.cached += 1,
        Err(reason) => {
          warn!(path = %path, reason = %reason, "precache failed");
          report.failed.push(path.clone());
        }
      }
    }
    report
  }

  /// Open the caches and precache the manifest.
  pub async fn install(&self) -> Result<PrecacheReport> {
    self.set_phase(Phase::Installing);
    self.store.open_cache(&self.settings.static_cache)?;
    self.store.open_cache(&self.settings.api_cache)?;

    let report = self.precache().await;
    self.set_phase(Phase::Installed);
    info!(cached = report.cached, "edge installed");
    Ok(report)
  }

  /// Delete caches from older versions and take over every request.
  pub fn activate(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.store.cache_names()? {
      if name != self.settings.static_cache && name != self.settings.api_cache {
        info!(cache = %name, "deleting old cache");
        self.store.delete_cache(&name)?;
        deleted.push(name);
      }
    }

    self.set_phase(Phase::Activated);
    info!("edge activated, claiming clients");
    Ok(deleted)
  }

  /// Re-run the precache and re-fetch every cached API response.
  pub async fn refresh(&self) -> Result<Value> {
    let precache = self.precache().await;

    let base = self.origin.url("");
    let mut refreshed = 0;
    let mut failed = 0;
    for url in self.store.urls(&self.settings.api_cache)? {
      let Some(path) = url.strip_prefix(&base) else {
        continue;
      };
      match self.origin.fetch(OriginRequest::get(path)).await {
        Ok(resp) if resp.is_success() => {
          if self.cache_api_body(&url, &resp.body)? {
            refreshed += 1;
          }
        }
        Ok(resp) => {
          debug!(url = %url, status = %resp.status, "refresh skipped");
          failed += 1;
        }
        Err(e) => {
          warn!(url = %url, error = %e, "refresh failed");
          failed += 1;
        }
      }
    }

    Ok(json!({
      "precached": precache.cached,
      "precacheFailed": precache.failed,
      "refreshed": refreshed,
      "failed": failed,
    }))
  }

  pub async fn handle_message(&self, message: ClientMessage) -> Result<Value> {
    debug!(?message, "client message");
    match message {
      ClientMessage::SkipWaiting => {
        if self.phase() == Phase::Installed {
          self.activate()?;
        }
        Ok(json!({ "phase": self.phase() }))
      }
      ClientMessage::RefreshCache => self.refresh().await,
      ClientMessage::NetworkStatus { status } => {
        self.set_online(status == NetworkState::Online);
        Ok(json!({ "online": self.is_online() }))
      }
    }
  }

  /// Record a notification, dropping the oldest beyond the limit.
  pub fn push(&self, notification: Notification) {
    info!(
      title = %notification.title,
      body = %notification.body,
      icon = %notification.icon,
      "push notification"
    );
    if let Ok(mut list) = self.notifications.lock() {
      list.push_back(notification);
      while list.len() > MAX_NOTIFICATIONS {
        list.pop_front();
      }
    }
  }

  /// Most recent notifications, oldest first.
  pub fn notifications(&self) -> Vec<Notification> {
    self
      .notifications
      .lock()
      .map(|list| list.iter().cloned().collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::super::testing::*;
  use super::*;
  use std::sync::Arc;

  #[test]
  fn test_messages_parse() {
    let parse = |s: &str| serde_json::from_str::<ClientMessage>(s).unwrap();
    assert_eq!(parse(r#"{"type":"SKIP_WAITING"}"#), ClientMessage::SkipWaiting);
    assert_eq!(parse(r#"{"type":"REFRESH_CACHE"}"#), ClientMessage::RefreshCache);
    assert_eq!(
      parse(r#"{"type":"NETWORK_STATUS","status":"offline"}"#),
      ClientMessage::NetworkStatus {
        status: NetworkState::Offline
      }
    );
  }

  #[test]
  fn test_notification_defaults_fill_missing_fields() {
    let n = Notification::from_payload(br#"{"title": "Shiny!"}"#).unwrap();
    assert_eq!(n.title, "Shiny!");
    assert_eq!(n.body, "New Pokémon data available");
    assert_eq!(n.icon, "/faviconP.ico");
    assert!(n.received_at > 0);

    assert!(Notification::from_payload(b"not json").is_err());
  }

  #[tokio::test]
  async fn test_install_tolerates_missing_assets() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/", 200, "text/html", "<html></html>");
    origin.serve("/index.html", 200, "text/html", "<html></html>");
    let edge = edge(origin);

    let report = edge.install().await.unwrap();

    assert_eq!(report.cached, 2);
    assert_eq!(report.failed.len(), 4);
    assert_eq!(edge.phase(), Phase::Installed);
  }

  #[tokio::test]
  async fn test_activate_deletes_unknown_caches() {
    let edge = edge(Arc::new(FakeOrigin::default()));
    edge
      .store
      .put("pokeapp-v1", "http://old/", &CachedResponse::new(200, None, "old"))
      .unwrap();
    edge.install().await.unwrap();

    let deleted = edge.activate().unwrap();

    assert_eq!(deleted, vec!["pokeapp-v1".to_string()]);
    let mut names = edge.store.cache_names().unwrap();
    names.sort();
    assert_eq!(names, vec!["pokeapp-api-v1".to_string(), "pokeapp-v2".to_string()]);
    assert_eq!(edge.phase(), Phase::Activated);
  }

  #[tokio::test]
  async fn test_skip_waiting_activates_installed_worker() {
    let edge = edge(Arc::new(FakeOrigin::default()));
    edge.install().await.unwrap();

    edge.handle_message(ClientMessage::SkipWaiting).await.unwrap();

    assert_eq!(edge.phase(), Phase::Activated);
  }

  #[tokio::test]
  async fn test_refresh_refetches_cached_api_urls() {
    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/api/pokemon/1", 200, "application/json", r#"{"id": 1}"#);
    let edge = active_edge(Arc::clone(&origin)).await;
    edge
      .store
      .put(
        "pokeapp-api-v1",
        &format!("{}/api/pokemon/1", BASE),
        &CachedResponse::new(200, Some("application/json"), r#"{"id": 1, "name": "old"}"#),
      )
      .unwrap();

    let report = edge.refresh().await.unwrap();

    assert_eq!(report["refreshed"], 1);
    let cached = edge
      .store
      .match_in("pokeapp-api-v1", &format!("{}/api/pokemon/1", BASE))
      .unwrap()
      .unwrap();
    let body: Value = serde_json::from_slice(&cached.body).unwrap();
    assert_eq!(body["name"], "Pokémon 1");
  }

  #[test]
  fn test_notifications_are_bounded() {
    let edge = edge(Arc::new(FakeOrigin::default()));
    for i in 0..(MAX_NOTIFICATIONS + 5) {
      edge.push(Notification {
        title: format!("n{}", i),
        body: String::new(),
        icon: String::new(),
        received_at: 0,
      });
    }
    let list = edge.notifications();
    assert_eq!(list.len(), MAX_NOTIFICATIONS);
    assert_eq!(list[0].title, "n5");
  }
}
