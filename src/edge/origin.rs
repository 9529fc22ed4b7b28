//! The application origin the edge forwards to.

use async_trait::async_trait;
use axum::{
  body::{Body, Bytes},
  http::{header, HeaderMap, Method, StatusCode},
  response::{IntoResponse, Response},
};
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;

use crate::pokeapi::FetchError;

/// A request the edge sends to the origin.
#[derive(Debug, Clone)]
pub struct OriginRequest {
  pub method: Method,
  /// Path plus query, e.g. `/api/pokemon?limit=10`
  pub path: String,
  pub headers: HeaderMap,
  pub body: Bytes,
}

impl OriginRequest {
  pub fn get(path: impl Into<String>) -> Self {
    Self {
      method: Method::GET,
      path: path.into(),
      headers: HeaderMap::new(),
      body: Bytes::new(),
    }
  }
}

/// Whatever the origin answered, success or not.
#[derive(Debug, Clone)]
pub struct OriginResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Bytes,
}

impl OriginResponse {
  pub fn is_success(&self) -> bool {
    self.status.is_success()
  }

  pub fn content_type(&self) -> Option<&str> {
    self
      .headers
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
  }
}

/// Headers that describe one hop, not the message
fn is_hop_by_hop(name: &header::HeaderName) -> bool {
  [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    header::UPGRADE,
    header::TE,
  ]
  .contains(name)
}

impl IntoResponse for OriginResponse {
  fn into_response(self) -> Response {
    let mut response = (self.status, Body::from(self.body)).into_response();
    for (name, value) in self.headers.iter() {
      if !is_hop_by_hop(name) {
        response.headers_mut().append(name.clone(), value.clone());
      }
    }
    response
  }
}

#[async_trait]
pub trait Origin: Send + Sync {
  /// Absolute URL of `path` on this origin; the response cache key
  fn url(&self, path: &str) -> String;

  /// Send a request. `Err` means no response arrived at all.
  async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, FetchError>;
}

/// Origin reached over HTTP.
pub struct HttpOrigin {
  http: reqwest::Client,
  base_url: String,
}

impl HttpOrigin {
  pub fn new(base_url: &str) -> Result<Self> {
    let http = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .redirect(reqwest::redirect::Policy::none())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }
}

#[async_trait]
impl Origin for HttpOrigin {
  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, FetchError> {
    let url = self.url(&request.path);
    debug!(method = %request.method, url = %url, "origin request");

    // Let the client negotiate encoding so bodies arrive decoded
    let mut headers = request.headers;
    headers.remove(header::HOST);
    headers.remove(header::ACCEPT_ENCODING);

    let response = self
      .http
      .request(request.method, &url)
      .headers(headers)
      .body(request.body)
      .send()
      .await?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(OriginResponse {
      status,
      headers,
      body,
    })
  }
}
