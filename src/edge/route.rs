use axum::http::Method;

/// How the edge treats one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Not a safe read; forwarded untouched
  Bypass,
  /// Dev server plumbing; forwarded untouched
  DevTooling,
  /// Network first, with a response cache and synthesized fallback
  Api,
  /// Network first, with the app shell as fallback
  Document,
  /// Cache first
  Static,
}

const DEV_TOOLING_MARKERS: [&str; 3] = ["__", "hot-update", "sockjs-node"];

/// Decide the strategy for a request. Checks run in a fixed order.
pub fn classify(method: &Method, path: &str, accept: Option<&str>, api_prefix: &str) -> Route {
  if method != Method::GET {
    return Route::Bypass;
  }
  if DEV_TOOLING_MARKERS.iter().any(|m| path.contains(m)) {
    return Route::DevTooling;
  }
  if path.starts_with(api_prefix) {
    return Route::Api;
  }
  if accept.is_some_and(|a| a.contains("text/html")) {
    return Route::Document;
  }
  Route::Static
}
