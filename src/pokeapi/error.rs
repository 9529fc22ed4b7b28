use thiserror::Error;

/// Failure talking to a Pokémon data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("not found")]
  NotFound,
  #[error("upstream returned status {0}")]
  Status(u16),
  #[error("transport error: {0}")]
  Transport(String),
  #[error("invalid response body: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      FetchError::Decode(e.to_string())
    } else if let Some(status) = e.status() {
      FetchError::Status(status.as_u16())
    } else {
      FetchError::Transport(e.to_string())
    }
  }
}
