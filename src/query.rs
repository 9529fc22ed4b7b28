//! Background loads for the terminal views.
//!
//! A `Query<T>` owns a fetcher closure, runs it on the tokio runtime and
//! hands the result back through a channel, so views never block the draw
//! loop. Views call `poll()` from their `tick()`.
//!
//! ```ignore
//! let service = service.clone();
//! let mut query = Query::new(move || {
//!   let service = service.clone();
//!   async move { service.search("char").await.map_err(|e| e.to_string()) }
//! });
//! query.fetch();
//!
//! // every tick
//! query.poll();
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started
  Idle,
  Loading,
  Success(T),
  /// Failed; the message is shown to the user verbatim
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  /// Data from the last success, kept visible while a refetch runs
  previous: Option<T>,
}

impl<T: Send + 'static> Query<T> {
  /// Wrap a fetcher. It runs again on every `fetch()`/`refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      previous: None,
    }
  }

  /// Create and immediately start a query.
  pub fn started<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let mut query = Self::new(fetcher);
    query.fetch();
    query
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Current data, or the last good data while reloading.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Loading => self.previous.as_ref(),
      state => state.data(),
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    matches!(self.state, QueryState::Error(_))
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching unless a fetch is already running.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Start over, abandoning any fetch in flight.
  pub fn refetch(&mut self) {
    self.receiver = None;
    self.start_fetch();
  }

  /// Collect a finished fetch. Returns true when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    let outcome = match receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => Err("Query was cancelled".to_string()),
    };

    self.receiver = None;
    self.previous = None;
    self.state = match outcome {
      Ok(data) => QueryState::Success(data),
      Err(e) => QueryState::Error(e),
    };
    true
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    let state = std::mem::replace(&mut self.state, QueryState::Loading);
    if let QueryState::Success(data) = state {
      self.previous = Some(data);
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // Receiver is gone when the query was refetched or dropped
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
