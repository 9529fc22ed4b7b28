//! Online/offline tracking shared by every component that talks to the network.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::pokeapi::PokemonSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Status {
  /// Last probe or client report succeeded
  reachable: bool,
  /// User asked to stay offline
  forced_offline: bool,
}

impl Status {
  fn online(self) -> bool {
    self.reachable && !self.forced_offline
  }
}

/// Shared connectivity flag. Clones observe the same state.
#[derive(Clone)]
pub struct Connectivity {
  tx: Arc<watch::Sender<Status>>,
}

impl Connectivity {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(Status {
      reachable: true,
      forced_offline: !online,
    });
    Self { tx: Arc::new(tx) }
  }

  pub fn is_online(&self) -> bool {
    self.tx.borrow().online()
  }

  pub fn is_forced_offline(&self) -> bool {
    self.tx.borrow().forced_offline
  }

  /// Record whether the network answered.
  pub fn set_reachable(&self, reachable: bool) {
    self.update(|s| s.reachable = reachable);
  }

  /// Switch user-forced offline mode on or off.
  pub fn set_forced_offline(&self, forced: bool) {
    self.update(|s| s.forced_offline = forced);
  }

  /// Receiver that yields the effective online flag on every change.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    let mut status = self.tx.subscribe();
    let (tx, rx) = watch::channel(status.borrow().online());
    tokio::spawn(async move {
      while status.changed().await.is_ok() {
        let online = status.borrow_and_update().online();
        tx.send_if_modified(|current| std::mem::replace(current, online) != online);
        if tx.is_closed() {
          break;
        }
      }
    });
    rx
  }

  fn update(&self, apply: impl FnOnce(&mut Status)) {
    let before = self.is_online();
    self.tx.send_if_modified(|status| {
      let previous = *status;
      apply(status);
      *status != previous
    });
    let after = self.is_online();
    if before != after {
      info!(online = after, "connectivity changed");
    }
  }

  /// Periodically ping `source` and record whether it answered.
  pub fn spawn_probe(&self, source: Arc<dyn PokemonSource>, interval: Duration) -> JoinHandle<()> {
    let connectivity = self.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      loop {
        ticker.tick().await;
        if connectivity.is_forced_offline() {
          continue;
        }
        let reachable = source.ping().await.is_ok();
        debug!(reachable, "connectivity probe");
        connectivity.set_reachable(reachable);
      }
    })
  }
}

impl Default for Connectivity {
  fn default() -> Self {
    Self::new(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_forced_offline_wins_over_reachable() {
    let connectivity = Connectivity::new(true);
    assert!(connectivity.is_online());

    connectivity.set_forced_offline(true);
    assert!(!connectivity.is_online());

    connectivity.set_reachable(true);
    assert!(!connectivity.is_online());

    connectivity.set_forced_offline(false);
    assert!(connectivity.is_online());
  }

  #[test]
  fn test_unreachable_is_offline() {
    let connectivity = Connectivity::new(true);
    connectivity.set_reachable(false);
    assert!(!connectivity.is_online());
  }

  #[test]
  fn test_clones_share_state() {
    let a = Connectivity::new(true);
    let b = a.clone();
    a.set_forced_offline(true);
    assert!(!b.is_online());
  }

  #[tokio::test]
  async fn test_subscribe_sees_transitions() {
    let connectivity = Connectivity::new(true);
    let mut rx = connectivity.subscribe();
    assert!(*rx.borrow());

    connectivity.set_reachable(false);
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
      .await
      .unwrap()
      .unwrap();
    assert!(!*rx.borrow());
  }
}
