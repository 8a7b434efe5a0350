//! Online roster.
//!
//! A principal is online while at least one of their connections has
//! announced presence. Every change to the roster is broadcast to all
//! connections as a full, sorted `presence-update` snapshot.

use std::collections::{BTreeMap, HashSet};

use parley_core::{Principal, event::OutboundEvent};
use tokio::sync::Mutex;
use tracing::info;

use crate::router::{ConnectionId, RoomRouter};

pub struct PresenceTracker {
  online: Mutex<BTreeMap<Principal, HashSet<ConnectionId>>>,
  router: RoomRouter,
}

impl PresenceTracker {
  pub fn new(router: RoomRouter) -> Self {
    Self {
      online: Mutex::new(BTreeMap::new()),
      router,
    }
  }

  /// Record that `conn` belongs to an online `principal` and broadcast the
  /// roster. Repeating the call is harmless; the snapshot is re-sent.
  pub async fn mark_online(
    &self,
    principal: Principal,
    conn: ConnectionId,
  ) -> Vec<Principal> {
    let mut online = self.online.lock().await;
    let conns = online.entry(principal.clone()).or_default();
    let first = conns.is_empty();
    conns.insert(conn);
    if first {
      info!(%principal, "online");
    }
    let snapshot: Vec<_> = online.keys().cloned().collect();
    // Published under the roster lock so snapshots go out in change order.
    self
      .router
      .broadcast(OutboundEvent::PresenceUpdate(snapshot.clone()))
      .await;
    snapshot
  }

  /// Forget `conn`. Returns `true` (and broadcasts) only when it was the
  /// principal's last connection.
  pub async fn mark_offline(
    &self,
    principal: &Principal,
    conn: ConnectionId,
  ) -> bool {
    let mut online = self.online.lock().await;
    let Some(conns) = online.get_mut(principal) else {
      return false;
    };
    if !conns.remove(&conn) || !conns.is_empty() {
      return false;
    }
    online.remove(principal);
    info!(%principal, "offline");
    let snapshot = online.keys().cloned().collect();
    self
      .router
      .broadcast(OutboundEvent::PresenceUpdate(snapshot))
      .await;
    true
  }

  /// Sorted list of online principals.
  pub async fn snapshot(&self) -> Vec<Principal> {
    self.online.lock().await.keys().cloned().collect()
  }

  pub async fn is_online(&self, principal: &Principal) -> bool {
    self.online.lock().await.contains_key(principal)
  }
}
