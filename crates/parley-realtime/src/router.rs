//! Connection registry and room fan-out.
//!
//! A *room* is a delivery target: one per principal (their identity scope)
//! and one per group. Connections subscribe to rooms; publishing to a room
//! delivers to every subscribed connection exactly once. A principal with
//! several devices gets every event on each of them.
//!
//! Every table lives behind a single lock that is also held while events are
//! handed to connection channels, so two publishes are observed in the same
//! order by every connection that receives both.

use std::{
  collections::{BTreeSet, HashMap, HashSet},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use parley_core::{ConversationScope, Principal, event::OutboundEvent};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

/// Opaque handle for one attached transport connection.
pub type ConnectionId = u64;

/// A fan-out target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
  /// Every connection of one principal.
  User(Principal),
  /// Every connection that joined a group.
  Group(String),
}

impl Room {
  /// The rooms that together make up a conversation scope.
  pub fn for_scope(scope: &ConversationScope) -> Vec<Room> {
    match scope {
      ConversationScope::Private(a, b) => {
        vec![Room::User(a.clone()), Room::User(b.clone())]
      }
      ConversationScope::Group(name) => vec![Room::Group(name.clone())],
    }
  }
}

struct Subscriber {
  principal: Principal,
  tx:        mpsc::UnboundedSender<OutboundEvent>,
  rooms:     HashSet<Room>,
}

#[derive(Default)]
struct Tables {
  subscribers: HashMap<ConnectionId, Subscriber>,
  rooms:       HashMap<Room, BTreeSet<ConnectionId>>,
}

impl Tables {
  fn subscribe(&mut self, conn: ConnectionId, room: Room) -> bool {
    let Some(sub) = self.subscribers.get_mut(&conn) else {
      return false;
    };
    if !sub.rooms.insert(room.clone()) {
      return false;
    }
    self.rooms.entry(room).or_default().insert(conn);
    true
  }

  /// Hand `event` to each listed connection. Closed channels are skipped;
  /// their owner is detached when the transport notices.
  fn deliver(
    &self,
    targets: impl IntoIterator<Item = ConnectionId>,
    event: &OutboundEvent,
  ) -> usize {
    let mut delivered = 0;
    for conn in targets {
      let Some(sub) = self.subscribers.get(&conn) else {
        continue;
      };
      if sub.tx.send(event.clone()).is_ok() {
        delivered += 1;
      } else {
        trace!(conn, "dropping event for closed connection");
      }
    }
    delivered
  }
}

/// Registry of live connections and their room subscriptions.
#[derive(Clone, Default)]
pub struct RoomRouter {
  tables:  Arc<Mutex<Tables>>,
  next_id: Arc<AtomicU64>,
}

impl RoomRouter {
  pub fn new() -> Self { Self::default() }

  /// Register a new connection for `principal`. The returned receiver yields
  /// every event routed to it. The connection starts out in no room.
  pub async fn attach(
    &self,
    principal: Principal,
  ) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundEvent>) {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut tables = self.tables.lock().await;
    tables.subscribers.insert(id, Subscriber {
      principal,
      tx,
      rooms: HashSet::new(),
    });
    debug!(conn = id, "connection attached");
    (id, rx)
  }

  /// Subscribe `conn` to `principal`'s identity room. Idempotent; returns
  /// whether the subscription is new.
  pub async fn join(&self, conn: ConnectionId, principal: &Principal) -> bool {
    let mut tables = self.tables.lock().await;
    tables.subscribe(conn, Room::User(principal.clone()))
  }

  /// Subscribe `conn` to a group room. Idempotent.
  pub async fn join_group(&self, conn: ConnectionId, group: &str) -> bool {
    let mut tables = self.tables.lock().await;
    tables.subscribe(conn, Room::Group(group.to_owned()))
  }

  /// Remove `conn` from every room and forget it. Returns the principal it
  /// was attached for, or `None` if it was already gone.
  pub async fn leave(&self, conn: ConnectionId) -> Option<Principal> {
    let mut tables = self.tables.lock().await;
    let sub = tables.subscribers.remove(&conn)?;
    for room in &sub.rooms {
      if let Some(members) = tables.rooms.get_mut(room) {
        members.remove(&conn);
        if members.is_empty() {
          tables.rooms.remove(room);
        }
      }
    }
    debug!(conn, "connection detached");
    Some(sub.principal)
  }

  /// Deliver `event` to every connection subscribed to any room of `scope`.
  /// Returns the number of connections reached.
  pub async fn publish(
    &self,
    scope: &ConversationScope,
    event: OutboundEvent,
  ) -> usize {
    self.publish_rooms(&Room::for_scope(scope), event, None).await
  }

  /// Like [`publish`](Self::publish), but skips every connection owned by
  /// `except`.
  pub async fn publish_except(
    &self,
    scope: &ConversationScope,
    event: OutboundEvent,
    except: &Principal,
  ) -> usize {
    self
      .publish_rooms(&Room::for_scope(scope), event, Some(except))
      .await
  }

  /// Deliver to the union of `rooms`; a connection in several of them
  /// still receives the event once.
  pub async fn publish_rooms(
    &self,
    rooms: &[Room],
    event: OutboundEvent,
    except: Option<&Principal>,
  ) -> usize {
    let tables = self.tables.lock().await;
    let targets: BTreeSet<ConnectionId> = rooms
      .iter()
      .filter_map(|room| tables.rooms.get(room))
      .flatten()
      .copied()
      .filter(|conn| match (except, tables.subscribers.get(conn)) {
        (Some(skip), Some(sub)) => &sub.principal != skip,
        _ => true,
      })
      .collect();
    tables.deliver(targets, &event)
  }

  /// Deliver `event` to every attached connection.
  pub async fn broadcast(&self, event: OutboundEvent) -> usize {
    let tables = self.tables.lock().await;
    let targets: Vec<_> = tables.subscribers.keys().copied().collect();
    tables.deliver(targets, &event)
  }

  /// Deliver `event` to a single connection.
  pub async fn send(&self, conn: ConnectionId, event: OutboundEvent) -> bool {
    let tables = self.tables.lock().await;
    tables.deliver([conn], &event) == 1
  }

  /// Number of connections currently subscribed to `room`.
  pub async fn room_size(&self, room: &Room) -> usize {
    let tables = self.tables.lock().await;
    tables.rooms.get(room).map_or(0, BTreeSet::len)
  }
}
