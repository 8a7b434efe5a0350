//! Ephemeral typing signals.
//!
//! Each `(sender, scope)` pair has at most one pending expiry timer. A new
//! typing signal re-arms it; an explicit stop cancels it. When the window
//! passes without a new signal the coordinator emits the stop itself, so a
//! client that vanishes mid-sentence never leaves a stuck indicator.
//!
//! Typing notices go to the scope's other participants only: never to the
//! sender's own connections.

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use parley_core::{
  ConversationScope, Principal,
  event::{GroupTypingNotice, OutboundEvent, TypingNotice},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::trace;

use crate::router::RoomRouter;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypingKey {
  sender: Principal,
  scope:  ConversationScope,
}

struct Timer {
  generation: u64,
  handle:     JoinHandle<()>,
}

struct Inner {
  router:     RoomRouter,
  window:     Duration,
  timers:     Mutex<HashMap<TypingKey, Timer>>,
  generation: AtomicU64,
}

/// Tracks who is typing where and expires stale signals.
#[derive(Clone)]
pub struct TypingCoordinator {
  inner: Arc<Inner>,
}

fn notice(key: &TypingKey, typing: bool) -> OutboundEvent {
  let from = key.sender.clone();
  match (&key.scope, typing) {
    (ConversationScope::Private(..), true) => {
      OutboundEvent::Typing(TypingNotice { from })
    }
    (ConversationScope::Private(..), false) => {
      OutboundEvent::StopTyping(TypingNotice { from })
    }
    (ConversationScope::Group(group), true) => {
      OutboundEvent::TypingGroup(GroupTypingNotice {
        from,
        group: group.clone(),
      })
    }
    (ConversationScope::Group(group), false) => {
      OutboundEvent::StopTypingGroup(GroupTypingNotice {
        from,
        group: group.clone(),
      })
    }
  }
}

impl Inner {
  async fn announce(&self, key: &TypingKey, typing: bool) {
    self
      .router
      .publish_except(&key.scope, notice(key, typing), &key.sender)
      .await;
  }

  /// Timer body. A timer that was re-armed or cancelled in the meantime
  /// finds a newer generation (or nothing) and does nothing.
  async fn expire(&self, key: TypingKey, generation: u64) {
    let mut timers = self.timers.lock().await;
    match timers.get(&key) {
      Some(timer) if timer.generation == generation => {
        timers.remove(&key);
        trace!(sender = %key.sender, scope = %key.scope, "typing expired");
        self.announce(&key, false).await;
      }
      _ => {}
    }
  }
}

impl TypingCoordinator {
  pub fn new(router: RoomRouter, window: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        router,
        window,
        timers: Mutex::new(HashMap::new()),
        generation: AtomicU64::new(0),
      }),
    }
  }

  /// Relay a typing signal and (re)arm the expiry timer. Every call relays,
  /// so a steady stream of keystrokes keeps the indicator alive.
  pub async fn start_typing(&self, sender: Principal, scope: ConversationScope) {
    let key = TypingKey { sender, scope };
    let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);

    let mut timers = self.inner.timers.lock().await;
    self.inner.announce(&key, true).await;

    let inner = self.inner.clone();
    let expiring = key.clone();
    let handle = tokio::spawn(async move {
      tokio::time::sleep(inner.window).await;
      inner.expire(expiring, generation).await;
    });
    if let Some(previous) = timers.insert(key, Timer { generation, handle }) {
      previous.handle.abort();
    }
  }

  /// Cancel the pending timer, if any, and relay the stop immediately.
  pub async fn stop_typing(&self, sender: Principal, scope: ConversationScope) {
    let key = TypingKey { sender, scope };
    let mut timers = self.inner.timers.lock().await;
    if let Some(timer) = timers.remove(&key) {
      timer.handle.abort();
    }
    self.inner.announce(&key, false).await;
  }

  /// Whether `sender` has a live typing signal in `scope`.
  pub async fn is_typing(
    &self,
    sender: &Principal,
    scope: &ConversationScope,
  ) -> bool {
    let key = TypingKey {
      sender: sender.clone(),
      scope:  scope.clone(),
    };
    self.inner.timers.lock().await.contains_key(&key)
  }
}
