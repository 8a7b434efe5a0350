//! Per-scope serialization.
//!
//! Operations on one conversation scope (append then publish, read
//! reconciliation, reaction changes) run one at a time in arrival order, so
//! the persisted order and the delivered order agree. Different scopes never
//! wait on each other.

use std::{collections::HashMap, sync::Arc};

use parley_core::ConversationScope;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ScopeSequencer {
  slots: Mutex<HashMap<ConversationScope, Arc<Mutex<()>>>>,
}

impl ScopeSequencer {
  pub fn new() -> Self { Self::default() }

  /// Wait for the turn on `scope`. The turn lasts until the guard drops.
  /// Waiters are served in FIFO order.
  pub async fn lock(&self, scope: &ConversationScope) -> OwnedMutexGuard<()> {
    let slot = {
      let mut slots = self.slots.lock().await;
      // Idle slots are only referenced by the map.
      slots.retain(|_, slot| Arc::strong_count(slot) > 1);
      slots.entry(scope.clone()).or_default().clone()
    };
    slot.lock_owned().await
  }

  /// Number of scopes with a held or awaited turn.
  pub async fn active_scopes(&self) -> usize {
    let slots = self.slots.lock().await;
    slots.values().filter(|s| Arc::strong_count(s) > 1).count()
  }
}
