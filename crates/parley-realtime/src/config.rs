//! Tunables for the [`Hub`](crate::Hub).

use std::time::Duration;

use parley_core::message::HISTORY_LIMIT;
use serde::Deserialize;

/// Who receives `reaction` events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionFanout {
  /// Every connected client, regardless of scope.
  #[default]
  Global,
  /// Only connections subscribed to the message's scope.
  Scope,
}

/// Runtime configuration for the real-time core; every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
  /// Messages sent as `chat history` on connect. Capped at 100.
  pub history_limit:    usize,
  /// Silence after which a typing signal expires.
  pub typing_window_ms: u64,
  pub reaction_fanout:  ReactionFanout,
}

impl Default for HubConfig {
  fn default() -> Self {
    Self {
      history_limit:    HISTORY_LIMIT,
      typing_window_ms: 1200,
      reaction_fanout:  ReactionFanout::default(),
    }
  }
}

impl HubConfig {
  pub fn typing_window(&self) -> Duration {
    Duration::from_millis(self.typing_window_ms)
  }

  pub fn history_limit(&self) -> usize { self.history_limit.min(HISTORY_LIMIT) }
}
