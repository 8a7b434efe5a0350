//! Message types: the entities of the append-only message log.
//!
//! A message is persisted once and never deleted. After creation only two
//! fields ever change: the read-by set and the reaction set. Both only go
//! through [`crate::store::ChatStore::mutate`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ConversationScope, Error, Principal, Result};

/// Default and maximum number of messages returned by history queries.
pub const HISTORY_LIMIT: usize = 100;

// ─── Addressing ──────────────────────────────────────────────────────────────

/// Where a message is addressed: exactly one of a peer or a group.
///
/// Flattened into the message record as either a `to` or a `group` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
  Private { to: Principal },
  Group { group: String },
}

impl Target {
  pub fn private(to: impl Into<Principal>) -> Self {
    Self::Private { to: to.into() }
  }

  pub fn group(name: impl Into<String>) -> Self {
    Self::Group { group: name.into() }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The rendering payload. Flattened as either a `text` or a `sticker` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
  Text { text: String },
  /// Reference (usually a URL) to a sticker image.
  Sticker { sticker: String },
}

impl Body {
  pub fn text(text: impl Into<String>) -> Self {
    Self::Text { text: text.into() }
  }

  pub fn sticker(url: impl Into<String>) -> Self {
    Self::Sticker { sticker: url.into() }
  }

  /// Build a body from the optional wire fields. A non-empty sticker wins
  /// over text; at least one of them must be non-empty.
  pub fn from_parts(text: Option<String>, sticker: Option<String>) -> Result<Self> {
    let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
    match (non_empty(text), non_empty(sticker)) {
      (_, Some(url)) => Ok(Self::Sticker { sticker: url }),
      (Some(text), None) => Ok(Self::Text { text }),
      (None, None) => Err(Error::Validation(
        "message needs a non-empty text or sticker".into(),
      )),
    }
  }
}

// ─── Reactions ───────────────────────────────────────────────────────────────

/// One principal's emoji on a message. Unique per `(user, emoji)` pair.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Reaction {
  pub user:  Principal,
  pub emoji: String,
}

// ─── Message ─────────────────────────────────────────────────────────────────

/// A persisted message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
  pub id:         Uuid,
  pub from:       Principal,
  #[serde(flatten)]
  pub target:     Target,
  #[serde(flatten)]
  pub body:       Body,
  #[serde(default)]
  pub color:      Option<String>,
  #[serde(default)]
  pub avatar:     Option<String>,
  /// Server-assigned creation time. Ordering ties are broken by append
  /// order, never by comparing this value.
  #[serde(rename = "time")]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub read_by:    BTreeSet<Principal>,
  /// Set semantics, kept in the order reactions were added.
  #[serde(default)]
  pub reactions:  Vec<Reaction>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reply_to:   Option<Uuid>,
}

impl Message {
  pub fn scope(&self) -> ConversationScope {
    match &self.target {
      Target::Private { to } => {
        ConversationScope::private(self.from.clone(), to.clone())
      }
      Target::Group { group } => ConversationScope::group(group.clone()),
    }
  }

  /// Record that `reader` has seen this message. Returns `false` if they
  /// already had.
  pub fn mark_read_by(&mut self, reader: &Principal) -> bool {
    self.read_by.insert(reader.clone())
  }

  /// Returns `false` (and leaves the set alone) if the pair already exists.
  pub fn add_reaction(&mut self, user: &Principal, emoji: &str) -> bool {
    if self.has_reaction(user, emoji) {
      return false;
    }
    self.reactions.push(Reaction {
      user:  user.clone(),
      emoji: emoji.to_owned(),
    });
    true
  }

  /// Returns `true` if the pair was present.
  pub fn remove_reaction(&mut self, user: &Principal, emoji: &str) -> bool {
    let before = self.reactions.len();
    self
      .reactions
      .retain(|r| !(&r.user == user && r.emoji == emoji));
    self.reactions.len() != before
  }

  pub fn has_reaction(&self, user: &Principal, emoji: &str) -> bool {
    self
      .reactions
      .iter()
      .any(|r| &r.user == user && r.emoji == emoji)
  }
}

// ─── NewMessage ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ChatStore::append`].
/// `id` and `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub from:     Principal,
  pub target:   Target,
  pub body:     Body,
  pub color:    Option<String>,
  pub avatar:   Option<String>,
  pub reply_to: Option<Uuid>,
}

impl NewMessage {
  /// Convenience constructor with all optional fields unset.
  pub fn new(from: impl Into<Principal>, target: Target, body: Body) -> Self {
    Self {
      from: from.into(),
      target,
      body,
      color: None,
      avatar: None,
      reply_to: None,
    }
  }

  pub fn scope(&self) -> ConversationScope {
    match &self.target {
      Target::Private { to } => {
        ConversationScope::private(self.from.clone(), to.clone())
      }
      Target::Group { group } => ConversationScope::group(group.clone()),
    }
  }

  /// Reject records with empty or reserved routing fields before any state
  /// changes.
  pub fn validate(&self) -> Result<()> {
    self.from.validate("from")?;
    match &self.target {
      Target::Private { to } => to.validate("to"),
      Target::Group { group } if group.trim().is_empty() => {
        Err(Error::Validation("`group` must not be empty".into()))
      }
      Target::Group { .. } => Ok(()),
    }
  }
}

// ─── Mutation result ─────────────────────────────────────────────────────────

/// Outcome of [`crate::store::ChatStore::mutate`]: the stored record after
/// the update and whether the update changed anything.
#[derive(Debug, Clone)]
pub struct Mutated {
  pub message: Message,
  pub changed: bool,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn sample() -> Message {
    Message {
      id:         Uuid::nil(),
      from:       "alice".into(),
      target:     Target::private("bob"),
      body:       Body::text("hi"),
      color:      Some("#ff0".into()),
      avatar:     None,
      created_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc),
      read_by:    BTreeSet::new(),
      reactions:  Vec::new(),
      reply_to:   None,
    }
  }

  #[test]
  fn serializes_to_flat_record_layout() {
    let value = serde_json::to_value(sample()).unwrap();
    assert_eq!(value["from"], "alice");
    assert_eq!(value["to"], "bob");
    assert_eq!(value["text"], "hi");
    assert_eq!(value["readBy"], json!([]));
    assert_eq!(value["reactions"], json!([]));
    assert!(value.get("group").is_none());
    assert!(value.get("sticker").is_none());
    assert!(value.get("replyTo").is_none());
  }

  #[test]
  fn group_sticker_reply_parses_back() {
    let raw = json!({
      "id": Uuid::nil(),
      "from": "carol",
      "group": "g1",
      "sticker": "https://example.com/cat.png",
      "time": "2024-05-01T12:00:00Z",
      "readBy": ["alice"],
      "reactions": [{ "user": "alice", "emoji": "👍" }],
      "replyTo": Uuid::nil(),
    });
    let msg: Message = serde_json::from_value(raw).unwrap();
    assert_eq!(msg.target, Target::group("g1"));
    assert_eq!(msg.body, Body::sticker("https://example.com/cat.png"));
    assert_eq!(msg.reply_to, Some(Uuid::nil()));
    assert_eq!(msg.scope(), ConversationScope::group("g1"));
  }

  #[test]
  fn reactions_are_unique_per_pair() {
    let mut msg = sample();
    let carol = Principal::from("carol");
    assert!(msg.add_reaction(&carol, "👍"));
    assert!(!msg.add_reaction(&carol, "👍"));
    assert!(msg.add_reaction(&carol, "🎉"));
    assert_eq!(msg.reactions.len(), 2);

    assert!(msg.remove_reaction(&carol, "👍"));
    assert!(!msg.remove_reaction(&carol, "👍"));
    assert_eq!(msg.reactions, vec![Reaction {
      user:  carol,
      emoji: "🎉".into(),
    }]);
  }

  #[test]
  fn body_requires_some_payload() {
    assert!(Body::from_parts(None, None).is_err());
    assert!(Body::from_parts(Some("  ".into()), Some(String::new())).is_err());
    assert_eq!(
      Body::from_parts(Some("hi".into()), None).unwrap(),
      Body::text("hi")
    );
    assert_eq!(
      Body::from_parts(Some(String::new()), Some("u".into())).unwrap(),
      Body::sticker("u")
    );
  }

  #[test]
  fn validate_rejects_empty_group() {
    let msg = NewMessage::new("alice", Target::group(" "), Body::text("x"));
    assert!(matches!(msg.validate(), Err(Error::Validation(_))));
  }
}
