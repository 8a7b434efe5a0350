//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision) so that they also sort lexicographically. Sets (read-by,
//! reactions) are stored as compact JSON arrays. UUIDs are stored as
//! hyphenated lowercase strings.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::{
  Principal,
  group::Group,
  message::{Body, Message, Reaction, Target},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Target / Body ────────────────────────────────────────────────────────────

/// Split a target into the `(recipient, group_name)` column pair.
pub fn encode_target(t: &Target) -> (Option<String>, Option<String>) {
  match t {
    Target::Private { to } => (Some(to.as_str().to_owned()), None),
    Target::Group { group } => (None, Some(group.clone())),
  }
}

pub fn decode_target(
  recipient: Option<String>,
  group_name: Option<String>,
) -> Result<Target> {
  match (recipient, group_name) {
    (Some(to), None) => Ok(Target::Private { to: to.into() }),
    (None, Some(group)) => Ok(Target::Group { group }),
    _ => Err(Error::Corrupt(
      "message row must have exactly one of recipient and group_name".into(),
    )),
  }
}

/// Split a body into the `(body_kind, body)` column pair.
pub fn encode_body(b: &Body) -> (&'static str, String) {
  match b {
    Body::Text { text } => ("text", text.clone()),
    Body::Sticker { sticker } => ("sticker", sticker.clone()),
  }
}

pub fn decode_body(kind: &str, value: String) -> Result<Body> {
  match kind {
    "text" => Ok(Body::Text { text: value }),
    "sticker" => Ok(Body::Sticker { sticker: value }),
    other => Err(Error::Corrupt(format!("unknown body kind: {other:?}"))),
  }
}

// ─── Sets ─────────────────────────────────────────────────────────────────────

pub fn encode_read_by(read_by: &BTreeSet<Principal>) -> Result<String> {
  Ok(serde_json::to_string(read_by)?)
}

pub fn decode_read_by(s: &str) -> Result<BTreeSet<Principal>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_reactions(reactions: &[Reaction]) -> Result<String> {
  Ok(serde_json::to_string(reactions)?)
}

pub fn decode_reactions(s: &str) -> Result<Vec<Reaction>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawMessage::from_row`], in order.
pub const MESSAGE_COLUMNS: &str = "message_id, sender, recipient, group_name, \
                                   body_kind, body, color, avatar, created_at, \
                                   read_by, reactions, reply_to";

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id: String,
  pub sender:     String,
  pub recipient:  Option<String>,
  pub group_name: Option<String>,
  pub body_kind:  String,
  pub body:       String,
  pub color:      Option<String>,
  pub avatar:     Option<String>,
  pub created_at: String,
  pub read_by:    String,
  pub reactions:  String,
  pub reply_to:   Option<String>,
}

impl RawMessage {
  /// Row mapper for queries selecting [`MESSAGE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id: row.get(0)?,
      sender:     row.get(1)?,
      recipient:  row.get(2)?,
      group_name: row.get(3)?,
      body_kind:  row.get(4)?,
      body:       row.get(5)?,
      color:      row.get(6)?,
      avatar:     row.get(7)?,
      created_at: row.get(8)?,
      read_by:    row.get(9)?,
      reactions:  row.get(10)?,
      reply_to:   row.get(11)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:         decode_uuid(&self.message_id)?,
      from:       self.sender.into(),
      target:     decode_target(self.recipient, self.group_name)?,
      body:       decode_body(&self.body_kind, self.body)?,
      color:      self.color,
      avatar:     self.avatar,
      created_at: decode_dt(&self.created_at)?,
      read_by:    decode_read_by(&self.read_by)?,
      reactions:  decode_reactions(&self.reactions)?,
      reply_to:   self.reply_to.as_deref().map(decode_uuid).transpose()?,
    })
  }
}

/// Raw strings read from a `chat_groups` row plus its member rows.
pub struct RawGroup {
  pub name:       String,
  pub admin:      String,
  pub avatar:     Option<String>,
  pub created_at: String,
  pub members:    Vec<String>,
}

impl RawGroup {
  pub fn into_group(self) -> Result<Group> {
    Ok(Group {
      name:       self.name,
      admin:      self.admin.into(),
      avatar:     self.avatar,
      members:    self.members.into_iter().map(Principal::from).collect(),
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
