//! The real-time event catalog.
//!
//! Every frame on the event channel is a JSON object
//! `{"event": "<name>", "data": <payload>}`. Event names are part of the
//! client contract and must not change.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Principal, Result,
  message::{Body, Message, NewMessage, Reaction, Target},
};

// ─── Inbound payloads ────────────────────────────────────────────────────────

/// A message as submitted by a client. Exactly one of `to` / `group` and at
/// least one of `text` / `sticker` must be set. Client-side timestamps are
/// ignored; the store assigns `time`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
  pub from:    Principal,
  #[serde(default)]
  pub to:      Option<Principal>,
  #[serde(default)]
  pub group:   Option<String>,
  #[serde(default)]
  pub text:    Option<String>,
  #[serde(default)]
  pub sticker: Option<String>,
  #[serde(default)]
  pub color:   Option<String>,
  #[serde(default)]
  pub avatar:  Option<String>,
}

impl MessagePayload {
  /// Resolve the addressing fields; exactly one must be present.
  pub fn target(&self) -> Result<Target> {
    match (&self.to, &self.group) {
      (Some(to), None) => Ok(Target::Private { to: to.clone() }),
      (None, Some(group)) => Ok(Target::Group { group: group.clone() }),
      (Some(_), Some(_)) => Err(Error::Validation(
        "message cannot have both `to` and `group`".into(),
      )),
      (None, None) => {
        Err(Error::Validation("message needs either `to` or `group`".into()))
      }
    }
  }

  /// Convert into a validated [`NewMessage`].
  pub fn into_new_message(self) -> Result<NewMessage> {
    let target = self.target()?;
    let message = NewMessage {
      from: self.from,
      target,
      body: Body::from_parts(self.text, self.sticker)?,
      color: self.color,
      avatar: self.avatar,
      reply_to: None,
    };
    message.validate()?;
    Ok(message)
  }
}

/// `typing` / `stop typing` in a private conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateTyping {
  pub from: Principal,
  pub to:   Principal,
}

/// `typing-group` / `stop typing-group`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupTyping {
  pub from:  Principal,
  pub group: String,
}

/// `read-message`: `to` acknowledges everything `from` sent them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateRead {
  pub from: Principal,
  pub to:   Principal,
}

/// `read-group-message`: `username` acknowledges the group's messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRead {
  pub group:    String,
  pub username: Principal,
}

/// `react` / `unreact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequest {
  pub message_id: Uuid,
  pub user:       Principal,
  pub emoji:      String,
}

/// `reply`: a message payload plus the parent id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
  pub reply_to: Uuid,
  #[serde(flatten)]
  pub message:  MessagePayload,
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// Events a connection may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
  #[serde(rename = "join")]
  Join(Principal),
  #[serde(rename = "join-group")]
  JoinGroup(String),
  #[serde(rename = "private message")]
  PrivateMessage(MessagePayload),
  #[serde(rename = "group message")]
  GroupMessage(MessagePayload),
  #[serde(rename = "typing")]
  Typing(PrivateTyping),
  #[serde(rename = "stop typing")]
  StopTyping(PrivateTyping),
  #[serde(rename = "typing-group")]
  TypingGroup(GroupTyping),
  #[serde(rename = "stop typing-group")]
  StopTypingGroup(GroupTyping),
  #[serde(rename = "read-message")]
  ReadMessage(PrivateRead),
  #[serde(rename = "read-group-message")]
  ReadGroupMessage(GroupRead),
  #[serde(rename = "react")]
  React(ReactionRequest),
  #[serde(rename = "unreact")]
  Unreact(ReactionRequest),
  #[serde(rename = "reply")]
  Reply(ReplyRequest),
  #[serde(rename = "presence")]
  Presence(Principal),
}

impl InboundEvent {
  /// The event name as it appears on the wire.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Join(_) => "join",
      Self::JoinGroup(_) => "join-group",
      Self::PrivateMessage(_) => "private message",
      Self::GroupMessage(_) => "group message",
      Self::Typing(_) => "typing",
      Self::StopTyping(_) => "stop typing",
      Self::TypingGroup(_) => "typing-group",
      Self::StopTypingGroup(_) => "stop typing-group",
      Self::ReadMessage(_) => "read-message",
      Self::ReadGroupMessage(_) => "read-group-message",
      Self::React(_) => "react",
      Self::Unreact(_) => "unreact",
      Self::Reply(_) => "reply",
      Self::Presence(_) => "presence",
    }
  }

  /// The principal this event claims to act as. Must match the
  /// connection's verified principal.
  pub fn actor(&self) -> Option<&Principal> {
    match self {
      Self::Join(p) | Self::Presence(p) => Some(p),
      Self::JoinGroup(_) => None,
      Self::PrivateMessage(m) | Self::GroupMessage(m) => Some(&m.from),
      Self::Typing(t) | Self::StopTyping(t) => Some(&t.from),
      Self::TypingGroup(t) | Self::StopTypingGroup(t) => Some(&t.from),
      Self::ReadMessage(r) => Some(&r.to),
      Self::ReadGroupMessage(r) => Some(&r.username),
      Self::React(r) | Self::Unreact(r) => Some(&r.user),
      Self::Reply(r) => Some(&r.message.from),
    }
  }
}

// ─── Outbound payloads ───────────────────────────────────────────────────────

/// Who is typing, in a private conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
  pub from: Principal,
}

/// Who is typing, in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTypingNotice {
  pub from:  Principal,
  pub group: String,
}

/// `message-read` / `group-message-read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
  pub id: Uuid,
  pub by: Principal,
}

/// `reaction`: the full reaction set of a message after a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
  pub message_id: Uuid,
  pub reactions:  Vec<Reaction>,
}

/// A request-level failure, sent only to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
  pub kind:    String,
  pub message: String,
}

impl From<&Error> for ErrorNotice {
  fn from(e: &Error) -> Self {
    Self {
      kind:    e.kind().to_owned(),
      message: e.to_string(),
    }
  }
}

// ─── Outbound ────────────────────────────────────────────────────────────────

/// Events the server delivers to connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
  #[serde(rename = "chat history")]
  ChatHistory(Vec<Message>),
  #[serde(rename = "private message")]
  PrivateMessage(Message),
  #[serde(rename = "group message")]
  GroupMessage(Message),
  #[serde(rename = "typing")]
  Typing(TypingNotice),
  #[serde(rename = "stop typing")]
  StopTyping(TypingNotice),
  #[serde(rename = "typing-group")]
  TypingGroup(GroupTypingNotice),
  #[serde(rename = "stop typing-group")]
  StopTypingGroup(GroupTypingNotice),
  #[serde(rename = "message-read")]
  MessageRead(ReadReceipt),
  #[serde(rename = "group-message-read")]
  GroupMessageRead(ReadReceipt),
  #[serde(rename = "reaction")]
  Reaction(ReactionUpdate),
  #[serde(rename = "reply")]
  Reply(Message),
  #[serde(rename = "presence-update")]
  PresenceUpdate(Vec<Principal>),
  #[serde(rename = "error")]
  Error(ErrorNotice),
}
