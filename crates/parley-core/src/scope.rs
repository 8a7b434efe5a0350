//! Principals and conversation scopes: the routing keys of the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Principal ───────────────────────────────────────────────────────────────

/// Names that collide with fixed path segments of the REST surface
/// (`/messages/{user}/replies` and friends) and so cannot be usernames.
pub const RESERVED_NAMES: &[&str] = &["replies", "react", "unreact", "reply"];

/// A verified username. Carries no state beyond being a routing key.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
  pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn is_empty(&self) -> bool { self.0.trim().is_empty() }

  pub fn is_reserved(&self) -> bool { RESERVED_NAMES.contains(&self.0.as_str()) }

  /// Reject an empty or reserved name given for `field`.
  pub fn validate(&self, field: &str) -> Result<()> {
    if self.is_empty() {
      return Err(Error::Validation(format!("`{field}` must not be empty")));
    }
    if self.is_reserved() {
      return Err(Error::Validation(format!(
        "`{field}` cannot be the reserved name `{self}`"
      )));
    }
    Ok(())
  }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Principal {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for Principal {
  fn from(s: String) -> Self { Self(s) }
}

impl AsRef<str> for Principal {
  fn as_ref(&self) -> &str { &self.0 }
}

impl PartialEq<str> for Principal {
  fn eq(&self, other: &str) -> bool { self.0 == other }
}

impl PartialEq<&str> for Principal {
  fn eq(&self, other: &&str) -> bool { self.0 == *other }
}

// ─── ConversationScope ───────────────────────────────────────────────────────

/// The conversation a message belongs to.
///
/// `Private` is an unordered pair: always build it through
/// [`ConversationScope::private`], which stores the two principals sorted so
/// that `private(a, b) == private(b, a)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConversationScope {
  Private(Principal, Principal),
  Group(String),
}

impl ConversationScope {
  pub fn private(a: Principal, b: Principal) -> Self {
    if a <= b { Self::Private(a, b) } else { Self::Private(b, a) }
  }

  pub fn group(name: impl Into<String>) -> Self { Self::Group(name.into()) }

  /// The peer of `principal` in a private scope. `None` for groups or when
  /// `principal` is not one of the pair.
  pub fn counterpart(&self, principal: &Principal) -> Option<&Principal> {
    match self {
      Self::Private(a, b) if a == principal => Some(b),
      Self::Private(a, b) if b == principal => Some(a),
      _ => None,
    }
  }

  pub fn is_group(&self) -> bool { matches!(self, Self::Group(_)) }
}

impl fmt::Display for ConversationScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Private(a, b) => write!(f, "private:{a}+{b}"),
      Self::Group(name) => write!(f, "group:{name}"),
    }
  }
}
