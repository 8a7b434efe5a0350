//! Groups: the membership directory consulted before group-scoped actions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Principal, Result};

/// A named group. Membership only grows; the admin is always a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub name:       String,
  pub admin:      Principal,
  #[serde(default)]
  pub avatar:     Option<String>,
  pub members:    BTreeSet<Principal>,
  pub created_at: DateTime<Utc>,
}

impl Group {
  pub fn is_member(&self, principal: &Principal) -> bool {
    self.members.contains(principal)
  }
}

/// Input to [`crate::store::ChatStore::create_group`].
#[derive(Debug, Clone)]
pub struct NewGroup {
  pub name:   String,
  pub admin:  Principal,
  pub avatar: Option<String>,
}

impl NewGroup {
  pub fn new(name: impl Into<String>, admin: impl Into<Principal>) -> Self {
    Self {
      name:   name.into(),
      admin:  admin.into(),
      avatar: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::Validation("group name must not be empty".into()));
    }
    self.admin.validate("admin")
  }
}
