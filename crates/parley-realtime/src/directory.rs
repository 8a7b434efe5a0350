//! Group directory operations and history reads for the REST surface.

use parley_core::{
  Error, Principal, Result,
  group::{Group, NewGroup},
  message::{HISTORY_LIMIT, Message},
  store::ChatStore,
};
use tracing::info;

use crate::hub::{Hub, store_error};

impl<S: ChatStore> Hub<S> {
  /// Create a group whose admin is its first member. Fails with
  /// `GroupExists` when the name is taken.
  pub async fn create_group(&self, input: NewGroup) -> Result<Group> {
    input.validate()?;
    let name = input.name.clone();
    let group = self
      .store
      .create_group(input)
      .await
      .map_err(store_error("create_group"))?
      .ok_or_else(|| Error::GroupExists(name))?;
    info!(group = %group.name, admin = %group.admin, "group created");
    Ok(group)
  }

  /// Add `principal` to `name`. Joining twice is harmless.
  pub async fn add_member(&self, name: &str, principal: &Principal) -> Result<Group> {
    principal.validate("username")?;
    self
      .store
      .join_group(name, principal)
      .await
      .map_err(store_error("join_group"))?
      .ok_or_else(|| Error::GroupNotFound(name.to_owned()))
  }

  pub async fn groups(&self, member: Option<&Principal>) -> Result<Vec<Group>> {
    self
      .store
      .list_groups(member)
      .await
      .map_err(store_error("list_groups"))
  }

  pub async fn is_member(&self, name: &str, principal: &Principal) -> Result<bool> {
    let group = self
      .store
      .get_group(name)
      .await
      .map_err(store_error("get_group"))?;
    Ok(group.is_some_and(|g| g.is_member(principal)))
  }

  /// The newest `limit` messages between two principals, oldest first.
  /// `limit` is capped at 100.
  pub async fn private_history(
    &self,
    a: &Principal,
    b: &Principal,
    limit: usize,
  ) -> Result<Vec<Message>> {
    self
      .store
      .query_private(a, b, limit.min(HISTORY_LIMIT))
      .await
      .map_err(store_error("query_private"))
  }

  /// The newest `limit` messages of a group, oldest first.
  pub async fn group_history(&self, group: &str, limit: usize) -> Result<Vec<Message>> {
    self
      .store
      .query_group(group, limit.min(HISTORY_LIMIT))
      .await
      .map_err(store_error("query_group"))
  }
}
