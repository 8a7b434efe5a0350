//! Reactions and threaded replies.

use parley_core::{
  ConversationScope, Error, Principal, Result,
  event::{MessagePayload, OutboundEvent, ReactionUpdate},
  message::{Message, Mutated},
  store::ChatStore,
};
use uuid::Uuid;

use crate::{
  config::ReactionFanout,
  hub::{Hub, store_error},
};

impl<S: ChatStore> Hub<S> {
  /// Add `(user, emoji)` to a message's reactions. A pair that is already
  /// present leaves the message untouched and emits nothing.
  pub async fn react(
    &self,
    id: Uuid,
    user: &Principal,
    emoji: &str,
  ) -> Result<Mutated> {
    let emoji = checked_emoji(emoji)?;
    let by = user.clone();
    self
      .apply_reaction_change(id, user, move |m| m.add_reaction(&by, &emoji), false)
      .await
  }

  /// Remove `(user, emoji)`. The resulting set is announced even when the
  /// pair was absent.
  pub async fn unreact(
    &self,
    id: Uuid,
    user: &Principal,
    emoji: &str,
  ) -> Result<Mutated> {
    let emoji = checked_emoji(emoji)?;
    let by = user.clone();
    self
      .apply_reaction_change(id, user, move |m| m.remove_reaction(&by, &emoji), true)
      .await
  }

  async fn apply_reaction_change<F>(
    &self,
    id: Uuid,
    user: &Principal,
    f: F,
    announce_unchanged: bool,
  ) -> Result<Mutated>
  where
    F: FnOnce(&mut Message) -> bool + Send + 'static,
  {
    let scope = self.message(id).await?.scope();
    self.require_participant(&scope, user).await?;
    let _turn = self.sequencer.lock(&scope).await;
    let mutated = self
      .store
      .mutate(id, f)
      .await
      .map_err(store_error("mutate"))?
      .ok_or(Error::MessageNotFound(id))?;

    if mutated.changed || announce_unchanged {
      let update = ReactionUpdate {
        message_id: id,
        reactions:  mutated.message.reactions.clone(),
      };
      self.publish_reaction(&scope, update).await;
    }
    Ok(mutated)
  }

  async fn publish_reaction(
    &self,
    scope: &ConversationScope,
    update: ReactionUpdate,
  ) {
    let event = OutboundEvent::Reaction(update);
    match self.config.reaction_fanout {
      ReactionFanout::Global => self.router.broadcast(event).await,
      ReactionFanout::Scope => self.router.publish(scope, event).await,
    };
  }

  /// Post `payload` as a reply to `parent`. Threads are one level deep: a
  /// reply to a reply is attached to the thread's root.
  ///
  /// The author must belong to the parent's conversation and the reply must
  /// be addressed to that same conversation.
  pub async fn reply(
    &self,
    parent: Uuid,
    payload: MessagePayload,
  ) -> Result<Message> {
    let mut input = payload.into_new_message()?;
    let parent = self.message(parent).await?;
    let scope = parent.scope();
    self.require_participant(&scope, &input.from).await?;
    if input.scope() != scope {
      return Err(Error::Validation(format!(
        "a reply to {} must stay in {scope}",
        parent.id
      )));
    }
    input.reply_to = Some(parent.reply_to.unwrap_or(parent.id));
    self.append_and_publish(input, OutboundEvent::Reply).await
  }

  /// Replies to `parent` in creation order.
  pub async fn replies(&self, parent: Uuid) -> Result<Vec<Message>> {
    self
      .store
      .query_replies(parent)
      .await
      .map_err(store_error("query_replies"))
  }

  /// Load one message by id.
  pub async fn message(&self, id: Uuid) -> Result<Message> {
    self
      .store
      .find_by_id(id)
      .await
      .map_err(store_error("find_by_id"))?
      .ok_or(Error::MessageNotFound(id))
  }
}

fn checked_emoji(emoji: &str) -> Result<String> {
  let emoji = emoji.trim();
  if emoji.is_empty() {
    return Err(Error::Validation("`emoji` must not be empty".into()));
  }
  Ok(emoji.to_owned())
}
