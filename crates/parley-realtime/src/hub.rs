//! The dispatch hub: connection lifecycle, inbound event handling and the
//! message send path.

use std::sync::Arc;

use parley_core::{
  ConversationScope, Error, Principal, Result,
  event::{ErrorNotice, InboundEvent, MessagePayload, OutboundEvent},
  group::Group,
  message::{Message, NewMessage, Target},
  store::ChatStore,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  config::HubConfig,
  presence::PresenceTracker,
  router::{ConnectionId, RoomRouter},
  sequencer::ScopeSequencer,
  typing::TypingCoordinator,
};

/// The identity of an attached connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub id:        ConnectionId,
  /// The authenticated principal. Every inbound event must act as them.
  pub principal: Principal,
}

/// A freshly attached connection and its outbound event stream.
pub struct Connection {
  pub session: Session,
  pub events:  mpsc::UnboundedReceiver<OutboundEvent>,
}

/// Owns every real-time component and applies inbound events to them.
pub struct Hub<S> {
  pub(crate) store:     Arc<S>,
  pub(crate) router:    RoomRouter,
  pub(crate) presence:  PresenceTracker,
  pub(crate) typing:    TypingCoordinator,
  pub(crate) sequencer: ScopeSequencer,
  pub(crate) config:    HubConfig,
}

/// Log a backend failure and wrap it for the caller.
pub(crate) fn store_error<E>(op: &'static str) -> impl FnOnce(E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |e| {
    error!(op, error = %e, "store operation failed");
    Error::persistence(e)
  }
}

impl<S: ChatStore> Hub<S> {
  pub fn new(store: Arc<S>, config: HubConfig) -> Self {
    let router = RoomRouter::new();
    Self {
      presence: PresenceTracker::new(router.clone()),
      typing: TypingCoordinator::new(router.clone(), config.typing_window()),
      sequencer: ScopeSequencer::new(),
      store,
      router,
      config,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn router(&self) -> &RoomRouter { &self.router }

  pub fn presence(&self) -> &PresenceTracker { &self.presence }

  pub fn typing(&self) -> &TypingCoordinator { &self.typing }

  pub fn config(&self) -> &HubConfig { &self.config }

  // ─── Lifecycle ─────────────────────────────────────────────────────────────

  /// Attach a connection for an authenticated principal and queue its
  /// `chat history`. The connection is not in any room until it joins.
  pub async fn connect(&self, principal: Principal) -> Result<Connection> {
    let (id, events) = self.router.attach(principal.clone()).await;
    let history = match self
      .store
      .query_history(&principal, self.config.history_limit())
      .await
    {
      Ok(history) => history,
      Err(e) => {
        self.router.leave(id).await;
        return Err(store_error("query_history")(e));
      }
    };
    self.router.send(id, OutboundEvent::ChatHistory(history)).await;
    info!(conn = id, %principal, "connected");
    Ok(Connection {
      session: Session { id, principal },
      events,
    })
  }

  /// Detach a connection: it leaves every room, and its principal goes
  /// offline if this was their last connection.
  pub async fn disconnect(&self, session: &Session) {
    self.router.leave(session.id).await;
    self
      .presence
      .mark_offline(&session.principal, session.id)
      .await;
    info!(conn = session.id, principal = %session.principal, "disconnected");
  }

  /// Report a failed request to the connection that made it, and only to it.
  pub async fn reject(&self, session: &Session, err: &Error) {
    warn!(conn = session.id, error = %err, "request rejected");
    self
      .router
      .send(session.id, OutboundEvent::Error(ErrorNotice::from(err)))
      .await;
  }

  // ─── Dispatch ──────────────────────────────────────────────────────────────

  /// Apply one inbound event. Errors are meant for [`reject`](Self::reject);
  /// nothing has been broadcast when one is returned.
  pub async fn handle(&self, session: &Session, event: InboundEvent) -> Result<()> {
    if let Some(actor) = event.actor()
      && actor != &session.principal
    {
      return Err(Error::Validation(format!(
        "`{actor}` does not match the connection's principal `{}`",
        session.principal
      )));
    }
    debug!(conn = session.id, event = event.name(), "dispatch");

    match event {
      InboundEvent::Join(principal) => {
        self.router.join(session.id, &principal).await;
      }
      InboundEvent::JoinGroup(group) => self.join_group(session, &group).await?,
      InboundEvent::PrivateMessage(payload) => {
        self.send_payload(payload, false).await?;
      }
      InboundEvent::GroupMessage(payload) => {
        self.send_payload(payload, true).await?;
      }
      InboundEvent::Typing(t) => {
        let scope = private_scope(&t.from, &t.to)?;
        self.typing.start_typing(t.from, scope).await;
      }
      InboundEvent::StopTyping(t) => {
        let scope = private_scope(&t.from, &t.to)?;
        self.typing.stop_typing(t.from, scope).await;
      }
      InboundEvent::TypingGroup(t) => {
        let scope = group_scope(&t.group)?;
        self.require_member(&t.group, &t.from).await?;
        self.typing.start_typing(t.from, scope).await;
      }
      InboundEvent::StopTypingGroup(t) => {
        let scope = group_scope(&t.group)?;
        self.require_member(&t.group, &t.from).await?;
        self.typing.stop_typing(t.from, scope).await;
      }
      InboundEvent::ReadMessage(r) => {
        let scope = private_scope(&r.from, &r.to)?;
        self.mark_read(scope, &r.to).await?;
      }
      InboundEvent::ReadGroupMessage(r) => {
        let scope = group_scope(&r.group)?;
        self.mark_read(scope, &r.username).await?;
      }
      InboundEvent::React(r) => {
        self.react(r.message_id, &r.user, &r.emoji).await?;
      }
      InboundEvent::Unreact(r) => {
        self.unreact(r.message_id, &r.user, &r.emoji).await?;
      }
      InboundEvent::Reply(r) => {
        self.reply(r.reply_to, r.message).await?;
      }
      InboundEvent::Presence(principal) => {
        self.presence.mark_online(principal, session.id).await;
      }
    }
    Ok(())
  }

  /// Subscribe a connection to a group room. Only members may join.
  pub async fn join_group(&self, session: &Session, group: &str) -> Result<()> {
    self.require_member(group, &session.principal).await?;
    self.router.join_group(session.id, group).await;
    Ok(())
  }

  // ─── Send path ─────────────────────────────────────────────────────────────

  async fn send_payload(&self, payload: MessagePayload, group: bool) -> Result<()> {
    let input = payload.into_new_message()?;
    match (&input.target, group) {
      (Target::Private { .. }, false) | (Target::Group { .. }, true) => {}
      (_, true) => {
        return Err(Error::Validation("group message needs `group`".into()));
      }
      (_, false) => {
        return Err(Error::Validation("private message needs `to`".into()));
      }
    }
    self.send_message(input).await?;
    Ok(())
  }

  /// Persist a message and deliver it to its scope: both participants'
  /// connections for a private message, the group room otherwise.
  ///
  /// Nothing is delivered unless the append succeeded.
  pub async fn send_message(&self, input: NewMessage) -> Result<Message> {
    self
      .append_and_publish(input, |message| match message.target {
        Target::Private { .. } => OutboundEvent::PrivateMessage(message),
        Target::Group { .. } => OutboundEvent::GroupMessage(message),
      })
      .await
  }

  /// Validate, append and publish under the scope's turn, so that delivery
  /// order matches log order.
  pub(crate) async fn append_and_publish(
    &self,
    input: NewMessage,
    event: impl FnOnce(Message) -> OutboundEvent,
  ) -> Result<Message> {
    input.validate()?;
    let scope = input.scope();
    if let ConversationScope::Group(name) = &scope {
      self.require_member(name, &input.from).await?;
    }

    let _turn = self.sequencer.lock(&scope).await;
    let message = self
      .store
      .append(input)
      .await
      .map_err(store_error("append"))?;
    let delivered = self.router.publish(&scope, event(message.clone())).await;
    debug!(id = %message.id, %scope, delivered, "message published");
    Ok(message)
  }

  /// Load a message on behalf of `viewer`, who must belong to its scope.
  pub async fn visible_message(
    &self,
    id: Uuid,
    viewer: &Principal,
  ) -> Result<Message> {
    let message = self.message(id).await?;
    self.require_participant(&message.scope(), viewer).await?;
    Ok(message)
  }

  // ─── Helpers ───────────────────────────────────────────────────────────────

  /// Check that `principal` belongs to `scope`: one of the pair for a
  /// private scope, a directory member for a group.
  pub(crate) async fn require_participant(
    &self,
    scope: &ConversationScope,
    principal: &Principal,
  ) -> Result<()> {
    match scope {
      ConversationScope::Group(name) => {
        self.require_member(name, principal).await?;
      }
      ConversationScope::Private(..) => {
        if scope.counterpart(principal).is_none() {
          return Err(Error::NotAParticipant {
            scope:     scope.to_string(),
            principal: principal.to_string(),
          });
        }
      }
    }
    Ok(())
  }

  /// Load `group` and check that `principal` belongs to it.
  pub(crate) async fn require_member(
    &self,
    group: &str,
    principal: &Principal,
  ) -> Result<Group> {
    let found = self
      .store
      .get_group(group)
      .await
      .map_err(store_error("get_group"))?
      .ok_or_else(|| Error::GroupNotFound(group.to_owned()))?;
    if !found.is_member(principal) {
      return Err(Error::NotAMember {
        group:     group.to_owned(),
        principal: principal.to_string(),
      });
    }
    Ok(found)
  }
}

fn private_scope(from: &Principal, to: &Principal) -> Result<ConversationScope> {
  if from.is_empty() || to.is_empty() {
    return Err(Error::Validation("`from` and `to` must not be empty".into()));
  }
  Ok(ConversationScope::private(from.clone(), to.clone()))
}

fn group_scope(group: &str) -> Result<ConversationScope> {
  if group.trim().is_empty() {
    return Err(Error::Validation("`group` must not be empty".into()));
  }
  Ok(ConversationScope::group(group))
}
