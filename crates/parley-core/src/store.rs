//! The `ChatStore` trait: message log plus group directory.
//!
//! The trait is implemented by storage backends (e.g. `parley-store-sqlite`).
//! Higher layers (`parley-realtime`, `parley-api`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  ConversationScope, Principal,
  group::{Group, NewGroup},
  message::{Message, Mutated, NewMessage},
};

/// Abstraction over a Parley storage backend.
///
/// Messages are append-only: once persisted a record is never deleted and its
/// identity never changes. The only in-place updates go through
/// [`ChatStore::mutate`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ChatStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Message log ───────────────────────────────────────────────────────

  /// Persist a new message. The store assigns the id, the creation time and
  /// the position in the log.
  fn append(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Retrieve a message by id. Returns `None` if not found.
  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  /// The last `limit` messages exchanged between `a` and `b` (either
  /// direction), oldest first.
  fn query_private<'a>(
    &'a self,
    a: &'a Principal,
    b: &'a Principal,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// The last `limit` messages posted to `group`, oldest first.
  fn query_group<'a>(
    &'a self,
    group: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// Every message whose `reply_to` is `parent`, in creation order.
  fn query_replies(
    &self,
    parent: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Messages in `scope` that `reader` has not acknowledged yet, in creation
  /// order. Messages authored by `reader` are never returned.
  fn query_unread<'a>(
    &'a self,
    scope: &'a ConversationScope,
    reader: &'a Principal,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// The last `limit` messages visible to `principal`: private messages they
  /// sent or received, plus messages of every group they belong to.
  fn query_history<'a>(
    &'a self,
    principal: &'a Principal,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// Apply `f` to the stored message `id` and persist the result if `f`
  /// reports a change.
  ///
  /// Read, update and write happen atomically with respect to every other
  /// `mutate` of the same id, so concurrent set additions are never lost.
  /// Returns `None` if the message does not exist.
  fn mutate<F>(
    &self,
    id: Uuid,
    f: F,
  ) -> impl Future<Output = Result<Option<Mutated>, Self::Error>> + Send + '_
  where
    F: FnOnce(&mut Message) -> bool + Send + 'static;

  // ── Group directory ───────────────────────────────────────────────────

  /// Create a group with its admin as the only member. Returns `None` if a
  /// group with the same name already exists.
  fn create_group(
    &self,
    input: NewGroup,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + '_;

  /// Add `principal` to `name` (idempotent). Returns `None` if the group does
  /// not exist.
  fn join_group<'a>(
    &'a self,
    name: &'a str,
    principal: &'a Principal,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// Retrieve a group by name. Returns `None` if not found.
  fn get_group<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Group>, Self::Error>> + Send + 'a;

  /// List all groups, or only those `member` belongs to.
  fn list_groups<'a>(
    &'a self,
    member: Option<&'a Principal>,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + 'a;
}
