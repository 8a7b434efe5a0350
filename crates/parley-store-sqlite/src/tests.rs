//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use parley_core::{
  ConversationScope, Principal,
  group::NewGroup,
  message::{Body, NewMessage, Target},
  store::ChatStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn private(from: &str, to: &str, text: &str) -> NewMessage {
  NewMessage::new(from, Target::private(to), Body::text(text))
}

fn group(from: &str, name: &str, text: &str) -> NewMessage {
  NewMessage::new(from, Target::group(name), Body::text(text))
}

fn p(name: &str) -> Principal { Principal::from(name) }

// ─── Append / find ───────────────────────────────────────────────────────────

#[tokio::test]
async fn append_assigns_id_and_empty_sets() {
  let s = store().await;

  let msg = s.append(private("alice", "bob", "hi")).await.unwrap();
  assert!(msg.read_by.is_empty());
  assert!(msg.reactions.is_empty());
  assert_eq!(msg.reply_to, None);

  let fetched = s.find_by_id(msg.id).await.unwrap().unwrap();
  assert_eq!(fetched, msg);
}

#[tokio::test]
async fn find_missing_returns_none() {
  let s = store().await;
  assert!(s.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn creation_times_strictly_increase() {
  let s = store().await;
  let mut last = None;
  for i in 0..20 {
    let msg = s.append(private("alice", "bob", &i.to_string())).await.unwrap();
    if let Some(prev) = last {
      assert!(msg.created_at > prev);
    }
    last = Some(msg.created_at);
  }
}

#[tokio::test]
async fn sticker_and_extras_roundtrip() {
  let s = store().await;
  let mut input = NewMessage::new(
    "carol",
    Target::group("g1"),
    Body::sticker("https://example.com/cat.png"),
  );
  input.color = Some("#3366ff".into());
  input.avatar = Some("https://example.com/carol.png".into());

  let msg = s.append(input).await.unwrap();
  let fetched = s.find_by_id(msg.id).await.unwrap().unwrap();
  assert_eq!(fetched.body, Body::sticker("https://example.com/cat.png"));
  assert_eq!(fetched.color.as_deref(), Some("#3366ff"));
  assert_eq!(fetched.target, Target::group("g1"));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_private_matches_both_directions_oldest_first() {
  let s = store().await;
  s.append(private("alice", "bob", "one")).await.unwrap();
  s.append(private("bob", "alice", "two")).await.unwrap();
  s.append(private("alice", "carol", "elsewhere")).await.unwrap();
  s.append(private("alice", "bob", "three")).await.unwrap();

  let msgs = s.query_private(&p("bob"), &p("alice"), 100).await.unwrap();
  let texts: Vec<_> = msgs
    .iter()
    .map(|m| match &m.body {
      Body::Text { text } => text.as_str(),
      Body::Sticker { .. } => "",
    })
    .collect();
  assert_eq!(texts, ["one", "two", "three"]);
}

#[tokio::test]
async fn query_limit_keeps_the_newest() {
  let s = store().await;
  let mut ids = Vec::new();
  for i in 0..5 {
    ids.push(s.append(group("alice", "g1", &i.to_string())).await.unwrap().id);
  }

  let msgs = s.query_group("g1", 2).await.unwrap();
  let got: Vec<_> = msgs.iter().map(|m| m.id).collect();
  assert_eq!(got, &ids[3..]);
}

#[tokio::test]
async fn query_replies_in_creation_order() {
  let s = store().await;
  let parent = s.append(private("alice", "bob", "question")).await.unwrap();

  let mut first = private("bob", "alice", "a");
  first.reply_to = Some(parent.id);
  let mut second = private("alice", "bob", "b");
  second.reply_to = Some(parent.id);

  let r1 = s.append(first).await.unwrap();
  s.append(private("bob", "alice", "unrelated")).await.unwrap();
  let r2 = s.append(second).await.unwrap();

  let replies = s.query_replies(parent.id).await.unwrap();
  let got: Vec<_> = replies.iter().map(|m| m.id).collect();
  assert_eq!(got, [r1.id, r2.id]);
  assert!(s.query_replies(r1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_unread_private_only_returns_peer_messages() {
  let s = store().await;
  let to_bob = s.append(private("alice", "bob", "hi")).await.unwrap();
  s.append(private("bob", "alice", "hey")).await.unwrap();

  let scope = ConversationScope::private(p("alice"), p("bob"));
  let unread = s.query_unread(&scope, &p("bob")).await.unwrap();
  assert_eq!(unread.len(), 1);
  assert_eq!(unread[0].id, to_bob.id);

  let bob = p("bob");
  s.mutate(to_bob.id, move |m| m.mark_read_by(&bob)).await.unwrap();
  assert!(s.query_unread(&scope, &p("bob")).await.unwrap().is_empty());

  // Outsiders never see anything as unread in someone else's conversation.
  assert!(s.query_unread(&scope, &p("carol")).await.unwrap().is_empty());
}

#[tokio::test]
async fn query_unread_group_skips_own_messages() {
  let s = store().await;
  s.append(group("carol", "g1", "mine")).await.unwrap();
  let theirs = s.append(group("alice", "g1", "theirs")).await.unwrap();

  let scope = ConversationScope::group("g1");
  let unread = s.query_unread(&scope, &p("carol")).await.unwrap();
  assert_eq!(unread.len(), 1);
  assert_eq!(unread[0].id, theirs.id);
}

#[tokio::test]
async fn query_history_covers_private_and_member_groups() {
  let s = store().await;
  s.create_group(NewGroup::new("g1", "alice")).await.unwrap();
  s.create_group(NewGroup::new("g2", "carol")).await.unwrap();

  s.append(private("alice", "bob", "to bob")).await.unwrap();
  s.append(private("carol", "alice", "to alice")).await.unwrap();
  s.append(private("bob", "carol", "not alice's")).await.unwrap();
  s.append(group("alice", "g1", "in g1")).await.unwrap();
  s.append(group("carol", "g2", "in g2")).await.unwrap();

  let history = s.query_history(&p("alice"), 100).await.unwrap();
  assert_eq!(history.len(), 3);
  assert!(history.iter().all(|m| match &m.target {
    Target::Group { group } => group == "g1",
    Target::Private { to } => m.from == "alice" || to == &p("alice"),
  }));
}

// ─── Mutation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mutate_reports_change_and_persists() {
  let s = store().await;
  let msg = s.append(group("alice", "g1", "hi")).await.unwrap();

  let carol = p("carol");
  let first = s
    .mutate(msg.id, move |m| m.add_reaction(&carol, "👍"))
    .await
    .unwrap()
    .unwrap();
  assert!(first.changed);

  let carol = p("carol");
  let second = s
    .mutate(msg.id, move |m| m.add_reaction(&carol, "👍"))
    .await
    .unwrap()
    .unwrap();
  assert!(!second.changed);
  assert_eq!(second.message.reactions.len(), 1);

  let stored = s.find_by_id(msg.id).await.unwrap().unwrap();
  assert_eq!(stored.reactions, first.message.reactions);
}

#[tokio::test]
async fn mutate_missing_returns_none() {
  let s = store().await;
  let out = s.mutate(Uuid::new_v4(), |_| true).await.unwrap();
  assert!(out.is_none());
}

#[tokio::test]
async fn concurrent_mutations_of_same_id_are_not_lost() {
  let s = Arc::new(store().await);
  let id = s.append(group("alice", "g1", "hi")).await.unwrap().id;

  let mut tasks = Vec::new();
  for i in 0..25 {
    let s = s.clone();
    tasks.push(tokio::spawn(async move {
      let user = Principal::from(format!("user{i}"));
      let reader = user.clone();
      s.mutate(id, move |m| m.add_reaction(&user, "🔥")).await.unwrap();
      s.mutate(id, move |m| m.mark_read_by(&reader)).await.unwrap();
    }));
  }
  for t in tasks {
    t.await.unwrap();
  }

  let stored = s.find_by_id(id).await.unwrap().unwrap();
  assert_eq!(stored.reactions.len(), 25);
  assert_eq!(stored.read_by.len(), 25);
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_group_includes_admin_and_rejects_duplicates() {
  let s = store().await;

  let g = s.create_group(NewGroup::new("g1", "alice")).await.unwrap().unwrap();
  assert!(g.is_member(&p("alice")));
  assert_eq!(g.members.len(), 1);

  let dup = s.create_group(NewGroup::new("g1", "bob")).await.unwrap();
  assert!(dup.is_none());

  let stored = s.get_group("g1").await.unwrap().unwrap();
  assert_eq!(stored.admin, p("alice"));
}

#[tokio::test]
async fn join_group_is_idempotent() {
  let s = store().await;
  s.create_group(NewGroup::new("g1", "alice")).await.unwrap();

  s.join_group("g1", &p("carol")).await.unwrap().unwrap();
  let g = s.join_group("g1", &p("carol")).await.unwrap().unwrap();
  assert_eq!(g.members.len(), 2);
  assert!(g.is_member(&p("carol")));

  assert!(s.join_group("nope", &p("carol")).await.unwrap().is_none());
}

#[tokio::test]
async fn list_groups_filters_by_member() {
  let s = store().await;
  s.create_group(NewGroup::new("g1", "alice")).await.unwrap();
  s.create_group(NewGroup::new("g2", "bob")).await.unwrap();
  s.join_group("g2", &p("alice")).await.unwrap();
  s.create_group(NewGroup::new("g3", "bob")).await.unwrap();

  assert_eq!(s.list_groups(None).await.unwrap().len(), 3);

  let alice = p("alice");
  let mine = s.list_groups(Some(&alice)).await.unwrap();
  let names: Vec<_> = mine.iter().map(|g| g.name.as_str()).collect();
  assert_eq!(names, ["g1", "g2"]);
}
