//! Router-level tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Extension, Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use parley_core::{
  Principal,
  event::{InboundEvent, OutboundEvent},
  group::NewGroup,
  message::{Body as MessageBody, NewMessage, Target},
};
use parley_realtime::{Hub, HubConfig};
use parley_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

async fn make_hub() -> Arc<Hub<SqliteStore>> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  Arc::new(Hub::new(Arc::new(store), HubConfig::default()))
}

async fn call(
  app: Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(json) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(json.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();

  let resp = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, value)
}

async fn post_text(hub: &Hub<SqliteStore>, from: &str, to: &str, text: &str) -> Uuid {
  hub
    .send_message(NewMessage::new(from, Target::private(to), MessageBody::text(text)))
    .await
    .unwrap()
    .id
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn private_history_is_oldest_first_and_limited() {
  let hub = make_hub().await;
  for text in ["one", "two", "three"] {
    post_text(&hub, "alice", "bob", text).await;
  }

  let (status, body) =
    call(api_router(hub.clone()), "GET", "/messages/bob/alice", None).await;
  assert_eq!(status, StatusCode::OK);
  let texts: Vec<_> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|m| m["text"].as_str().unwrap())
    .collect();
  assert_eq!(texts, ["one", "two", "three"]);

  let (_, body) =
    call(api_router(hub), "GET", "/messages/alice/bob?limit=2", None).await;
  assert_eq!(body.as_array().unwrap().len(), 2);
  assert_eq!(body[1]["text"], "three");
}

#[tokio::test]
async fn history_outside_the_callers_conversations_is_forbidden() {
  let hub = make_hub().await;
  post_text(&hub, "alice", "bob", "secret").await;
  hub.create_group(NewGroup::new("g1", "alice")).await.unwrap();

  let app = api_router(hub).layer(Extension(Principal::from("carol")));
  let (status, _) = call(app.clone(), "GET", "/messages/alice/bob", None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = call(app, "GET", "/group-messages/g1", None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn messages_by_id_are_only_visible_to_their_conversation() {
  let hub = make_hub().await;
  let id = post_text(&hub, "alice", "bob", "secret").await;

  let carol = api_router(hub.clone()).layer(Extension(Principal::from("carol")));
  let (status, body) = call(carol.clone(), "GET", &format!("/messages/{id}"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body.get("text").is_none());
  let (status, _) =
    call(carol.clone(), "GET", &format!("/messages/{id}/replies"), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = call(
    carol.clone(),
    "POST",
    &format!("/messages/{id}/reply"),
    Some(json!({ "from": "carol", "to": "dave", "text": "carol->dave" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = call(
    carol,
    "POST",
    &format!("/messages/{id}/react"),
    Some(json!({ "user": "carol", "emoji": "👀" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let alice = api_router(hub).layer(Extension(Principal::from("alice")));
  let (status, body) = call(alice.clone(), "GET", &format!("/messages/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["text"], "secret");
  assert_eq!(body["reactions"], json!([]));
  let (status, replies) =
    call(alice, "GET", &format!("/messages/{id}/replies"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(replies, json!([]));
}

#[tokio::test]
async fn reserved_names_cannot_be_addressed() {
  let hub = make_hub().await;
  let err = hub
    .send_message(NewMessage::new("alice", Target::private("replies"), MessageBody::text("hi")))
    .await
    .unwrap_err();
  assert!(matches!(err, parley_core::Error::Validation(_)));

  let (status, _) = call(
    api_router(hub),
    "POST",
    "/groups",
    Some(json!({ "name": "g1", "admin": "react" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn group_history_returns_group_messages() {
  let hub = make_hub().await;
  hub.create_group(NewGroup::new("g1", "alice")).await.unwrap();
  hub
    .send_message(NewMessage::new("alice", Target::group("g1"), MessageBody::text("hey")))
    .await
    .unwrap();

  let (status, body) = call(api_router(hub), "GET", "/group-messages/g1", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body[0]["group"], "g1");
  assert_eq!(body[0]["from"], "alice");
}

// ─── Single message / replies ────────────────────────────────────────────────

#[tokio::test]
async fn get_unknown_message_is_404() {
  let hub = make_hub().await;
  let uri = format!("/messages/{}", Uuid::new_v4());
  let (status, body) = call(api_router(hub), "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("message not found"));
}

#[tokio::test]
async fn reply_is_stored_and_listed() {
  let hub = make_hub().await;
  let parent = post_text(&hub, "alice", "bob", "lunch?").await;

  let (status, reply) = call(
    api_router(hub.clone()),
    "POST",
    &format!("/messages/{parent}/reply"),
    Some(json!({ "from": "bob", "to": "alice", "text": "sure" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(reply["replyTo"], json!(parent));

  let (status, replies) = call(
    api_router(hub.clone()),
    "GET",
    &format!("/messages/{parent}/replies"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(replies.as_array().unwrap().len(), 1);
  assert_eq!(replies[0]["text"], "sure");

  let (status, _) = call(
    api_router(hub),
    "POST",
    &format!("/messages/{}/reply", Uuid::new_v4()),
    Some(json!({ "from": "bob", "to": "alice", "text": "lost" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Reactions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn react_over_http_is_broadcast() {
  let hub = make_hub().await;
  let id = post_text(&hub, "alice", "bob", "hi").await;
  let mut watcher = hub.connect(Principal::from("zed")).await.unwrap();
  let _history = watcher.events.recv().await;

  let uri = format!("/messages/{id}/react");
  let body = json!({ "user": "bob", "emoji": "👍" });
  let (status, msg) =
    call(api_router(hub.clone()), "POST", &uri, Some(body.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(msg["reactions"], json!([{ "user": "bob", "emoji": "👍" }]));

  let Some(OutboundEvent::Reaction(update)) = watcher.events.recv().await else {
    panic!("expected a reaction broadcast");
  };
  assert_eq!(update.message_id, id);

  // Same pair again: unchanged and silent.
  let (_, msg) = call(api_router(hub.clone()), "POST", &uri, Some(body.clone())).await;
  assert_eq!(msg["reactions"].as_array().unwrap().len(), 1);
  assert!(watcher.events.try_recv().is_err());

  let uri = format!("/messages/{id}/unreact");
  let (_, msg) = call(api_router(hub), "POST", &uri, Some(body)).await;
  assert_eq!(msg["reactions"], json!([]));
}

#[tokio::test]
async fn acting_as_someone_else_is_forbidden() {
  let hub = make_hub().await;
  let id = post_text(&hub, "alice", "bob", "hi").await;

  let app = api_router(hub).layer(Extension(Principal::from("bob")));
  let (status, body) = call(
    app.clone(),
    "POST",
    &format!("/messages/{id}/react"),
    Some(json!({ "user": "mallory", "emoji": "👎" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].is_string());

  let (status, _) = call(
    app,
    "POST",
    &format!("/messages/{id}/react"),
    Some(json!({ "user": "bob", "emoji": "👍" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

// ─── Presence ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn online_users_lists_present_principals() {
  let hub = make_hub().await;
  for name in ["bob", "alice"] {
    let conn = hub.connect(Principal::from(name)).await.unwrap();
    hub
      .handle(&conn.session, InboundEvent::Presence(Principal::from(name)))
      .await
      .unwrap();
  }

  let (status, body) = call(api_router(hub), "GET", "/online-users", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!(["alice", "bob"]));
}

// ─── Groups ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn group_directory_round_trip() {
  let hub = make_hub().await;

  let create = json!({ "name": "rustaceans", "admin": "alice" });
  let (status, group) =
    call(api_router(hub.clone()), "POST", "/groups", Some(create.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(group["members"], json!(["alice"]));

  let (status, _) = call(api_router(hub.clone()), "POST", "/groups", Some(create)).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let join = json!({ "name": "rustaceans", "username": "bob" });
  for _ in 0..2 {
    let (status, group) =
      call(api_router(hub.clone()), "POST", "/groups/join", Some(join.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["members"], json!(["alice", "bob"]));
  }

  let join = json!({ "name": "nobody", "username": "bob" });
  let (status, _) = call(api_router(hub.clone()), "POST", "/groups/join", Some(join)).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, mine) = call(api_router(hub.clone()), "GET", "/groups?username=bob", None).await;
  assert_eq!(mine.as_array().unwrap().len(), 1);
  let (_, none) = call(api_router(hub), "GET", "/groups?username=carol", None).await;
  assert_eq!(none, json!([]));
}

#[tokio::test]
async fn empty_group_name_is_a_bad_request() {
  let hub = make_hub().await;
  let (status, _) = call(
    api_router(hub),
    "POST",
    "/groups",
    Some(json!({ "name": "  ", "admin": "alice" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
