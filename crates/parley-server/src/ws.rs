//! The WebSocket event channel.
//!
//! One socket is one hub connection. Inbound text frames carry
//! `{"event", "data"}` objects; each is dispatched in arrival order and a
//! failure is reported back on the same socket as an `error` event. A
//! writer task drains the connection's outbound queue into the socket.

use std::sync::Arc;

use axum::{
  extract::{
    State,
    ws::{Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures_util::{SinkExt as _, StreamExt as _};
use parley_core::{Error, Principal, event::InboundEvent, store::ChatStore};
use parley_realtime::{Connection, Hub};
use tracing::{debug, error, warn};

use crate::{AppState, auth::Authenticated};

/// `GET /ws`: authenticate, then upgrade.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  ws: WebSocketUpgrade,
) -> Response
where
  S: ChatStore + 'static,
{
  ws.on_upgrade(move |socket| serve(socket, state.hub, principal))
}

async fn serve<S>(socket: WebSocket, hub: Arc<Hub<S>>, principal: Principal)
where
  S: ChatStore + 'static,
{
  let Connection { session, mut events } = match hub.connect(principal).await {
    Ok(connection) => connection,
    Err(e) => {
      warn!(error = %e, "could not attach connection");
      return;
    }
  };
  let (mut sink, mut stream) = socket.split();

  let writer = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      let text = match serde_json::to_string(&event) {
        Ok(text) => text,
        Err(e) => {
          error!(error = %e, "failed to encode outbound event");
          continue;
        }
      };
      if sink.send(Message::Text(text.into())).await.is_err() {
        break;
      }
    }
  });

  while let Some(frame) = stream.next().await {
    let text = match frame {
      Ok(Message::Text(text)) => text,
      Ok(Message::Close(_)) | Err(_) => break,
      Ok(_) => continue,
    };
    match serde_json::from_str::<InboundEvent>(text.as_str()) {
      Ok(event) => {
        if let Err(e) = hub.handle(&session, event).await {
          hub.reject(&session, &e).await;
        }
      }
      Err(e) => {
        debug!(conn = session.id, error = %e, "malformed frame");
        let err = Error::Validation(format!("malformed event: {e}"));
        hub.reject(&session, &err).await;
      }
    }
  }

  hub.disconnect(&session).await;
  writer.abort();
}
