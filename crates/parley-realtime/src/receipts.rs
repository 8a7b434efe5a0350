//! Read-receipt reconciliation.

use parley_core::{
  ConversationScope, Principal, Result,
  event::{OutboundEvent, ReadReceipt},
  store::ChatStore,
};
use tracing::{debug, warn};

use crate::hub::{Hub, store_error};

impl<S: ChatStore> Hub<S> {
  /// Mark every message in `scope` that `reader` has not acknowledged yet
  /// as read by them, and announce each newly marked message.
  ///
  /// Repeating the call is a no-op: already-read messages are neither
  /// rewritten nor re-announced. A failure on one message is logged and the
  /// rest are still processed. Returns the receipts that were emitted.
  pub async fn mark_read(
    &self,
    scope: ConversationScope,
    reader: &Principal,
  ) -> Result<Vec<ReadReceipt>> {
    self.require_participant(&scope, reader).await?;

    let _turn = self.sequencer.lock(&scope).await;
    let unread = self
      .store
      .query_unread(&scope, reader)
      .await
      .map_err(store_error("query_unread"))?;

    let mut receipts = Vec::with_capacity(unread.len());
    for message in unread {
      let by = reader.clone();
      let outcome = self
        .store
        .mutate(message.id, move |m| m.mark_read_by(&by))
        .await;
      match outcome {
        Ok(Some(mutated)) if mutated.changed => {
          let receipt = ReadReceipt {
            id: message.id,
            by: reader.clone(),
          };
          let event = if scope.is_group() {
            OutboundEvent::GroupMessageRead(receipt.clone())
          } else {
            OutboundEvent::MessageRead(receipt.clone())
          };
          self.router.publish(&scope, event).await;
          receipts.push(receipt);
        }
        Ok(_) => {}
        Err(e) => {
          warn!(id = %message.id, error = %e, "failed to record read receipt");
        }
      }
    }
    debug!(%scope, %reader, marked = receipts.len(), "read reconciled");
    Ok(receipts)
  }
}
