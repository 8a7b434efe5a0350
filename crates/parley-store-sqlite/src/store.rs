//! [`SqliteStore`]: the SQLite implementation of [`ChatStore`].

use std::{collections::BTreeSet, path::Path};

use chrono::{Duration, SubsecRound as _, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use parley_core::{
  ConversationScope, Principal,
  group::{Group, NewGroup},
  message::{Message, Mutated, NewMessage},
  store::ChatStore,
};

use crate::{
  Result,
  encode::{
    MESSAGE_COLUMNS, RawGroup, RawMessage, decode_dt, encode_body, encode_dt,
    encode_reactions, encode_read_by, encode_target, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a message query returning rows in log order and decode them.
  async fn query_messages<P>(&self, sql: String, params: P) -> Result<Vec<Message>>
  where
    P: rusqlite::Params + Send + 'static,
  {
    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params, RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }
}

/// Wrap a filter so only the newest `limit` rows are kept, returned oldest
/// first. The filter may reference `?1`..`?n`; the limit binds to `?{n+1}`.
fn last_n(filter: &str, limit_param: usize) -> String {
  format!(
    "SELECT {MESSAGE_COLUMNS} FROM (
       SELECT seq, {MESSAGE_COLUMNS} FROM messages
       WHERE ({filter})
       ORDER BY seq DESC
       LIMIT ?{limit_param}
     ) ORDER BY seq ASC"
  )
}

/// Load a group and its members on the connection thread.
fn load_group(conn: &Connection, name: &str) -> rusqlite::Result<Option<RawGroup>> {
  let head = conn
    .query_row(
      "SELECT name, admin, avatar, created_at FROM chat_groups WHERE name = ?1",
      rusqlite::params![name],
      |row| {
        Ok(RawGroup {
          name:       row.get(0)?,
          admin:      row.get(1)?,
          avatar:     row.get(2)?,
          created_at: row.get(3)?,
          members:    Vec::new(),
        })
      },
    )
    .optional()?;

  let Some(mut group) = head else { return Ok(None) };

  let mut stmt = conn.prepare(
    "SELECT principal FROM group_members WHERE group_name = ?1 ORDER BY joined_at",
  )?;
  group.members = stmt
    .query_map(rusqlite::params![name], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;

  Ok(Some(group))
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = crate::Error;

  // ── Message log ───────────────────────────────────────────────────────────

  async fn append(&self, input: NewMessage) -> Result<Message> {
    let mut message = Message {
      id:         Uuid::new_v4(),
      from:       input.from,
      target:     input.target,
      body:       input.body,
      color:      input.color,
      avatar:     input.avatar,
      // Stored with microsecond precision; keep the returned value identical.
      created_at: Utc::now().trunc_subsecs(6),
      read_by:    BTreeSet::new(),
      reactions:  Vec::new(),
      reply_to:   input.reply_to,
    };

    let id_str              = encode_uuid(message.id);
    let sender              = message.from.as_str().to_owned();
    let (recipient, group)  = encode_target(&message.target);
    let (body_kind, body)   = encode_body(&message.body);
    let color               = message.color.clone();
    let avatar              = message.avatar.clone();
    let read_by             = encode_read_by(&message.read_by)?;
    let reactions           = encode_reactions(&message.reactions)?;
    let reply_to            = message.reply_to.map(encode_uuid);
    let mut created_at      = message.created_at;

    // Creation times never go backwards, even if the wall clock does.
    message.created_at = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let last: Option<String> = tx
          .query_row(
            "SELECT created_at FROM messages ORDER BY seq DESC LIMIT 1",
            [],
            |row| row.get(0),
          )
          .optional()?;
        if let Some(last) = last {
          let last = decode_dt(&last)?;
          if created_at <= last {
            created_at = last + Duration::microseconds(1);
          }
        }

        tx.execute(
          "INSERT INTO messages (
             message_id, sender, recipient, group_name, body_kind, body,
             color, avatar, created_at, read_by, reactions, reply_to
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            id_str,
            sender,
            recipient,
            group,
            body_kind,
            body,
            color,
            avatar,
            encode_dt(created_at),
            read_by,
            reactions,
            reply_to,
          ],
        )?;
        tx.commit()?;
        Ok(created_at)
      })
      .await?;

    Ok(message)
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawMessage> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
            rusqlite::params![id_str],
            RawMessage::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawMessage::into_message).transpose()
  }

  async fn query_private<'a>(
    &'a self,
    a: &'a Principal,
    b: &'a Principal,
    limit: usize,
  ) -> Result<Vec<Message>> {
    let sql = last_n(
      "(sender = ?1 AND recipient = ?2) OR (sender = ?2 AND recipient = ?1)",
      3,
    );
    let params = (a.as_str().to_owned(), b.as_str().to_owned(), limit as i64);
    self.query_messages(sql, params).await
  }

  async fn query_group<'a>(&'a self, group: &'a str, limit: usize) -> Result<Vec<Message>> {
    let sql = last_n("group_name = ?1", 2);
    self.query_messages(sql, (group.to_owned(), limit as i64)).await
  }

  async fn query_replies(&self, parent: Uuid) -> Result<Vec<Message>> {
    let sql = format!(
      "SELECT {MESSAGE_COLUMNS} FROM messages WHERE reply_to = ?1 ORDER BY seq ASC"
    );
    self.query_messages(sql, (encode_uuid(parent),)).await
  }

  async fn query_unread<'a>(
    &'a self,
    scope: &'a ConversationScope,
    reader: &'a Principal,
  ) -> Result<Vec<Message>> {
    let unread = "NOT EXISTS (SELECT 1 FROM json_each(read_by) WHERE value = ?2)";

    match scope {
      ConversationScope::Private(..) => {
        // Only what the peer sent to the reader; nothing if the reader is
        // not part of the pair.
        let Some(peer) = scope.counterpart(reader) else {
          return Ok(Vec::new());
        };
        let sql = format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE sender = ?1 AND recipient = ?2 AND {unread}
           ORDER BY seq ASC"
        );
        let params = (peer.as_str().to_owned(), reader.as_str().to_owned());
        self.query_messages(sql, params).await
      }
      ConversationScope::Group(name) => {
        let sql = format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE group_name = ?1 AND sender <> ?2 AND {unread}
           ORDER BY seq ASC"
        );
        let params = (name.clone(), reader.as_str().to_owned());
        self.query_messages(sql, params).await
      }
    }
  }

  async fn query_history<'a>(
    &'a self,
    principal: &'a Principal,
    limit: usize,
  ) -> Result<Vec<Message>> {
    let sql = last_n(
      "(group_name IS NULL AND (sender = ?1 OR recipient = ?1))
          OR group_name IN (SELECT group_name FROM group_members WHERE principal = ?1)",
      2,
    );
    self
      .query_messages(sql, (principal.as_str().to_owned(), limit as i64))
      .await
  }

  async fn mutate<F>(&self, id: Uuid, f: F) -> Result<Option<Mutated>>
  where
    F: FnOnce(&mut Message) -> bool + Send + 'static,
  {
    let id_str = encode_uuid(id);

    // Read, apply and write inside one call: the connection thread runs
    // calls one at a time, so no other mutation of this row can interleave.
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?1"),
            rusqlite::params![id_str],
            RawMessage::from_row,
          )
          .optional()?;

        let Some(raw) = raw else { return Ok(None) };
        let mut message = raw.into_message()?;
        let changed = f(&mut message);

        // Only the mutable sets are written back.
        if changed {
          tx.execute(
            "UPDATE messages SET read_by = ?2, reactions = ?3 WHERE message_id = ?1",
            rusqlite::params![
              id_str,
              encode_read_by(&message.read_by)?,
              encode_reactions(&message.reactions)?,
            ],
          )?;
        }
        tx.commit()?;

        Ok(Some(Mutated { message, changed }))
      })
      .await?;

    Ok(outcome)
  }

  // ── Group directory ───────────────────────────────────────────────────────

  async fn create_group(&self, input: NewGroup) -> Result<Option<Group>> {
    let group = Group {
      name:       input.name,
      admin:      input.admin.clone(),
      avatar:     input.avatar,
      members:    BTreeSet::from([input.admin]),
      created_at: Utc::now().trunc_subsecs(6),
    };

    let name   = group.name.clone();
    let admin  = group.admin.as_str().to_owned();
    let avatar = group.avatar.clone();
    let at_str = encode_dt(group.created_at);

    let created = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO chat_groups (name, admin, avatar, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![name, admin, avatar, at_str],
        )?;
        if inserted == 0 {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO group_members (group_name, principal, joined_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![name, admin, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(created.then_some(group))
  }

  async fn join_group<'a>(
    &'a self,
    name: &'a str,
    principal: &'a Principal,
  ) -> Result<Option<Group>> {
    let name      = name.to_owned();
    let principal = principal.as_str().to_owned();
    let at_str    = encode_dt(Utc::now());

    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM chat_groups WHERE name = ?1",
            rusqlite::params![name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }
        tx.execute(
          "INSERT OR IGNORE INTO group_members (group_name, principal, joined_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![name, principal, at_str],
        )?;
        let group = load_group(&tx, &name)?;
        tx.commit()?;
        Ok(group)
      })
      .await?;

    raw.map(RawGroup::into_group).transpose()
  }

  async fn get_group<'a>(&'a self, name: &'a str) -> Result<Option<Group>> {
    let name = name.to_owned();
    let raw: Option<RawGroup> = self
      .conn
      .call(move |conn| Ok(load_group(conn, &name)?))
      .await?;
    raw.map(RawGroup::into_group).transpose()
  }

  async fn list_groups<'a>(
    &'a self,
    member: Option<&'a Principal>,
  ) -> Result<Vec<Group>> {
    let member = member.map(|p| p.as_str().to_owned());

    let raws: Vec<RawGroup> = self
      .conn
      .call(move |conn| {
        let names: Vec<String> = if let Some(m) = member {
          let mut stmt = conn.prepare(
            "SELECT g.name FROM chat_groups g
             JOIN group_members m ON m.group_name = g.name
             WHERE m.principal = ?1
             ORDER BY g.created_at, g.name",
          )?;
          stmt
            .query_map(rusqlite::params![m], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt =
            conn.prepare("SELECT name FROM chat_groups ORDER BY created_at, name")?;
          stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut groups = Vec::with_capacity(names.len());
        for name in names {
          if let Some(group) = load_group(conn, &name)? {
            groups.push(group);
          }
        }
        Ok(groups)
      })
      .await?;

    raws.into_iter().map(RawGroup::into_group).collect()
  }
}
